// src/limits.rs
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amount::Coins;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitPeriod {
    Monthly,
}

impl LimitPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }
}

/// Per-employee cap on peer transfers sent within a period.
///
/// Admin-managed; the transfer engine only reads it. Enforcement counts both
/// posted and pending sent transfers, since a pending escrow already represents
/// committed sender funds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferLimit {
    pub employee: Uuid,
    pub period: LimitPeriod,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub max_amount: Coins,
}

impl TransferLimit {
    pub fn monthly(employee: Uuid, max_amount: Coins) -> Self {
        let (period_start, period_end) = current_month_window();
        Self {
            employee,
            period: LimitPeriod::Monthly,
            period_start,
            period_end,
            max_amount,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.period_start && at < self.period_end
    }
}

/// [start, end) of the current calendar month, UTC.
pub fn current_month_window() -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let (next_year, next_month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    (start, end)
}
