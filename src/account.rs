// src/account.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amount::Coins;

/// Who an account belongs to. Allotment accounts hold a manager's award budget,
/// separate from any personal balance the same manager may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum AccountOwner {
    Employee(Uuid),
    ManagerAllotment(Uuid),
}

impl AccountOwner {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Employee(_) => "employee",
            Self::ManagerAllotment(_) => "manager_allotment",
        }
    }

    pub fn owner_id(&self) -> Uuid {
        match self {
            Self::Employee(id) | Self::ManagerAllotment(id) => *id,
        }
    }

    pub fn from_parts(kind: &str, id: Uuid) -> Option<Self> {
        match kind {
            "employee" => Some(Self::Employee(id)),
            "manager_allotment" => Some(Self::ManagerAllotment(id)),
            _ => None,
        }
    }
}

/// An account's materialized running total. Mutated only by transaction
/// posting; always equal to the signed sum of its posted transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub owner: AccountOwner,
    pub balance: Coins,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(owner: AccountOwner) -> Self {
        Self {
            id: Uuid::now_v7(),
            owner,
            balance: Coins::ZERO,
            created_at: Utc::now(),
        }
    }
}

/// Balance breakdown returned by the store.
///
/// `posted` is the materialized balance; `pending` is the signed sum of
/// pending transactions (zero unless pending was requested);
/// `total = posted + pending`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BalanceView {
    pub posted: Coins,
    pub pending: Coins,
    pub total: Coins,
}

impl BalanceView {
    pub fn zero() -> Self {
        Self {
            posted: Coins::ZERO,
            pending: Coins::ZERO,
            total: Coins::ZERO,
        }
    }

    pub fn new(posted: Coins, pending: Coins) -> Self {
        Self {
            posted,
            pending,
            total: posted + pending,
        }
    }
}
