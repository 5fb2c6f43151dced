// src/transaction.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amount::Coins;

/// Whether a transaction type moves value into or out of its account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Credit,
    Debit,
}

/// Closed set of ledger transaction types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    ManagerAward,
    PeerTransferSent,
    PeerTransferReceived,
    WellnessReward,
    Adjustment,
    StorePurchase,
    AllotmentDeposit,
    AllotmentAward,
}

impl TransactionType {
    /// The authoritative credit/debit classification.
    ///
    /// Every consumer (poster, balance view, aggregates, reports) must go
    /// through this table; a second list of "which types are credits" is how
    /// ledger/report mismatches start.
    pub fn direction(&self) -> Direction {
        match self {
            Self::ManagerAward
            | Self::PeerTransferReceived
            | Self::WellnessReward
            | Self::AllotmentDeposit
            | Self::Adjustment => Direction::Credit,
            Self::PeerTransferSent | Self::StorePurchase | Self::AllotmentAward => {
                Direction::Debit
            }
        }
    }

    /// Signed types carry their own sign in the amount (administrative
    /// corrections and deductions); all other types require a positive amount.
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Adjustment | Self::AllotmentDeposit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManagerAward => "manager_award",
            Self::PeerTransferSent => "peer_transfer_sent",
            Self::PeerTransferReceived => "peer_transfer_received",
            Self::WellnessReward => "wellness_reward",
            Self::Adjustment => "adjustment",
            Self::StorePurchase => "store_purchase",
            Self::AllotmentDeposit => "allotment_deposit",
            Self::AllotmentAward => "allotment_award",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "manager_award" => Some(Self::ManagerAward),
            "peer_transfer_sent" => Some(Self::PeerTransferSent),
            "peer_transfer_received" => Some(Self::PeerTransferReceived),
            "wellness_reward" => Some(Self::WellnessReward),
            "adjustment" => Some(Self::Adjustment),
            "store_purchase" => Some(Self::StorePurchase),
            "allotment_deposit" => Some(Self::AllotmentDeposit),
            "allotment_award" => Some(Self::AllotmentAward),
            _ => None,
        }
    }
}

/// Posting state. Pending is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Posted,
    Rejected,
}

impl TransactionStatus {
    pub fn can_transition_to(&self, target: TransactionStatus) -> bool {
        match (self, target) {
            (TransactionStatus::Pending, TransactionStatus::Posted) => true,
            (TransactionStatus::Pending, TransactionStatus::Rejected) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Posted => "posted",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "posted" => Some(Self::Posted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub account: Uuid,
    pub tx_type: TransactionType,
    /// Immutable once created. Positive, except for signed types.
    pub amount: Coins,
    pub description: String,
    pub status: TransactionStatus,
    pub source_employee: Option<Uuid>,
    pub target_employee: Option<Uuid>,
    /// Hashed idempotency key, unique when present.
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
}

impl LedgerTransaction {
    pub fn new(
        account: Uuid,
        tx_type: TransactionType,
        amount: Coins,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            account,
            tx_type,
            amount,
            description: description.into(),
            status: TransactionStatus::Pending,
            source_employee: None,
            target_employee: None,
            idempotency_key: None,
            created_at: Utc::now(),
            posted_at: None,
        }
    }

    pub fn with_source(mut self, employee: Uuid) -> Self {
        self.source_employee = Some(employee);
        self
    }

    pub fn with_target(mut self, employee: Uuid) -> Self {
        self.target_employee = Some(employee);
        self
    }

    pub fn with_idempotency_key(mut self, hashed_key: String) -> Self {
        self.idempotency_key = Some(hashed_key);
        self
    }

    /// Balance effect of this transaction on its account once posted.
    pub fn signed_amount(&self) -> Coins {
        match self.tx_type.direction() {
            Direction::Credit => self.amount,
            Direction::Debit => -self.amount,
        }
    }

    /// Debit exposure: how much this transaction can pull out of the account.
    /// Covers negative amounts on signed credit types.
    pub fn debit_exposure(&self) -> Coins {
        let signed = self.signed_amount();
        if signed.is_negative() { -signed } else { Coins::ZERO }
    }
}
