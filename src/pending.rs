// src/pending.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amount::Coins;

/// Escrow record for a transfer whose recipient is not yet provisioned.
///
/// The sender's debit has already been posted by the time this record exists;
/// the value it represents lives here, not in any account balance. Claiming
/// posts the matching credit and deletes the record in one atomic unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub id: Uuid,
    pub sender_employee: Uuid,
    pub recipient_email: String,
    pub amount: Coins,
    pub message: String,
    /// The sender's posted debit transaction this escrow backs.
    pub debit_transaction: Uuid,
    pub created_at: DateTime<Utc>,
}

impl PendingTransfer {
    pub fn new(
        sender_employee: Uuid,
        recipient_email: impl Into<String>,
        amount: Coins,
        message: impl Into<String>,
        debit_transaction: Uuid,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender_employee,
            recipient_email: recipient_email.into().to_lowercase(),
            amount,
            message: message.into(),
            debit_transaction,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_email_is_normalized() {
        let transfer = PendingTransfer::new(
            Uuid::now_v7(),
            "New@Example.COM",
            Coins::from_minor(3000),
            "welcome",
            Uuid::now_v7(),
        );
        assert_eq!(transfer.recipient_email, "new@example.com");
    }
}
