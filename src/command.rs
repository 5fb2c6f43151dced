// src/command.rs
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::account::AccountOwner;
use crate::allotment::AllotmentEngine;
use crate::amount::Coins;
use crate::directory::Directory;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::transfer::{TransferEngine, TransferOutcome};

/// Result shape consumed by the chat/HTTP presentation layer.
///
/// The core returns the data; the caller decides what is visible per channel.
/// Field names inside `data` (`posted`, `pending`, `total`, `remaining`,
/// `isPending`) are part of the collaborator contract.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
    pub transaction_id: Option<Uuid>,
}

impl CommandResult {
    fn ok(message: impl Into<String>, data: Value, transaction_id: Option<Uuid>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            transaction_id,
        }
    }

    fn fail(err: &LedgerError) -> Self {
        if !err.is_domain_rejection() {
            warn!(error = %err, "command failed");
        }
        Self {
            success: false,
            message: err.user_message(),
            data: None,
            transaction_id: None,
        }
    }
}

/// Inbound command surface: what the chat slash-command router and REST layer
/// call into. Domain rejections come back as failure results, never panics or
/// raw errors.
#[derive(Clone)]
pub struct Commands {
    directory: Arc<dyn Directory>,
    ledger: Ledger,
    allotments: AllotmentEngine,
    transfers: TransferEngine,
}

impl Commands {
    pub fn new(
        directory: Arc<dyn Directory>,
        ledger: Ledger,
        allotments: AllotmentEngine,
        transfers: TransferEngine,
    ) -> Self {
        Self {
            directory,
            ledger,
            allotments,
            transfers,
        }
    }

    pub async fn execute_balance(&self, employee_email: &str) -> CommandResult {
        let result = self.balance_inner(employee_email).await;
        match result {
            Ok((balance_data, message)) => CommandResult::ok(message, balance_data, None),
            Err(err) => CommandResult::fail(&err),
        }
    }

    async fn balance_inner(&self, employee_email: &str) -> Result<(Value, String), LedgerError> {
        let employee = self
            .directory
            .employee_by_email(employee_email)
            .await?
            .ok_or_else(|| LedgerError::EmployeeNotFound(employee_email.to_string()))?;

        let view = match self
            .ledger
            .store()
            .find_account(&AccountOwner::Employee(employee.id))
            .await?
        {
            Some(account) => self.ledger.balance(account.id, true).await?,
            None => crate::account::BalanceView::zero(),
        };

        let data = json!({
            "posted": view.posted.to_display(),
            "pending": view.pending.to_display(),
            "total": view.total.to_display(),
        });
        let message = format!("Your balance is {} guincoin.", view.total);
        Ok((data, message))
    }

    pub async fn execute_award(
        &self,
        manager_email: &str,
        target_email: &str,
        amount: &str,
        description: &str,
    ) -> CommandResult {
        let result = async {
            let amount = Coins::parse(amount)?;
            let manager = self
                .directory
                .employee_by_email(manager_email)
                .await?
                .ok_or_else(|| LedgerError::EmployeeNotFound(manager_email.to_string()))?;

            self.allotments
                .award_coins(manager.id, target_email, amount, description)
                .await
        }
        .await;

        match result {
            Ok(receipt) => CommandResult::ok(
                format!(
                    "Awarded {} guincoin to {}.",
                    receipt.credit.amount, target_email
                ),
                // `remaining` is for the budget owner's private channel only.
                json!({ "remaining": receipt.remaining.to_display() }),
                Some(receipt.credit.id),
            ),
            Err(err) => CommandResult::fail(&err),
        }
    }

    pub async fn execute_transfer(
        &self,
        sender_email: &str,
        target_email: &str,
        amount: &str,
        message: &str,
    ) -> CommandResult {
        let result = async {
            let amount = Coins::parse(amount)?;
            let sender = self
                .directory
                .employee_by_email(sender_email)
                .await?
                .ok_or_else(|| LedgerError::EmployeeNotFound(sender_email.to_string()))?;

            self.transfers
                .transfer(sender.id, target_email, amount, message)
                .await
        }
        .await;

        match result {
            Ok(outcome) => {
                let balance = outcome.sender_balance();
                let data = json!({
                    "isPending": outcome.is_pending(),
                    "posted": balance.posted.to_display(),
                    "pending": balance.pending.to_display(),
                    "total": balance.total.to_display(),
                });
                let text = match &outcome {
                    TransferOutcome::Completed { sent, .. } => {
                        format!("Sent {} guincoin to {}.", sent.amount, target_email)
                    }
                    TransferOutcome::Escrowed { pending, .. } => format!(
                        "{} guincoin are waiting for {} to join.",
                        pending.amount, target_email
                    ),
                };
                CommandResult::ok(text, data, Some(outcome.sent_transaction_id()))
            }
            Err(err) => CommandResult::fail(&err),
        }
    }
}
