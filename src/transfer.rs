// src/transfer.rs
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::account::{AccountOwner, BalanceView};
use crate::amount::Coins;
use crate::directory::Directory;
use crate::error::LedgerError;
use crate::ledger::{Ledger, run_plan};
use crate::notify::{Notification, Notifier, send_fire_and_forget};
use crate::pending::PendingTransfer;
use crate::plan::{ExecutionPlan, Guard, Operation};
use crate::transaction::{LedgerTransaction, TransactionType};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferConfig {
    /// When set, escrow transfers may only target emails in this domain.
    pub allowed_recipient_domain: Option<String>,
}

/// Terminal state of a transfer attempt that was authorized and committed.
#[derive(Debug, Clone)]
pub enum TransferOutcome {
    /// Both legs posted: recipient was a provisioned employee.
    Completed {
        sent: LedgerTransaction,
        received: LedgerTransaction,
        sender_balance: BalanceView,
    },
    /// Sender debited, value escrowed for an unregistered recipient.
    Escrowed {
        pending: PendingTransfer,
        sender_balance: BalanceView,
    },
}

impl TransferOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Escrowed { .. })
    }

    pub fn sent_transaction_id(&self) -> Uuid {
        match self {
            Self::Completed { sent, .. } => sent.id,
            Self::Escrowed { pending, .. } => pending.debit_transaction,
        }
    }

    pub fn sender_balance(&self) -> &BalanceView {
        match self {
            Self::Completed { sender_balance, .. } | Self::Escrowed { sender_balance, .. } => {
                sender_balance
            }
        }
    }
}

/// Orchestrates user-to-user transfers: validation, in-transaction balance and
/// limit enforcement, dual-entry posting, and the escrow path for recipients
/// that do not exist yet.
#[derive(Clone)]
pub struct TransferEngine {
    ledger: Ledger,
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn Notifier>,
    config: TransferConfig,
}

impl TransferEngine {
    pub fn new(
        ledger: Ledger,
        directory: Arc<dyn Directory>,
        notifier: Arc<dyn Notifier>,
        config: TransferConfig,
    ) -> Self {
        Self {
            ledger,
            directory,
            notifier,
            config,
        }
    }

    /// Run a transfer attempt to completion. Validation order is fixed; the
    /// first failure wins. Balance and limit are NOT checked here — they are
    /// guards verified inside the store transaction, alongside the debit.
    pub async fn transfer(
        &self,
        sender: Uuid,
        recipient_email: &str,
        amount: Coins,
        message: &str,
    ) -> Result<TransferOutcome, LedgerError> {
        let sender_record = self
            .directory
            .employee_by_id(sender)
            .await?
            .ok_or_else(|| LedgerError::EmployeeNotFound(sender.to_string()))?;
        let sender_account = self
            .ledger
            .store()
            .find_account(&AccountOwner::Employee(sender))
            .await?
            .ok_or(LedgerError::AccountNotFound)?;

        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }

        let recipient_email = recipient_email.trim().to_lowercase();
        if recipient_email == sender_record.email {
            return Err(LedgerError::SelfTransfer);
        }

        let recipient = self.directory.employee_by_email(&recipient_email).await?;
        if let Some(ref recipient) = recipient {
            if recipient.id == sender {
                return Err(LedgerError::SelfTransfer);
            }
        }

        let mut guards = Vec::new();
        if let Some(limit) = self.ledger.store().get_transfer_limit(sender).await? {
            if limit.contains(Utc::now()) {
                guards.push(Guard::TransferLimit {
                    employee: sender,
                    period_start: limit.period_start,
                    period_end: limit.period_end,
                    max: limit.max_amount,
                    adding: amount,
                });
            }
        }

        let outcome = match recipient {
            Some(recipient) => {
                let recipient_account = self
                    .ledger
                    .ensure_account(AccountOwner::Employee(recipient.id))
                    .await?;

                let sent = LedgerTransaction::new(
                    sender_account.id,
                    TransactionType::PeerTransferSent,
                    amount,
                    message,
                )
                .with_source(sender)
                .with_target(recipient.id);
                let received = LedgerTransaction::new(
                    recipient_account.id,
                    TransactionType::PeerTransferReceived,
                    amount,
                    message,
                )
                .with_source(sender)
                .with_target(recipient.id);

                let mut plan = ExecutionPlan::new();
                plan.create_and_post(sent.clone());
                plan.create_and_post(received.clone());
                guards.extend(plan.balance_guards());

                run_plan(self.ledger.store(), &plan, &guards).await?;

                info!(
                    sender = %sender,
                    recipient = %recipient.id,
                    amount = %amount,
                    "transfer posted"
                );

                send_fire_and_forget(
                    Arc::clone(&self.notifier),
                    Notification::new(
                        recipient.email.clone(),
                        json!({
                            "event": "transfer",
                            "from": sender_record.email,
                            "amount": amount.to_display(),
                            "message": message,
                        }),
                    ),
                );

                let sender_balance = self.ledger.balance(sender_account.id, false).await?;
                TransferOutcome::Completed {
                    sent,
                    received,
                    sender_balance,
                }
            }
            None => {
                if let Some(ref domain) = self.config.allowed_recipient_domain {
                    if recipient_email
                        .rsplit_once('@')
                        .map(|(_, d)| d != domain)
                        .unwrap_or(true)
                    {
                        return Err(LedgerError::RecipientDomainNotAllowed(recipient_email));
                    }
                }

                let sent = LedgerTransaction::new(
                    sender_account.id,
                    TransactionType::PeerTransferSent,
                    amount,
                    message,
                )
                .with_source(sender);
                let pending =
                    PendingTransfer::new(sender, recipient_email.clone(), amount, message, sent.id);

                // The sender is charged now; the escrow record, not a balance,
                // carries the value until the recipient signs in.
                let mut plan = ExecutionPlan::new();
                plan.create_and_post(sent);
                plan.add(Operation::CreatePendingTransfer {
                    transfer: pending.clone(),
                });
                guards.extend(plan.balance_guards());

                run_plan(self.ledger.store(), &plan, &guards).await?;

                info!(
                    sender = %sender,
                    recipient = %recipient_email,
                    amount = %amount,
                    "transfer escrowed for unregistered recipient"
                );

                send_fire_and_forget(
                    Arc::clone(&self.notifier),
                    Notification::new(
                        recipient_email,
                        json!({
                            "event": "transfer_pending",
                            "from": sender_record.email,
                            "amount": amount.to_display(),
                            "message": message,
                        }),
                    ),
                );

                let sender_balance = self.ledger.balance(sender_account.id, false).await?;
                TransferOutcome::Escrowed {
                    pending,
                    sender_balance,
                }
            }
        };

        Ok(outcome)
    }
}
