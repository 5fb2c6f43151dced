// src/allotment.rs
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::account::AccountOwner;
use crate::amount::Coins;
use crate::directory::Directory;
use crate::error::LedgerError;
use crate::hash_idempotency_key;
use crate::ledger::{Ledger, run_plan};
use crate::limits::current_month_window;
use crate::notify::{Notification, Notifier, send_fire_and_forget};
use crate::plan::ExecutionPlan;
use crate::transaction::{LedgerTransaction, TransactionStatus, TransactionType};

/// A manager's award budget, viewed as its own pseudo-account.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AllotmentView {
    pub balance: Coins,
    pub used_this_period: Coins,
    pub recurring_budget: Coins,
    pub remaining: Coins,
}

/// Result of a funded award: the two posted legs plus the budget remaining.
/// `remaining` is for the budget owner's eyes only; the presentation layer
/// decides channel visibility.
#[derive(Debug, Clone)]
pub struct AwardReceipt {
    pub debit: LedgerTransaction,
    pub credit: LedgerTransaction,
    pub remaining: Coins,
}

/// Manages manager award budgets: deposits, the recurring budget setting, and
/// funding awards out of the allotment account.
#[derive(Clone)]
pub struct AllotmentEngine {
    ledger: Ledger,
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn Notifier>,
}

impl AllotmentEngine {
    pub fn new(ledger: Ledger, directory: Arc<dyn Directory>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ledger,
            directory,
            notifier,
        }
    }

    pub async fn current_allotment(&self, manager: Uuid) -> Result<AllotmentView, LedgerError> {
        let recurring_budget = self.ledger.store().recurring_budget(manager).await?;

        let account = match self
            .ledger
            .store()
            .find_account(&AccountOwner::ManagerAllotment(manager))
            .await?
        {
            Some(account) => account,
            None => {
                return Ok(AllotmentView {
                    balance: Coins::ZERO,
                    used_this_period: Coins::ZERO,
                    recurring_budget,
                    remaining: Coins::ZERO,
                });
            }
        };

        let window = current_month_window();
        let used_this_period = self
            .ledger
            .store()
            .account_type_total(
                account.id,
                TransactionType::AllotmentAward,
                &[TransactionStatus::Posted, TransactionStatus::Pending],
                Some(window),
            )
            .await?;

        // The materialized balance already reflects posted award debits; only
        // still-pending ones need subtracting.
        let pending_awards = self
            .ledger
            .store()
            .account_type_total(
                account.id,
                TransactionType::AllotmentAward,
                &[TransactionStatus::Pending],
                None,
            )
            .await?;

        Ok(AllotmentView {
            balance: account.balance,
            used_this_period,
            recurring_budget,
            remaining: account.balance - pending_awards,
        })
    }

    /// Advisory pre-flight. The authoritative check runs inside the award's
    /// transaction; a `true` here can still lose to a concurrent award.
    pub async fn can_award(&self, manager: Uuid, amount: Coins) -> Result<bool, LedgerError> {
        if !amount.is_positive() {
            return Ok(false);
        }
        let view = self.current_allotment(manager).await?;
        Ok(view.remaining >= amount)
    }

    /// Fund an award: debit the manager's allotment, credit the recipient.
    /// Both legs post in one atomic plan; the budget is re-verified inside
    /// that transaction regardless of any earlier `can_award` answer.
    pub async fn award_coins(
        &self,
        manager: Uuid,
        recipient_email: &str,
        amount: Coins,
        description: &str,
    ) -> Result<AwardReceipt, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }

        let manager_record = self
            .directory
            .employee_by_id(manager)
            .await?
            .ok_or_else(|| LedgerError::EmployeeNotFound(manager.to_string()))?;
        if !manager_record.manager {
            return Err(LedgerError::NotAManager(manager_record.email));
        }

        let recipient = self
            .directory
            .employee_by_email(recipient_email)
            .await?
            .ok_or_else(|| LedgerError::EmployeeNotFound(recipient_email.to_string()))?;

        let allotment = self
            .ledger
            .ensure_account(AccountOwner::ManagerAllotment(manager))
            .await?;
        let recipient_account = self
            .ledger
            .ensure_account(AccountOwner::Employee(recipient.id))
            .await?;

        let debit = LedgerTransaction::new(
            allotment.id,
            TransactionType::AllotmentAward,
            amount,
            description,
        )
        .with_source(manager)
        .with_target(recipient.id);
        let credit = LedgerTransaction::new(
            recipient_account.id,
            TransactionType::ManagerAward,
            amount,
            description,
        )
        .with_source(manager)
        .with_target(recipient.id);

        let mut plan = ExecutionPlan::new();
        plan.create_and_post(debit.clone());
        plan.create_and_post(credit.clone());
        let guards = plan.balance_guards();

        run_plan(self.ledger.store(), &plan, &guards)
            .await
            .map_err(|e| match e {
                LedgerError::InsufficientBalance => LedgerError::BudgetExceeded,
                other => other,
            })?;

        info!(
            manager = %manager,
            recipient = %recipient.id,
            amount = %amount,
            "award posted"
        );

        send_fire_and_forget(
            Arc::clone(&self.notifier),
            Notification::new(
                recipient.email.clone(),
                json!({
                    "event": "award",
                    "amount": amount.to_display(),
                    "message": description,
                }),
            ),
        );

        let view = self.current_allotment(manager).await?;
        Ok(AwardReceipt {
            debit,
            credit,
            remaining: view.remaining,
        })
    }

    /// Admin surface: deposit into (or, with a negative amount, deduct from)
    /// the allotment. The resulting balance may not go negative. An optional
    /// idempotency key lets the recurring-deposit job re-run safely.
    pub async fn deposit_allotment(
        &self,
        manager: Uuid,
        amount: Coins,
        description: &str,
        idempotency_key: Option<&str>,
    ) -> Result<LedgerTransaction, LedgerError> {
        if amount == Coins::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let allotment = self
            .ledger
            .ensure_account(AccountOwner::ManagerAllotment(manager))
            .await?;

        let mut transaction = LedgerTransaction::new(
            allotment.id,
            TransactionType::AllotmentDeposit,
            amount,
            description,
        );
        if let Some(key) = idempotency_key {
            transaction = transaction.with_idempotency_key(hash_idempotency_key(key));
        }

        let mut plan = ExecutionPlan::new();
        plan.create_and_post(transaction.clone());
        let guards = plan.balance_guards();
        run_plan(self.ledger.store(), &plan, &guards).await?;

        info!(manager = %manager, amount = %amount, "allotment deposit posted");
        Ok(transaction)
    }

    /// Set the per-period auto-deposit amount; zero disables it. The cron that
    /// applies it lives with the scheduling collaborator and calls
    /// `deposit_allotment` with an idempotency key.
    pub async fn set_recurring_budget(
        &self,
        manager: Uuid,
        amount: Coins,
    ) -> Result<(), LedgerError> {
        if amount.is_negative() {
            return Err(LedgerError::InvalidAmount);
        }
        self.ledger
            .store()
            .set_recurring_budget(manager, amount)
            .await
    }
}
