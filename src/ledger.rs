// src/ledger.rs
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::account::{Account, AccountOwner, BalanceView};
use crate::amount::Coins;
use crate::error::LedgerError;
use crate::plan::{ExecutionPlan, Guard, Operation};
use crate::transaction::{LedgerTransaction, TransactionType};
use crate::{HistoryQuery, LedgerStore};

/// Execute a plan with metrics around it. All engines funnel through here.
pub(crate) async fn run_plan(
    store: &dyn LedgerStore,
    plan: &ExecutionPlan,
    guards: &[Guard],
) -> Result<(), LedgerError> {
    for op in plan.operations() {
        if let Operation::CreateTransaction { transaction } = op {
            histogram!("ledger.transaction.amount", "type" => transaction.tx_type.as_str())
                .record(transaction.amount.to_display().abs());
        }
    }

    let result = store.execute_plan(plan, guards).await;

    counter!("ledger.plans.total",
        "status" => if result.is_ok() { "success" } else { "failed" }
    )
    .increment(1);

    result
}

/// Service facade over the ledger store: account provisioning, balance and
/// history reads, the posting state machine, and the admin/reporting surfaces.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    /// Find the owner's account, creating it on first need. Accounts are
    /// created exactly once and never deleted.
    pub async fn ensure_account(&self, owner: AccountOwner) -> Result<Account, LedgerError> {
        if let Some(account) = self.store.find_account(&owner).await? {
            return Ok(account);
        }
        let account = Account::new(owner);
        match self.store.create_account(account.clone()).await {
            Ok(()) => {
                info!(account = %account.id, kind = owner.kind_str(), "account created");
                Ok(account)
            }
            // Lost a creation race; hand back the winner's account.
            Err(LedgerError::Conflict(_)) => self
                .store
                .find_account(&owner)
                .await?
                .ok_or(LedgerError::AccountNotFound),
            Err(e) => Err(e),
        }
    }

    pub async fn balance(
        &self,
        account: Uuid,
        include_pending: bool,
    ) -> Result<BalanceView, LedgerError> {
        self.store.balance(account, include_pending).await
    }

    pub async fn history(
        &self,
        account: Uuid,
        query: &HistoryQuery,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        self.store.transaction_history(account, query).await
    }

    pub async fn pending(&self, account: Uuid) -> Result<Vec<LedgerTransaction>, LedgerError> {
        self.store.pending_transactions(account).await
    }

    /// Create a transaction in pending state without posting it (e.g. a held
    /// reward awaiting approval). Unsigned types require a positive amount;
    /// signed types only a nonzero one.
    pub async fn create_pending_transaction(
        &self,
        account: Uuid,
        tx_type: TransactionType,
        amount: Coins,
        description: impl Into<String>,
        source_employee: Option<Uuid>,
    ) -> Result<LedgerTransaction, LedgerError> {
        if tx_type.is_signed() {
            if amount == Coins::ZERO {
                return Err(LedgerError::InvalidAmount);
            }
        } else if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }

        let mut transaction = LedgerTransaction::new(account, tx_type, amount, description);
        if let Some(employee) = source_employee {
            transaction = transaction.with_source(employee);
        }

        let mut plan = ExecutionPlan::new();
        plan.add(Operation::CreateTransaction {
            transaction: transaction.clone(),
        });
        run_plan(self.store.as_ref(), &plan, &[]).await?;
        Ok(transaction)
    }

    /// Post a previously created pending transaction. A second call for the
    /// same id is rejected — the balance effect applies exactly once.
    ///
    /// No `AvailableBalance` guard here: the pending-debit reservation would
    /// count the transaction being posted against itself. The adapters roll
    /// back any post that would drive the balance negative.
    pub async fn post_transaction(&self, transaction_id: Uuid) -> Result<(), LedgerError> {
        let mut plan = ExecutionPlan::new();
        plan.add(Operation::PostTransaction { transaction_id });
        run_plan(self.store.as_ref(), &plan, &[]).await
    }

    /// Reject a pending transaction. Terminal, no balance effect.
    pub async fn reject_transaction(&self, transaction_id: Uuid) -> Result<(), LedgerError> {
        let mut plan = ExecutionPlan::new();
        plan.add(Operation::RejectTransaction { transaction_id });
        run_plan(self.store.as_ref(), &plan, &[]).await
    }

    /// Admin surface: signed manual correction. Negative adjustments are
    /// guarded so the balance cannot go below zero.
    pub async fn post_adjustment(
        &self,
        account: Uuid,
        amount: Coins,
        description: impl Into<String>,
    ) -> Result<LedgerTransaction, LedgerError> {
        if amount == Coins::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let transaction =
            LedgerTransaction::new(account, TransactionType::Adjustment, amount, description);
        let mut plan = ExecutionPlan::new();
        plan.create_and_post(transaction.clone());
        let guards = plan.balance_guards();
        run_plan(self.store.as_ref(), &plan, &guards).await?;
        Ok(transaction)
    }

    /// Credit a wellness-task reward to an employee's account.
    pub async fn grant_reward(
        &self,
        employee: Uuid,
        amount: Coins,
        description: impl Into<String>,
    ) -> Result<LedgerTransaction, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }
        let account = self.ensure_account(AccountOwner::Employee(employee)).await?;
        let transaction = LedgerTransaction::new(
            account.id,
            TransactionType::WellnessReward,
            amount,
            description,
        )
        .with_target(employee);

        let mut plan = ExecutionPlan::new();
        plan.create_and_post(transaction.clone());
        run_plan(self.store.as_ref(), &plan, &[]).await?;
        Ok(transaction)
    }

    /// Debit a store purchase, guarded against overdrawing.
    pub async fn record_purchase(
        &self,
        employee: Uuid,
        amount: Coins,
        description: impl Into<String>,
    ) -> Result<LedgerTransaction, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }
        let account = self
            .store
            .find_account(&AccountOwner::Employee(employee))
            .await?
            .ok_or(LedgerError::AccountNotFound)?;

        let transaction = LedgerTransaction::new(
            account.id,
            TransactionType::StorePurchase,
            amount,
            description,
        )
        .with_source(employee);

        let mut plan = ExecutionPlan::new();
        plan.create_and_post(transaction.clone());
        let guards = plan.balance_guards();
        run_plan(self.store.as_ref(), &plan, &guards).await?;
        Ok(transaction)
    }

    // Reporting surface. Read-only; must not lock the ledger for writers.

    pub async fn all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.store.all_accounts().await
    }

    pub async fn recent_transactions(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        self.store.recent_transactions(since, limit).await
    }
}
