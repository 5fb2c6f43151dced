// src/adapters/memory.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use crate::account::{Account, AccountOwner, BalanceView};
use crate::amount::Coins;
use crate::error::LedgerError;
use crate::limits::TransferLimit;
use crate::pending::PendingTransfer;
use crate::plan::{ExecutionPlan, Guard, Operation};
use crate::transaction::{LedgerTransaction, TransactionStatus, TransactionType};
use crate::{HistoryQuery, LedgerStore};

#[derive(Clone, Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    transactions: HashMap<Uuid, LedgerTransaction>,
    pending_transfers: HashMap<Uuid, PendingTransfer>,
    limits: HashMap<Uuid, TransferLimit>,
    recurring: HashMap<Uuid, Coins>,
    idempotency_keys: HashSet<String>,
}

impl Inner {
    fn posted_balance(&self, account: Uuid) -> Coins {
        self.accounts
            .get(&account)
            .map(|a| a.balance)
            .unwrap_or(Coins::ZERO)
    }

    fn pending_signed_sum(&self, account: Uuid) -> Coins {
        self.transactions
            .values()
            .filter(|tx| tx.account == account && tx.status == TransactionStatus::Pending)
            .map(|tx| tx.signed_amount())
            .sum()
    }

    fn pending_debit_sum(&self, account: Uuid) -> Coins {
        self.transactions
            .values()
            .filter(|tx| tx.account == account && tx.status == TransactionStatus::Pending)
            .map(|tx| tx.debit_exposure())
            .sum()
    }

    fn sent_in_window(&self, employee: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> Coins {
        self.transactions
            .values()
            .filter(|tx| {
                tx.source_employee == Some(employee)
                    && tx.tx_type == TransactionType::PeerTransferSent
                    && matches!(
                        tx.status,
                        TransactionStatus::Posted | TransactionStatus::Pending
                    )
                    && tx.created_at >= start
                    && tx.created_at < end
            })
            .map(|tx| tx.amount)
            .sum()
    }

    fn check_guard(&self, guard: &Guard) -> Result<(), LedgerError> {
        match guard {
            Guard::AvailableBalance { account, required } => {
                let available = self.posted_balance(*account) - self.pending_debit_sum(*account);
                if available < *required {
                    return Err(LedgerError::InsufficientBalance);
                }
            }
            Guard::TransferLimit {
                employee,
                period_start,
                period_end,
                max,
                adding,
            } => {
                let used = self.sent_in_window(*employee, *period_start, *period_end);
                if used + *adding > *max {
                    return Err(LedgerError::TransferLimitExceeded);
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: &Operation) -> Result<(), LedgerError> {
        match op {
            Operation::CreateTransaction { transaction } => {
                if let Some(key) = &transaction.idempotency_key {
                    if !self.idempotency_keys.insert(key.clone()) {
                        return Err(LedgerError::DuplicateIdempotencyKey);
                    }
                }
                if self.transactions.contains_key(&transaction.id) {
                    return Err(LedgerError::Conflict(format!(
                        "transaction {} already exists",
                        transaction.id
                    )));
                }
                self.transactions.insert(transaction.id, transaction.clone());
            }
            Operation::PostTransaction { transaction_id } => {
                let tx = self
                    .transactions
                    .get_mut(transaction_id)
                    .ok_or(LedgerError::TransactionNotFound)?;
                if tx.status != TransactionStatus::Pending {
                    return Err(LedgerError::TransactionNotPending(*transaction_id));
                }
                tx.status = TransactionStatus::Posted;
                tx.posted_at = Some(Utc::now());
                let signed = tx.signed_amount();
                let account_id = tx.account;
                let account = self
                    .accounts
                    .get_mut(&account_id)
                    .ok_or(LedgerError::AccountNotFound)?;
                account.balance += signed;
            }
            Operation::RejectTransaction { transaction_id } => {
                let tx = self
                    .transactions
                    .get_mut(transaction_id)
                    .ok_or(LedgerError::TransactionNotFound)?;
                if tx.status != TransactionStatus::Pending {
                    return Err(LedgerError::TransactionNotPending(*transaction_id));
                }
                tx.status = TransactionStatus::Rejected;
            }
            Operation::CreatePendingTransfer { transfer } => {
                if self.pending_transfers.contains_key(&transfer.id) {
                    return Err(LedgerError::Conflict(format!(
                        "pending transfer {} already exists",
                        transfer.id
                    )));
                }
                self.pending_transfers.insert(transfer.id, transfer.clone());
            }
            Operation::DeletePendingTransfer { transfer_id } => {
                if self.pending_transfers.remove(transfer_id).is_none() {
                    return Err(LedgerError::PendingTransferNotFound);
                }
            }
        }
        Ok(())
    }
}

/// In-memory adapter. One mutex over the whole store stands in for
/// serializable isolation: plans execute one at a time, and a failed plan
/// restores the pre-plan snapshot so no partial write survives.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        guards: &[Guard],
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().unwrap();

        // Guards verified under the lock, against committed state only.
        for guard in guards {
            inner.check_guard(guard)?;
        }

        let snapshot = inner.clone();
        for op in plan.operations() {
            if let Err(e) = inner.apply(op) {
                *inner = snapshot;
                return Err(e);
            }
        }

        // Backstop: no sequence of operations may leave a balance negative.
        if inner.accounts.values().any(|a| a.balance.is_negative()) {
            *inner = snapshot;
            return Err(LedgerError::InsufficientBalance);
        }

        Ok(())
    }

    async fn create_account(&self, account: Account) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .accounts
            .values()
            .any(|a| a.owner == account.owner || a.id == account.id)
        {
            return Err(LedgerError::Conflict(format!(
                "account for {:?} already exists",
                account.owner
            )));
        }
        inner.accounts.insert(account.id, account);
        Ok(())
    }

    async fn find_account(&self, owner: &AccountOwner) -> Result<Option<Account>, LedgerError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.accounts.values().find(|a| a.owner == *owner).cloned())
    }

    async fn get_account(&self, id: Uuid) -> Result<Account, LedgerError> {
        let inner = self.inner.lock().unwrap();
        inner
            .accounts
            .get(&id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound)
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let inner = self.inner.lock().unwrap();
        let mut accounts: Vec<Account> = inner.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    async fn get_transaction(&self, id: Uuid) -> Result<LedgerTransaction, LedgerError> {
        let inner = self.inner.lock().unwrap();
        inner
            .transactions
            .get(&id)
            .cloned()
            .ok_or(LedgerError::TransactionNotFound)
    }

    async fn balance(
        &self,
        account: Uuid,
        include_pending: bool,
    ) -> Result<BalanceView, LedgerError> {
        let inner = self.inner.lock().unwrap();
        if !inner.accounts.contains_key(&account) {
            return Ok(BalanceView::zero());
        }
        let posted = inner.posted_balance(account);
        let pending = if include_pending {
            inner.pending_signed_sum(account)
        } else {
            Coins::ZERO
        };
        Ok(BalanceView::new(posted, pending))
    }

    async fn transaction_history(
        &self,
        account: Uuid,
        query: &HistoryQuery,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let inner = self.inner.lock().unwrap();
        let mut matching: Vec<LedgerTransaction> = inner
            .transactions
            .values()
            .filter(|tx| {
                tx.account == account
                    && query.status.map(|s| tx.status == s).unwrap_or(true)
                    && query.tx_type.map(|t| tx.tx_type == t).unwrap_or(true)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn pending_transactions(
        &self,
        account: Uuid,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let inner = self.inner.lock().unwrap();
        let mut matching: Vec<LedgerTransaction> = inner
            .transactions
            .values()
            .filter(|tx| tx.account == account && tx.status == TransactionStatus::Pending)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(matching)
    }

    async fn recent_transactions(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let inner = self.inner.lock().unwrap();
        let mut matching: Vec<LedgerTransaction> = inner
            .transactions
            .values()
            .filter(|tx| tx.created_at >= since)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn account_type_total(
        &self,
        account: Uuid,
        tx_type: TransactionType,
        statuses: &[TransactionStatus],
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Coins, LedgerError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .transactions
            .values()
            .filter(|tx| {
                tx.account == account
                    && tx.tx_type == tx_type
                    && statuses.contains(&tx.status)
                    && window
                        .map(|(start, end)| tx.created_at >= start && tx.created_at < end)
                        .unwrap_or(true)
            })
            .map(|tx| tx.amount)
            .sum())
    }

    async fn sent_total_in_window(
        &self,
        employee: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Coins, LedgerError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sent_in_window(employee, start, end))
    }

    async fn pending_transfers_for(
        &self,
        email: &str,
    ) -> Result<Vec<PendingTransfer>, LedgerError> {
        let inner = self.inner.lock().unwrap();
        let mut matching: Vec<PendingTransfer> = inner
            .pending_transfers
            .values()
            .filter(|t| t.recipient_email == email)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(matching)
    }

    async fn get_transfer_limit(
        &self,
        employee: Uuid,
    ) -> Result<Option<TransferLimit>, LedgerError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.limits.get(&employee).cloned())
    }

    async fn set_transfer_limit(&self, limit: TransferLimit) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.limits.insert(limit.employee, limit);
        Ok(())
    }

    async fn recurring_budget(&self, manager: Uuid) -> Result<Coins, LedgerError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .recurring
            .get(&manager)
            .copied()
            .unwrap_or(Coins::ZERO))
    }

    async fn set_recurring_budget(&self, manager: Uuid, amount: Coins) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        if amount == Coins::ZERO {
            inner.recurring.remove(&manager);
        } else {
            inner.recurring.insert(manager, amount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_account(store: &MemoryStore, balance: Coins) -> Account {
        let account = Account::new(AccountOwner::Employee(Uuid::now_v7()));
        {
            let mut inner = store.inner.lock().unwrap();
            let mut seeded = account.clone();
            seeded.balance = balance;
            inner.accounts.insert(seeded.id, seeded);
        }
        account
    }

    #[tokio::test]
    async fn failed_plan_leaves_no_partial_write() {
        let store = MemoryStore::new();
        let account = seeded_account(&store, Coins::from_minor(10_000));

        let credit = LedgerTransaction::new(
            account.id,
            TransactionType::PeerTransferReceived,
            Coins::from_minor(500),
            "leg one",
        );
        let mut plan = ExecutionPlan::new();
        plan.create_and_post(credit);
        // Second op references a transaction that does not exist.
        plan.add(Operation::PostTransaction {
            transaction_id: Uuid::now_v7(),
        });

        let err = store.execute_plan(&plan, &[]).await.unwrap_err();
        assert!(matches!(err, LedgerError::TransactionNotFound));

        let view = store.balance(account.id, true).await.unwrap();
        assert_eq!(view.posted, Coins::from_minor(10_000));
        assert_eq!(view.pending, Coins::ZERO);
    }

    #[tokio::test]
    async fn guard_rejects_before_any_write() {
        let store = MemoryStore::new();
        let account = seeded_account(&store, Coins::from_minor(100));

        let debit = LedgerTransaction::new(
            account.id,
            TransactionType::PeerTransferSent,
            Coins::from_minor(200),
            "too much",
        );
        let mut plan = ExecutionPlan::new();
        plan.create_and_post(debit);
        let guards = plan.balance_guards();

        let err = store.execute_plan(&plan, &guards).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance));
        assert!(
            store
                .transaction_history(account.id, &HistoryQuery::default())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn pending_debits_reduce_availability() {
        let store = MemoryStore::new();
        let account = seeded_account(&store, Coins::from_minor(100));

        // A pending debit of 60 is already committed funds.
        let held = LedgerTransaction::new(
            account.id,
            TransactionType::StorePurchase,
            Coins::from_minor(60),
            "held purchase",
        );
        let mut plan = ExecutionPlan::new();
        plan.add(Operation::CreateTransaction { transaction: held });
        store.execute_plan(&plan, &[]).await.unwrap();

        let guard = Guard::AvailableBalance {
            account: account.id,
            required: Coins::from_minor(50),
        };
        let err = store
            .execute_plan(&ExecutionPlan::new(), &[guard])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance));
    }

    #[tokio::test]
    async fn unknown_account_balance_is_zero() {
        let store = MemoryStore::new();
        let view = store.balance(Uuid::now_v7(), true).await.unwrap();
        assert_eq!(view.posted, Coins::ZERO);
        assert_eq!(view.total, Coins::ZERO);
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_is_rejected() {
        let store = MemoryStore::new();
        let account = seeded_account(&store, Coins::ZERO);

        let make_plan = || {
            let tx = LedgerTransaction::new(
                account.id,
                TransactionType::AllotmentDeposit,
                Coins::from_minor(1000),
                "monthly",
            )
            .with_idempotency_key("hashed-key".to_string());
            let mut plan = ExecutionPlan::new();
            plan.create_and_post(tx);
            plan
        };

        store.execute_plan(&make_plan(), &[]).await.unwrap();
        let err = store.execute_plan(&make_plan(), &[]).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateIdempotencyKey));

        let view = store.balance(account.id, false).await.unwrap();
        assert_eq!(view.posted, Coins::from_minor(1000));
    }
}
