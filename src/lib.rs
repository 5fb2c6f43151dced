// src/lib.rs
pub mod account;
pub mod adapters;
pub mod allotment;
pub mod amount;
pub mod claim;
pub mod command;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod limits;
pub mod notify;
pub mod pending;
pub mod plan;
pub mod transaction;
pub mod transfer;

pub use account::{Account, AccountOwner, BalanceView};
pub use allotment::{AllotmentEngine, AllotmentView};
pub use amount::Coins;
pub use claim::{ClaimProcess, ClaimSummary};
pub use command::{CommandResult, Commands};
pub use directory::{Directory, Employee};
pub use error::LedgerError;
pub use ledger::Ledger;
pub use limits::{LimitPeriod, TransferLimit};
pub use notify::{Notification, Notifier, NullNotifier};
pub use pending::PendingTransfer;
pub use plan::{ExecutionPlan, Guard, Operation};
pub use transaction::{Direction, LedgerTransaction, TransactionStatus, TransactionType};
pub use transfer::{TransferConfig, TransferEngine, TransferOutcome};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Idempotency keys are hashed before storage so raw caller-supplied keys
/// never land in the database.
pub(crate) fn hash_idempotency_key(key: &str) -> String {
    blake3::hash(key.as_bytes()).to_hex().to_string()
}

/// Filters for transaction history reads. Exact-match filters, newest first.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub limit: u32,
    pub offset: u32,
    pub status: Option<TransactionStatus>,
    pub tx_type: Option<TransactionType>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            status: None,
            tx_type: None,
        }
    }
}

/// Storage adapter for the ledger.
///
/// All balance-affecting writes go through `execute_plan`. Implementors MUST:
/// 1. open one database transaction (or equivalent critical section)
/// 2. lock the accounts named by the guards
/// 3. verify every guard against state read under that lock
/// 4. run the operations in order
/// 5. commit on success, roll back on any error
///
/// Reads never block plan execution for longer than a row lock.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn execute_plan(&self, plan: &ExecutionPlan, guards: &[Guard])
    -> Result<(), LedgerError>;

    // ACCOUNTS
    async fn create_account(&self, account: Account) -> Result<(), LedgerError>;
    async fn find_account(&self, owner: &AccountOwner) -> Result<Option<Account>, LedgerError>;
    async fn get_account(&self, id: Uuid) -> Result<Account, LedgerError>;
    async fn all_accounts(&self) -> Result<Vec<Account>, LedgerError>;

    // TRANSACTION READS
    async fn get_transaction(&self, id: Uuid) -> Result<LedgerTransaction, LedgerError>;
    /// Unknown accounts return a zero view; a missing account is an upstream
    /// configuration problem, not a ledger error.
    async fn balance(&self, account: Uuid, include_pending: bool)
    -> Result<BalanceView, LedgerError>;
    async fn transaction_history(
        &self,
        account: Uuid,
        query: &HistoryQuery,
    ) -> Result<Vec<LedgerTransaction>, LedgerError>;
    /// Pending transactions for the account, oldest first.
    async fn pending_transactions(
        &self,
        account: Uuid,
    ) -> Result<Vec<LedgerTransaction>, LedgerError>;
    /// Reporting surface: recent transactions across all accounts.
    async fn recent_transactions(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<LedgerTransaction>, LedgerError>;

    // AGGREGATES
    async fn account_type_total(
        &self,
        account: Uuid,
        tx_type: TransactionType,
        statuses: &[TransactionStatus],
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Coins, LedgerError>;
    /// Posted + pending peer transfers sent by the employee within [start, end).
    async fn sent_total_in_window(
        &self,
        employee: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Coins, LedgerError>;

    // ESCROW
    async fn pending_transfers_for(&self, email: &str)
    -> Result<Vec<PendingTransfer>, LedgerError>;

    // LIMITS & BUDGETS
    async fn get_transfer_limit(&self, employee: Uuid)
    -> Result<Option<TransferLimit>, LedgerError>;
    async fn set_transfer_limit(&self, limit: TransferLimit) -> Result<(), LedgerError>;
    async fn recurring_budget(&self, manager: Uuid) -> Result<Coins, LedgerError>;
    async fn set_recurring_budget(&self, manager: Uuid, amount: Coins) -> Result<(), LedgerError>;
}

/// Initialize the ledger system with a store adapter.
pub struct LedgerSystem {
    store: Arc<dyn LedgerStore>,
}

impl LedgerSystem {
    pub fn new(store: Box<dyn LedgerStore>) -> Self {
        Self {
            store: store.into(),
        }
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub fn store_arc(&self) -> Arc<dyn LedgerStore> {
        Arc::clone(&self.store)
    }
}
