// src/plan.rs
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::amount::Coins;
use crate::pending::PendingTransfer;
use crate::transaction::LedgerTransaction;

/// A single step inside an atomic plan.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Insert a transaction in pending state. Fails on a duplicate
    /// idempotency key.
    CreateTransaction { transaction: LedgerTransaction },
    /// Transition pending → posted, stamp `posted_at`, and apply the signed
    /// amount to the account's materialized balance. Fails if the transaction
    /// is not pending — the guard against double-posting.
    PostTransaction { transaction_id: Uuid },
    /// Transition pending → rejected. No balance effect.
    RejectTransaction { transaction_id: Uuid },
    /// Persist an escrow record for an unprovisioned recipient.
    CreatePendingTransfer { transfer: PendingTransfer },
    /// Remove an escrow record. Fails (aborting the plan) if it is already
    /// gone — the guard against double-crediting a claim.
    DeletePendingTransfer { transfer_id: Uuid },
}

/// A precondition verified inside the store's transaction, after locking and
/// before any operation runs. Checking these outside the transaction is the
/// overdraft race this crate exists to prevent.
#[derive(Debug, Clone)]
pub enum Guard {
    /// Available balance (posted minus pending debits) of `account` must be at
    /// least `required`.
    AvailableBalance { account: Uuid, required: Coins },
    /// The employee's sent total (posted + pending) within the window, plus
    /// `adding`, must not exceed `max`. Usage is recomputed inside the
    /// transaction, never trusted from an earlier read.
    TransferLimit {
        employee: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        max: Coins,
        adding: Coins,
    },
}

/// An ordered set of operations that the store commits or aborts as one unit.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    operations: Vec<Operation>,
}

impl ExecutionPlan {
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    pub fn add(&mut self, op: Operation) {
        self.operations.push(op);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Create a transaction and post it within the same plan. Returns the
    /// transaction id for linking (e.g. escrow records).
    pub fn create_and_post(&mut self, transaction: LedgerTransaction) -> Uuid {
        let id = transaction.id;
        self.add(Operation::CreateTransaction { transaction });
        self.add(Operation::PostTransaction { transaction_id: id });
        id
    }

    /// Aggregate debit exposure per account for transactions both created and
    /// posted by this plan. Engines turn this into `AvailableBalance` guards,
    /// so every debit the plan introduces is covered by an in-transaction
    /// balance check.
    pub fn debit_requirements(&self) -> Vec<(Uuid, Coins)> {
        let mut created: HashMap<Uuid, &LedgerTransaction> = HashMap::new();
        for op in &self.operations {
            if let Operation::CreateTransaction { transaction } = op {
                created.insert(transaction.id, transaction);
            }
        }

        let mut required: HashMap<Uuid, Coins> = HashMap::new();
        for op in &self.operations {
            if let Operation::PostTransaction { transaction_id } = op {
                if let Some(tx) = created.get(transaction_id) {
                    let exposure = tx.debit_exposure();
                    if exposure.is_positive() {
                        *required.entry(tx.account).or_insert(Coins::ZERO) += exposure;
                    }
                }
            }
        }

        let mut out: Vec<(Uuid, Coins)> = required.into_iter().collect();
        // Stable lock acquisition order across concurrent plans.
        out.sort_by_key(|(account, _)| *account);
        out
    }

    /// Balance guards derived from this plan's own debits.
    pub fn balance_guards(&self) -> Vec<Guard> {
        self.debit_requirements()
            .into_iter()
            .map(|(account, required)| Guard::AvailableBalance { account, required })
            .collect()
    }
}
