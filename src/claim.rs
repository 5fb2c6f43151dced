// src/claim.rs
use tracing::info;
use uuid::Uuid;

use crate::account::AccountOwner;
use crate::amount::Coins;
use crate::error::LedgerError;
use crate::ledger::{Ledger, run_plan};
use crate::plan::{ExecutionPlan, Operation};
use crate::transaction::{LedgerTransaction, TransactionType};

/// What a claim run credited.
#[derive(Debug, Clone)]
pub struct ClaimSummary {
    pub credited: Vec<LedgerTransaction>,
    pub skipped: usize,
    pub total: Coins,
}

impl ClaimSummary {
    fn empty() -> Self {
        Self {
            credited: Vec::new(),
            skipped: 0,
            total: Coins::ZERO,
        }
    }
}

/// Converts escrowed transfers into posted credits once their recipient
/// becomes a real account holder. Invoked by the auth collaborator when a new
/// employee record is created or matched.
#[derive(Clone)]
pub struct ClaimProcess {
    ledger: Ledger,
}

impl ClaimProcess {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Claim every pending transfer addressed to `email` into the employee's
    /// account. Each transfer is credited and deleted in one atomic unit, so a
    /// retried auth callback finds nothing left to claim and skips it instead
    /// of crediting twice.
    pub async fn claim_for(
        &self,
        employee: Uuid,
        email: &str,
    ) -> Result<ClaimSummary, LedgerError> {
        let account = self
            .ledger
            .ensure_account(AccountOwner::Employee(employee))
            .await?;

        let email = email.trim().to_lowercase();
        let transfers = self.ledger.store().pending_transfers_for(&email).await?;

        let mut summary = ClaimSummary::empty();
        for transfer in transfers {
            let credit = LedgerTransaction::new(
                account.id,
                TransactionType::PeerTransferReceived,
                transfer.amount,
                transfer.message.clone(),
            )
            .with_source(transfer.sender_employee)
            .with_target(employee);

            let mut plan = ExecutionPlan::new();
            plan.create_and_post(credit.clone());
            plan.add(Operation::DeletePendingTransfer {
                transfer_id: transfer.id,
            });

            match run_plan(self.ledger.store(), &plan, &[]).await {
                Ok(()) => {
                    summary.total += credit.amount;
                    summary.credited.push(credit);
                }
                // Another claim got there first; the whole plan rolled back.
                Err(LedgerError::PendingTransferNotFound) => summary.skipped += 1,
                Err(other) => return Err(other),
            }
        }

        if !summary.credited.is_empty() || summary.skipped > 0 {
            info!(
                employee = %employee,
                credited = summary.credited.len(),
                skipped = summary.skipped,
                total = %summary.total,
                "pending transfers claimed"
            );
        }

        Ok(summary)
    }
}
