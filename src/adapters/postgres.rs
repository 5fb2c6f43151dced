// src/adapters/postgres.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::account::{Account, AccountOwner, BalanceView};
use crate::amount::Coins;
use crate::error::LedgerError;
use crate::limits::{LimitPeriod, TransferLimit};
use crate::pending::PendingTransfer;
use crate::plan::{ExecutionPlan, Guard, Operation};
use crate::transaction::{LedgerTransaction, TransactionStatus, TransactionType};
use crate::{HistoryQuery, LedgerStore};

pub trait PostgresLedgerStore {
    fn get_pool(&self) -> sqlx::PgPool;
}

#[async_trait]
pub trait PostgresSchemaStore {
    /// Initialize the ledger schema. Call once at startup.
    async fn init_ledger_schema(&self) -> Result<(), LedgerError>;
}

fn storage_err(e: impl ToString) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

/// Serialization failures and deadlocks surface as retryable conflicts, not
/// storage errors.
fn map_db_err(e: sqlx::Error) -> LedgerError {
    if let Some(db) = e.as_database_error() {
        if matches!(db.code().as_deref(), Some("40001") | Some("40P01")) {
            return LedgerError::Conflict(db.message().to_string());
        }
    }
    LedgerError::Storage(e.to_string())
}

#[async_trait]
impl<T> PostgresSchemaStore for T
where
    T: PostgresLedgerStore + Send + Sync,
{
    async fn init_ledger_schema(&self) -> Result<(), LedgerError> {
        let mut tx = self.get_pool().begin().await.map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id UUID PRIMARY KEY,
                owner_kind TEXT NOT NULL CHECK (owner_kind IN ('employee', 'manager_allotment')),
                owner_id UUID NOT NULL,
                balance BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (owner_kind, owner_id)
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        // signed_amount is derived once, in Rust, from the authoritative
        // direction table; SQL aggregates never re-classify types.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_transactions (
                id UUID PRIMARY KEY,
                account UUID NOT NULL REFERENCES accounts(id),
                tx_type TEXT NOT NULL,
                amount BIGINT NOT NULL,
                signed_amount BIGINT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('pending', 'posted', 'rejected')),
                source_employee UUID,
                target_employee UUID,
                idempotency_key TEXT UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                posted_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_account_status
            ON ledger_transactions(account, status)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_sender_window
            ON ledger_transactions(source_employee, tx_type, created_at)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_created
            ON ledger_transactions(created_at)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_transfers (
                id UUID PRIMARY KEY,
                sender_employee UUID NOT NULL,
                recipient_email TEXT NOT NULL,
                amount BIGINT NOT NULL,
                message TEXT NOT NULL,
                debit_transaction UUID NOT NULL REFERENCES ledger_transactions(id),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_pending_transfers_email
            ON pending_transfers(recipient_email)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transfer_limits (
                employee UUID PRIMARY KEY,
                period TEXT NOT NULL,
                period_start TIMESTAMPTZ NOT NULL,
                period_end TIMESTAMPTZ NOT NULL,
                max_amount BIGINT NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS allotment_budgets (
                manager UUID PRIMARY KEY,
                recurring_amount BIGINT NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }
}

fn decode_account(row: &PgRow) -> Result<Account, LedgerError> {
    let kind: String = row.try_get("owner_kind").map_err(storage_err)?;
    let owner_id: Uuid = row.try_get("owner_id").map_err(storage_err)?;
    let owner = AccountOwner::from_parts(&kind, owner_id)
        .ok_or_else(|| LedgerError::Storage(format!("unknown account owner kind: {kind}")))?;

    Ok(Account {
        id: row.try_get("id").map_err(storage_err)?,
        owner,
        balance: Coins::from_minor(row.try_get::<i64, _>("balance").map_err(storage_err)?),
        created_at: row.try_get("created_at").map_err(storage_err)?,
    })
}

fn decode_transaction(row: &PgRow) -> Result<LedgerTransaction, LedgerError> {
    let tx_type: String = row.try_get("tx_type").map_err(storage_err)?;
    let status: String = row.try_get("status").map_err(storage_err)?;

    Ok(LedgerTransaction {
        id: row.try_get("id").map_err(storage_err)?,
        account: row.try_get("account").map_err(storage_err)?,
        tx_type: TransactionType::from_str(&tx_type)
            .ok_or_else(|| LedgerError::Storage(format!("unknown transaction type: {tx_type}")))?,
        amount: Coins::from_minor(row.try_get::<i64, _>("amount").map_err(storage_err)?),
        description: row.try_get("description").map_err(storage_err)?,
        status: TransactionStatus::from_str(&status).ok_or_else(|| {
            LedgerError::Storage(format!("unknown transaction status: {status}"))
        })?,
        source_employee: row.try_get("source_employee").map_err(storage_err)?,
        target_employee: row.try_get("target_employee").map_err(storage_err)?,
        idempotency_key: row.try_get("idempotency_key").map_err(storage_err)?,
        created_at: row.try_get("created_at").map_err(storage_err)?,
        posted_at: row.try_get("posted_at").map_err(storage_err)?,
    })
}

fn decode_pending_transfer(row: &PgRow) -> Result<PendingTransfer, LedgerError> {
    Ok(PendingTransfer {
        id: row.try_get("id").map_err(storage_err)?,
        sender_employee: row.try_get("sender_employee").map_err(storage_err)?,
        recipient_email: row.try_get("recipient_email").map_err(storage_err)?,
        amount: Coins::from_minor(row.try_get::<i64, _>("amount").map_err(storage_err)?),
        message: row.try_get("message").map_err(storage_err)?,
        debit_transaction: row.try_get("debit_transaction").map_err(storage_err)?,
        created_at: row.try_get("created_at").map_err(storage_err)?,
    })
}

const TX_COLUMNS: &str = "id, account, tx_type, amount, description, status, \
     source_employee, target_employee, idempotency_key, created_at, posted_at";

async fn check_guard_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    guard: &Guard,
) -> Result<(), LedgerError> {
    match guard {
        Guard::AvailableBalance { account, required } => {
            // Row lock first: concurrent plans touching this account queue
            // here. Checked INSIDE the lock — this is the overdraft guard.
            let balance: Option<i64> =
                sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1 FOR UPDATE")
                    .bind(account)
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(map_db_err)?;
            let balance = balance.ok_or(LedgerError::AccountNotFound)?;

            let pending_debits: i64 = sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(CASE WHEN signed_amount < 0 THEN -signed_amount ELSE 0 END), 0)::BIGINT
                FROM ledger_transactions
                WHERE account = $1 AND status = 'pending'
                "#,
            )
            .bind(account)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_db_err)?;

            if Coins::from_minor(balance - pending_debits) < *required {
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
            // Recomputed inside the transaction, after the sender's account
            // row is locked, so concurrent transfers cannot both slip under
            // the cap against a stale read.
            let used: i64 = sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(amount), 0)::BIGINT
                FROM ledger_transactions
                WHERE source_employee = $1
                  AND tx_type = $2
                  AND status IN ('pending', 'posted')
                  AND created_at >= $3 AND created_at < $4
                "#,
            )
            .bind(employee)
            .bind(TransactionType::PeerTransferSent.as_str())
            .bind(period_start)
            .bind(period_end)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_db_err)?;

            if Coins::from_minor(used) + *adding > *max {
                return Err(LedgerError::TransferLimitExceeded);
            }
        }
    }
    Ok(())
}

async fn apply_op_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    op: &Operation,
) -> Result<(), LedgerError> {
    match op {
        Operation::CreateTransaction { transaction } => {
            let result = sqlx::query(
                r#"
                INSERT INTO ledger_transactions
                    (id, account, tx_type, amount, signed_amount, description, status,
                     source_employee, target_employee, idempotency_key, created_at, posted_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(transaction.id)
            .bind(transaction.account)
            .bind(transaction.tx_type.as_str())
            .bind(transaction.amount.minor())
            .bind(transaction.signed_amount().minor())
            .bind(&transaction.description)
            .bind(transaction.status.as_str())
            .bind(transaction.source_employee)
            .bind(transaction.target_employee)
            .bind(&transaction.idempotency_key)
            .bind(transaction.created_at)
            .bind(transaction.posted_at)
            .execute(&mut **tx)
            .await;

            if let Err(e) = result {
                if let Some(db) = e.as_database_error() {
                    if db.constraint() == Some("ledger_transactions_idempotency_key_key") {
                        return Err(LedgerError::DuplicateIdempotencyKey);
                    }
                }
                return Err(map_db_err(e));
            }
        }
        Operation::PostTransaction { transaction_id } => {
            let row = sqlx::query(
                r#"
                UPDATE ledger_transactions
                SET status = 'posted', posted_at = NOW()
                WHERE id = $1 AND status = 'pending'
                RETURNING account, signed_amount
                "#,
            )
            .bind(transaction_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_db_err)?;

            let row = match row {
                Some(row) => row,
                None => {
                    let exists: Option<i32> =
                        sqlx::query_scalar("SELECT 1 FROM ledger_transactions WHERE id = $1")
                            .bind(transaction_id)
                            .fetch_optional(&mut **tx)
                            .await
                            .map_err(map_db_err)?;
                    return Err(if exists.is_some() {
                        LedgerError::TransactionNotPending(*transaction_id)
                    } else {
                        LedgerError::TransactionNotFound
                    });
                }
            };

            let account: Uuid = row.try_get("account").map_err(storage_err)?;
            let signed: i64 = row.try_get("signed_amount").map_err(storage_err)?;

            let balance: Option<i64> = sqlx::query_scalar(
                "UPDATE accounts SET balance = balance + $2 WHERE id = $1 RETURNING balance",
            )
            .bind(account)
            .bind(signed)
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_db_err)?;

            match balance {
                None => return Err(LedgerError::AccountNotFound),
                // Backstop; guards should have caught this already.
                Some(b) if b < 0 => return Err(LedgerError::InsufficientBalance),
                Some(_) => {}
            }
        }
        Operation::RejectTransaction { transaction_id } => {
            let updated = sqlx::query(
                r#"
                UPDATE ledger_transactions
                SET status = 'rejected'
                WHERE id = $1 AND status = 'pending'
                "#,
            )
            .bind(transaction_id)
            .execute(&mut **tx)
            .await
            .map_err(map_db_err)?;

            if updated.rows_affected() == 0 {
                let exists: Option<i32> =
                    sqlx::query_scalar("SELECT 1 FROM ledger_transactions WHERE id = $1")
                        .bind(transaction_id)
                        .fetch_optional(&mut **tx)
                        .await
                        .map_err(map_db_err)?;
                return Err(if exists.is_some() {
                    LedgerError::TransactionNotPending(*transaction_id)
                } else {
                    LedgerError::TransactionNotFound
                });
            }
        }
        Operation::CreatePendingTransfer { transfer } => {
            sqlx::query(
                r#"
                INSERT INTO pending_transfers
                    (id, sender_employee, recipient_email, amount, message,
                     debit_transaction, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(transfer.id)
            .bind(transfer.sender_employee)
            .bind(&transfer.recipient_email)
            .bind(transfer.amount.minor())
            .bind(&transfer.message)
            .bind(transfer.debit_transaction)
            .bind(transfer.created_at)
            .execute(&mut **tx)
            .await
            .map_err(map_db_err)?;
        }
        Operation::DeletePendingTransfer { transfer_id } => {
            let deleted = sqlx::query("DELETE FROM pending_transfers WHERE id = $1")
                .bind(transfer_id)
                .execute(&mut **tx)
                .await
                .map_err(map_db_err)?;
            if deleted.rows_affected() == 0 {
                return Err(LedgerError::PendingTransferNotFound);
            }
        }
    }
    Ok(())
}

#[async_trait]
impl<T> LedgerStore for T
where
    T: PostgresLedgerStore + Send + Sync,
{
    async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        guards: &[Guard],
    ) -> Result<(), LedgerError> {
        let mut tx = self.get_pool().begin().await.map_err(storage_err)?;

        // Balance guards first, in account order, so every plan takes its row
        // locks in the same sequence; limit guards read under those locks.
        let mut balance_guards: Vec<&Guard> = guards
            .iter()
            .filter(|g| matches!(g, Guard::AvailableBalance { .. }))
            .collect();
        balance_guards.sort_by_key(|g| match g {
            Guard::AvailableBalance { account, .. } => *account,
            _ => Uuid::nil(),
        });

        for guard in balance_guards {
            if let Err(e) = check_guard_tx(&mut tx, guard).await {
                tx.rollback().await.ok();
                return Err(e);
            }
        }
        for guard in guards
            .iter()
            .filter(|g| matches!(g, Guard::TransferLimit { .. }))
        {
            if let Err(e) = check_guard_tx(&mut tx, guard).await {
                tx.rollback().await.ok();
                return Err(e);
            }
        }

        for op in plan.operations() {
            if let Err(e) = apply_op_tx(&mut tx, op).await {
                tx.rollback().await.ok();
                return Err(e);
            }
        }

        tx.commit().await.map_err(map_db_err)?;
        Ok(())
    }

    async fn create_account(&self, account: Account) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (id, owner_kind, owner_id, balance, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(account.id)
        .bind(account.owner.kind_str())
        .bind(account.owner.owner_id())
        .bind(account.balance.minor())
        .bind(account.created_at)
        .execute(&self.get_pool())
        .await;

        if let Err(e) = result {
            if let Some(db) = e.as_database_error() {
                // A creation race is a conflict; callers re-fetch the winner.
                if db.is_unique_violation() {
                    return Err(LedgerError::Conflict(db.message().to_string()));
                }
            }
            return Err(map_db_err(e));
        }
        Ok(())
    }

    async fn find_account(&self, owner: &AccountOwner) -> Result<Option<Account>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_kind, owner_id, balance, created_at
            FROM accounts
            WHERE owner_kind = $1 AND owner_id = $2
            "#,
        )
        .bind(owner.kind_str())
        .bind(owner.owner_id())
        .fetch_optional(&self.get_pool())
        .await
        .map_err(map_db_err)?;

        row.as_ref().map(decode_account).transpose()
    }

    async fn get_account(&self, id: Uuid) -> Result<Account, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_kind, owner_id, balance, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.get_pool())
        .await
        .map_err(map_db_err)?
        .ok_or(LedgerError::AccountNotFound)?;

        decode_account(&row)
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_kind, owner_id, balance, created_at
            FROM accounts
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.get_pool())
        .await
        .map_err(map_db_err)?;

        rows.iter().map(decode_account).collect()
    }

    async fn get_transaction(&self, id: Uuid) -> Result<LedgerTransaction, LedgerError> {
        let sql = format!("SELECT {TX_COLUMNS} FROM ledger_transactions WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.get_pool())
            .await
            .map_err(map_db_err)?
            .ok_or(LedgerError::TransactionNotFound)?;

        decode_transaction(&row)
    }

    async fn balance(
        &self,
        account: Uuid,
        include_pending: bool,
    ) -> Result<BalanceView, LedgerError> {
        let posted: Option<i64> = sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1")
            .bind(account)
            .fetch_optional(&self.get_pool())
            .await
            .map_err(map_db_err)?;

        let posted = match posted {
            Some(p) => Coins::from_minor(p),
            None => return Ok(BalanceView::zero()),
        };

        let pending = if include_pending {
            let sum: i64 = sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(signed_amount), 0)::BIGINT
                FROM ledger_transactions
                WHERE account = $1 AND status = 'pending'
                "#,
            )
            .bind(account)
            .fetch_one(&self.get_pool())
            .await
            .map_err(map_db_err)?;
            Coins::from_minor(sum)
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
        let sql = format!(
            r#"
            SELECT {TX_COLUMNS}
            FROM ledger_transactions
            WHERE account = $1
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::TEXT IS NULL OR tx_type = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(account)
            .bind(query.status.map(|s| s.as_str()))
            .bind(query.tx_type.map(|t| t.as_str()))
            .bind(query.limit as i64)
            .bind(query.offset as i64)
            .fetch_all(&self.get_pool())
            .await
            .map_err(map_db_err)?;

        rows.iter().map(decode_transaction).collect()
    }

    async fn pending_transactions(
        &self,
        account: Uuid,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let sql = format!(
            r#"
            SELECT {TX_COLUMNS}
            FROM ledger_transactions
            WHERE account = $1 AND status = 'pending'
            ORDER BY created_at, id
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(account)
            .fetch_all(&self.get_pool())
            .await
            .map_err(map_db_err)?;

        rows.iter().map(decode_transaction).collect()
    }

    async fn recent_transactions(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let sql = format!(
            r#"
            SELECT {TX_COLUMNS}
            FROM ledger_transactions
            WHERE created_at >= $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(since)
            .bind(limit as i64)
            .fetch_all(&self.get_pool())
            .await
            .map_err(map_db_err)?;

        rows.iter().map(decode_transaction).collect()
    }

    async fn account_type_total(
        &self,
        account: Uuid,
        tx_type: TransactionType,
        statuses: &[TransactionStatus],
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Coins, LedgerError> {
        let status_strs: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let (start, end) = match window {
            Some((start, end)) => (Some(start), Some(end)),
            None => (None, None),
        };

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT
            FROM ledger_transactions
            WHERE account = $1
              AND tx_type = $2
              AND status = ANY($3)
              AND ($4::TIMESTAMPTZ IS NULL OR created_at >= $4)
              AND ($5::TIMESTAMPTZ IS NULL OR created_at < $5)
            "#,
        )
        .bind(account)
        .bind(tx_type.as_str())
        .bind(&status_strs)
        .bind(start)
        .bind(end)
        .fetch_one(&self.get_pool())
        .await
        .map_err(map_db_err)?;

        Ok(Coins::from_minor(total))
    }

    async fn sent_total_in_window(
        &self,
        employee: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Coins, LedgerError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT
            FROM ledger_transactions
            WHERE source_employee = $1
              AND tx_type = $2
              AND status IN ('pending', 'posted')
              AND created_at >= $3 AND created_at < $4
            "#,
        )
        .bind(employee)
        .bind(TransactionType::PeerTransferSent.as_str())
        .bind(start)
        .bind(end)
        .fetch_one(&self.get_pool())
        .await
        .map_err(map_db_err)?;

        Ok(Coins::from_minor(total))
    }

    async fn pending_transfers_for(
        &self,
        email: &str,
    ) -> Result<Vec<PendingTransfer>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT id, sender_employee, recipient_email, amount, message,
                   debit_transaction, created_at
            FROM pending_transfers
            WHERE recipient_email = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(email)
        .fetch_all(&self.get_pool())
        .await
        .map_err(map_db_err)?;

        rows.iter().map(decode_pending_transfer).collect()
    }

    async fn get_transfer_limit(
        &self,
        employee: Uuid,
    ) -> Result<Option<TransferLimit>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT employee, period, period_start, period_end, max_amount
            FROM transfer_limits
            WHERE employee = $1
            "#,
        )
        .bind(employee)
        .fetch_optional(&self.get_pool())
        .await
        .map_err(map_db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let period: String = row.try_get("period").map_err(storage_err)?;
        Ok(Some(TransferLimit {
            employee: row.try_get("employee").map_err(storage_err)?,
            period: LimitPeriod::from_str(&period)
                .ok_or_else(|| LedgerError::Storage(format!("unknown limit period: {period}")))?,
            period_start: row.try_get("period_start").map_err(storage_err)?,
            period_end: row.try_get("period_end").map_err(storage_err)?,
            max_amount: Coins::from_minor(
                row.try_get::<i64, _>("max_amount").map_err(storage_err)?,
            ),
        }))
    }

    async fn set_transfer_limit(&self, limit: TransferLimit) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO transfer_limits (employee, period, period_start, period_end, max_amount)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (employee) DO UPDATE
            SET period = $2, period_start = $3, period_end = $4, max_amount = $5
            "#,
        )
        .bind(limit.employee)
        .bind(limit.period.as_str())
        .bind(limit.period_start)
        .bind(limit.period_end)
        .bind(limit.max_amount.minor())
        .execute(&self.get_pool())
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn recurring_budget(&self, manager: Uuid) -> Result<Coins, LedgerError> {
        let amount: Option<i64> = sqlx::query_scalar(
            "SELECT recurring_amount FROM allotment_budgets WHERE manager = $1",
        )
        .bind(manager)
        .fetch_optional(&self.get_pool())
        .await
        .map_err(map_db_err)?;

        Ok(Coins::from_minor(amount.unwrap_or(0)))
    }

    async fn set_recurring_budget(&self, manager: Uuid, amount: Coins) -> Result<(), LedgerError> {
        if amount == Coins::ZERO {
            sqlx::query("DELETE FROM allotment_budgets WHERE manager = $1")
                .bind(manager)
                .execute(&self.get_pool())
                .await
                .map_err(map_db_err)?;
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO allotment_budgets (manager, recurring_amount)
            VALUES ($1, $2)
            ON CONFLICT (manager) DO UPDATE SET recurring_amount = $2
            "#,
        )
        .bind(manager)
        .bind(amount.minor())
        .execute(&self.get_pool())
        .await
        .map_err(map_db_err)?;
        Ok(())
    }
}
