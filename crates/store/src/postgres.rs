//! Postgres-backed ledger store.
//!
//! Transactions run at REPEATABLE READ, which on Postgres gives snapshot
//! isolation: concurrent updates of the same account row make the later
//! committer fail with a serialization error instead of applying a stale
//! write, and racing creations trip the primary key.
//!
//! ## Error Mapping
//!
//! | PostgreSQL error code | StoreError | Scenario |
//! |-----------------------|------------|----------|
//! | `40001` | `Conflict` | serialization failure under REPEATABLE READ |
//! | `23505` | `Conflict` | unique violation (racing account creation) |
//! | `23514` | `Backend`  | check constraint (a negative balance reached the DB) |
//! | other / non-database  | `Backend`  | connectivity, pool, deserialization |
//!
//! The schema lives in `migrations/0001_ledger.sql`.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::runtime::Handle;
use tracing::instrument;
use uuid::Uuid;

use vaultbook_core::AccountId;
use vaultbook_ledger::account::Account;
use vaultbook_ledger::record::{TransactionRecord, TransferLink};
use vaultbook_ledger::store::{LedgerStore, LedgerTxn, StoreError};

/// Postgres implementation of [`LedgerStore`].
///
/// The store traits are synchronous (the engine's retry loop is plain
/// code), so each operation bridges onto the ambient tokio runtime with
/// `Handle::block_on`, the same way the rest of the service calls sqlx
/// from synchronous trait impls. Call it from a context where blocking
/// is allowed (e.g. `spawn_blocking`).
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn runtime_handle() -> Result<Handle, StoreError> {
    Handle::try_current().map_err(|_| {
        StoreError::Backend(
            "PostgresLedgerStore requires a tokio runtime. Ensure you're calling from within a tokio runtime context.".to_string(),
        )
    })
}

impl LedgerStore for PostgresLedgerStore {
    type Txn = PostgresTxn;

    #[instrument(skip(self), err)]
    fn begin(&self) -> Result<Self::Txn, StoreError> {
        let handle = runtime_handle()?;
        let pool = self.pool.clone();
        let tx = handle
            .block_on(async {
                let mut tx = pool.begin().await?;
                sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
                    .execute(&mut *tx)
                    .await?;
                Ok::<_, sqlx::Error>(tx)
            })
            .map_err(|e| map_sqlx_error("begin", e))?;

        Ok(PostgresTxn {
            handle,
            tx: Some(tx),
        })
    }
}

/// One open Postgres transaction.
///
/// Dropping it without commit rolls the database transaction back.
pub struct PostgresTxn {
    handle: Handle,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresTxn {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::Backend("transaction already finished".to_string()))
    }
}

impl LedgerTxn for PostgresTxn {
    fn account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let handle = self.handle.clone();
        let tx = self.tx()?;
        let row = handle
            .block_on(
                sqlx::query(
                    r#"
                    SELECT account_id, balance, opened_at
                    FROM accounts
                    WHERE account_id = $1
                    "#,
                )
                .bind(id.as_uuid())
                .fetch_optional(&mut **tx),
            )
            .map_err(|e| map_sqlx_error("select_account", e))?;

        match row {
            Some(row) => {
                let account = AccountRow::from_row(&row)
                    .map_err(|e| {
                        StoreError::Backend(format!("failed to deserialize account row: {e}"))
                    })?
                    .into();
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    fn put_account(&mut self, account: Account) -> Result<(), StoreError> {
        let handle = self.handle.clone();
        let tx = self.tx()?;
        handle
            .block_on(
                sqlx::query(
                    r#"
                    INSERT INTO accounts (account_id, balance, opened_at)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (account_id)
                    DO UPDATE SET balance = EXCLUDED.balance
                    "#,
                )
                .bind(account.id.as_uuid())
                .bind(account.balance)
                .bind(account.opened_at)
                .execute(&mut **tx),
            )
            .map_err(|e| map_sqlx_error("put_account", e))?;
        Ok(())
    }

    fn append_record(&mut self, record: TransactionRecord) -> Result<(), StoreError> {
        let handle = self.handle.clone();
        let tx = self.tx()?;
        let (transfer_id, counterpart_id) = match record.transfer {
            Some(link) => (
                Some(*link.transfer_id.as_uuid()),
                Some(*link.counterpart.as_uuid()),
            ),
            None => (None, None),
        };
        handle
            .block_on(
                sqlx::query(
                    r#"
                    INSERT INTO ledger_records (
                        record_id,
                        owner_id,
                        kind,
                        amount,
                        description,
                        occurred_at,
                        transfer_id,
                        counterpart_id
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(record.id.as_uuid())
                .bind(record.owner.as_uuid())
                .bind(record.kind.as_str())
                .bind(record.amount)
                .bind(&record.description)
                .bind(record.occurred_at)
                .bind(transfer_id)
                .bind(counterpart_id)
                .execute(&mut **tx),
            )
            .map_err(|e| map_sqlx_error("append_record", e))?;
        Ok(())
    }

    fn records_by_owner(&mut self, owner: AccountId) -> Result<Vec<TransactionRecord>, StoreError> {
        let handle = self.handle.clone();
        let tx = self.tx()?;
        let rows = handle
            .block_on(
                sqlx::query(
                    r#"
                    SELECT
                        record_id,
                        owner_id,
                        kind,
                        amount,
                        description,
                        occurred_at,
                        transfer_id,
                        counterpart_id
                    FROM ledger_records
                    WHERE owner_id = $1
                    ORDER BY occurred_at DESC, record_id DESC
                    "#,
                )
                .bind(owner.as_uuid())
                .fetch_all(&mut **tx),
            )
            .map_err(|e| map_sqlx_error("records_by_owner", e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = RecordRow::from_row(&row)
                .map_err(|e| StoreError::Backend(format!("failed to deserialize record row: {e}")))?
                .try_into()?;
            records.push(record);
        }
        Ok(records)
    }

    #[instrument(skip(self), err)]
    fn commit(mut self) -> Result<(), StoreError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::Backend("transaction already finished".to_string()))?;
        self.handle
            .block_on(tx.commit())
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

impl core::fmt::Debug for PostgresTxn {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PostgresTxn")
            .field("open", &self.tx.is_some())
            .finish()
    }
}

/// Map sqlx errors onto the store taxonomy.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Serialization failure under REPEATABLE READ.
                Some("40001") => StoreError::Conflict(msg),
                // Unique violation: two transactions created the same key.
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct AccountRow {
    account_id: Uuid,
    balance: i64,
    opened_at: DateTime<Utc>,
}

impl AccountRow {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            account_id: row.try_get("account_id")?,
            balance: row.try_get("balance")?,
            opened_at: row.try_get("opened_at")?,
        })
    }
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: AccountId::from_uuid(row.account_id),
            balance: row.balance,
            opened_at: row.opened_at,
        }
    }
}

#[derive(Debug)]
struct RecordRow {
    record_id: Uuid,
    owner_id: Uuid,
    kind: String,
    amount: i64,
    description: Option<String>,
    occurred_at: DateTime<Utc>,
    transfer_id: Option<Uuid>,
    counterpart_id: Option<Uuid>,
}

impl RecordRow {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            record_id: row.try_get("record_id")?,
            owner_id: row.try_get("owner_id")?,
            kind: row.try_get("kind")?,
            amount: row.try_get("amount")?,
            description: row.try_get("description")?,
            occurred_at: row.try_get("occurred_at")?,
            transfer_id: row.try_get("transfer_id")?,
            counterpart_id: row.try_get("counterpart_id")?,
        })
    }
}

impl TryFrom<RecordRow> for TransactionRecord {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse()
            .map_err(|_| StoreError::Backend(format!("unknown transaction kind '{}'", row.kind)))?;
        let transfer = match (row.transfer_id, row.counterpart_id) {
            (Some(transfer_id), Some(counterpart)) => Some(TransferLink {
                transfer_id: transfer_id.into(),
                counterpart: counterpart.into(),
            }),
            (None, None) => None,
            _ => {
                return Err(StoreError::Backend(format!(
                    "record {} has a half-populated transfer link",
                    row.record_id
                )));
            }
        };
        Ok(TransactionRecord {
            id: row.record_id.into(),
            owner: row.owner_id.into(),
            kind,
            amount: row.amount,
            description: row.description,
            occurred_at: row.occurred_at,
            transfer,
        })
    }
}
