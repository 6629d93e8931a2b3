//! Ledger store abstraction.
//!
//! The store is the durable, transactional collaborator the engine runs
//! against. It makes **no policy decisions**: balance rules live in
//! [`crate::account::AccountRepository`], ordering rules in
//! [`crate::record::TransactionLog`]. The store only promises atomic
//! commit, snapshot-or-better isolation, and conflict detection between
//! concurrent transactions.

use std::sync::Arc;

use thiserror::Error;

use vaultbook_core::{AccountId, LedgerError};

use crate::account::Account;
use crate::record::TransactionRecord;

/// Store operation error.
///
/// Infrastructure failures only; business-rule rejections never originate
/// here.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A concurrent transaction touched the same data first. The engine
    /// retries these with backoff.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// Durability or connectivity fault. Not retried.
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => LedgerError::Contention,
            StoreError::Backend(msg) => LedgerError::Store(msg),
        }
    }
}

/// Transactional keyed store for accounts and transaction records.
///
/// ## Transaction Semantics
///
/// `begin()` opens a transaction with at least snapshot isolation: no
/// reads inside it observe mid-transaction state from another in-flight
/// operation. All writes staged through the returned [`LedgerTxn`] become
/// visible together at `commit()`, or not at all.
///
/// ## Conflict Detection
///
/// Two committed transactions must never both act on the same stale
/// account state. Implementations detect the loser (optimistic version
/// validation, serialization failure, unique-key violation on racing
/// creations) and surface `StoreError::Conflict`; the engine owns the
/// retry policy.
pub trait LedgerStore: Send + Sync {
    type Txn: LedgerTxn;

    /// Open a new transaction.
    fn begin(&self) -> Result<Self::Txn, StoreError>;
}

/// One open store transaction.
///
/// Dropping a transaction without committing aborts it; none of its
/// staged writes survive. Once `commit()` is called the transaction runs
/// to completion (commit or conflict) and is not revocable.
pub trait LedgerTxn {
    /// Read an account within this transaction's snapshot.
    ///
    /// Reading an absent account still pins its state: a concurrent
    /// creation of the same identity must conflict with this transaction
    /// at commit, which is what makes `get_or_create` race-free.
    fn account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Stage an account write (insert or update).
    fn put_account(&mut self, account: Account) -> Result<(), StoreError>;

    /// Stage an append to the immutable transaction log. Existing records
    /// are never mutated.
    fn append_record(&mut self, record: TransactionRecord) -> Result<(), StoreError>;

    /// All records owned by `owner`, committed or staged in this
    /// transaction. Order is unspecified; the transaction log sorts.
    fn records_by_owner(&mut self, owner: AccountId) -> Result<Vec<TransactionRecord>, StoreError>;

    /// Atomically publish every staged write, or fail with `Conflict` and
    /// publish nothing.
    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    type Txn = S::Txn;

    fn begin(&self) -> Result<Self::Txn, StoreError> {
        (**self).begin()
    }
}
