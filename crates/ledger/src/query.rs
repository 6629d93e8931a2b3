//! Read-only queries over the ledger.

use vaultbook_core::{AccountId, LedgerError};

use crate::account::AccountRepository;
use crate::record::{TransactionLog, TransactionRecord};
use crate::store::LedgerStore;

/// Balance lookup and history retrieval.
///
/// Reads run inside a store transaction of their own, so each call sees
/// one consistent snapshot; the transaction is dropped (aborted) after
/// reading, which is free for a read-only workload.
pub struct QueryService<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> QueryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Current committed balance, in minor units.
    pub fn balance(&self, id: AccountId) -> Result<i64, LedgerError> {
        let mut txn = self.store.begin()?;
        let account = AccountRepository::get(&mut txn, id)?;
        Ok(account.balance)
    }

    /// Full history for an account, newest first (see
    /// [`TransactionLog::list_by_owner`] for the ordering contract).
    pub fn history(&self, id: AccountId) -> Result<Vec<TransactionRecord>, LedgerError> {
        let mut txn = self.store.begin()?;
        TransactionLog::list_by_owner(&mut txn, id)
    }
}
