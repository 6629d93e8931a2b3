//! In-memory transactional ledger store.
//!
//! Intended for tests/dev. Optimistic: transactions record the version of
//! every account they read (0 for absent keys) and validate the whole
//! read set under one write lock at commit. First committer wins; the
//! loser gets `StoreError::Conflict` and the engine retries it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use vaultbook_core::AccountId;
use vaultbook_ledger::account::Account;
use vaultbook_ledger::record::TransactionRecord;
use vaultbook_ledger::store::{LedgerStore, LedgerTxn, StoreError};

#[derive(Debug, Clone)]
struct VersionedAccount {
    account: Account,
    version: u64,
}

#[derive(Debug, Default)]
struct Shared {
    accounts: HashMap<AccountId, VersionedAccount>,
    /// Append-only; records are never mutated or removed.
    records: Vec<TransactionRecord>,
}

impl Shared {
    fn version_of(&self, id: AccountId) -> u64 {
        self.accounts.get(&id).map(|v| v.version).unwrap_or(0)
    }
}

/// In-memory store with optimistic transactions.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    shared: Arc<RwLock<Shared>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    type Txn = MemoryTxn;

    fn begin(&self) -> Result<Self::Txn, StoreError> {
        Ok(MemoryTxn {
            shared: Arc::clone(&self.shared),
            reads: HashMap::new(),
            snapshot: HashMap::new(),
            writes: HashMap::new(),
            appends: Vec::new(),
        })
    }
}

/// One open transaction against [`MemoryLedgerStore`].
///
/// Reads are cached on first access so repeated reads inside the
/// transaction stay stable; writes and appends are staged locally and
/// published only by `commit()`. Dropping the transaction discards the
/// stage.
#[derive(Debug)]
pub struct MemoryTxn {
    shared: Arc<RwLock<Shared>>,
    /// Account id -> version observed at first read (0 = absent).
    reads: HashMap<AccountId, u64>,
    /// First-read values, so the transaction sees its own snapshot.
    snapshot: HashMap<AccountId, Option<Account>>,
    writes: HashMap<AccountId, Account>,
    appends: Vec<TransactionRecord>,
}

impl MemoryTxn {
    fn observe(&mut self, id: AccountId) -> Result<(), StoreError> {
        if self.reads.contains_key(&id) {
            return Ok(());
        }
        let shared = self
            .shared
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        self.reads.insert(id, shared.version_of(id));
        self.snapshot
            .insert(id, shared.accounts.get(&id).map(|v| v.account.clone()));
        Ok(())
    }
}

impl LedgerTxn for MemoryTxn {
    fn account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        if let Some(staged) = self.writes.get(&id) {
            return Ok(Some(staged.clone()));
        }
        self.observe(id)?;
        Ok(self.snapshot.get(&id).cloned().unwrap_or(None))
    }

    fn put_account(&mut self, account: Account) -> Result<(), StoreError> {
        // A blind write still pins the current version, so it conflicts
        // with any concurrent commit touching the same account.
        self.observe(account.id)?;
        self.writes.insert(account.id, account);
        Ok(())
    }

    fn append_record(&mut self, record: TransactionRecord) -> Result<(), StoreError> {
        self.appends.push(record);
        Ok(())
    }

    fn records_by_owner(&mut self, owner: AccountId) -> Result<Vec<TransactionRecord>, StoreError> {
        let shared = self
            .shared
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        let mut records: Vec<TransactionRecord> = shared
            .records
            .iter()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect();
        drop(shared);
        records.extend(self.appends.iter().filter(|r| r.owner == owner).cloned());
        Ok(records)
    }

    fn commit(self) -> Result<(), StoreError> {
        let mut shared = self
            .shared
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        // Validate the full read set before touching anything.
        for (id, read_version) in &self.reads {
            let current = shared.version_of(*id);
            if current != *read_version {
                return Err(StoreError::Conflict(format!(
                    "account {id}: read version {read_version}, now {current}"
                )));
            }
        }

        for (id, account) in self.writes {
            let next_version = shared.version_of(id) + 1;
            shared.accounts.insert(
                id,
                VersionedAccount {
                    account,
                    version: next_version,
                },
            );
        }
        shared.records.extend(self.appends);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn open_account(id: AccountId, balance: i64) -> Account {
        let mut account = Account::open(id, Utc::now());
        account.balance = balance;
        account
    }

    #[test]
    fn staged_writes_are_invisible_until_commit() {
        let store = MemoryLedgerStore::new();
        let id = AccountId::new();

        let mut writer = store.begin().unwrap();
        writer.put_account(open_account(id, 100)).unwrap();

        let mut reader = store.begin().unwrap();
        assert_eq!(reader.account(id).unwrap(), None);

        writer.commit().unwrap();

        let mut reader = store.begin().unwrap();
        assert_eq!(reader.account(id).unwrap().unwrap().balance, 100);
    }

    #[test]
    fn dropped_transaction_discards_its_stage() {
        let store = MemoryLedgerStore::new();
        let id = AccountId::new();

        {
            let mut txn = store.begin().unwrap();
            txn.put_account(open_account(id, 100)).unwrap();
            // dropped without commit
        }

        let mut txn = store.begin().unwrap();
        assert_eq!(txn.account(id).unwrap(), None);
    }

    #[test]
    fn stale_read_set_conflicts_at_commit() {
        let store = MemoryLedgerStore::new();
        let id = AccountId::new();

        let mut seed = store.begin().unwrap();
        seed.put_account(open_account(id, 100)).unwrap();
        seed.commit().unwrap();

        let mut first = store.begin().unwrap();
        let mut second = store.begin().unwrap();
        let a = first.account(id).unwrap().unwrap();
        let b = second.account(id).unwrap().unwrap();

        first.put_account(open_account(id, a.balance - 60)).unwrap();
        first.commit().unwrap();

        second.put_account(open_account(id, b.balance - 60)).unwrap();
        assert!(matches!(second.commit(), Err(StoreError::Conflict(_))));

        let mut check = store.begin().unwrap();
        assert_eq!(check.account(id).unwrap().unwrap().balance, 40);
    }

    #[test]
    fn concurrent_creation_conflicts_deterministically() {
        let store = MemoryLedgerStore::new();
        let id = AccountId::new();

        let mut first = store.begin().unwrap();
        let mut second = store.begin().unwrap();
        // Both observe the key absent (version 0).
        assert_eq!(first.account(id).unwrap(), None);
        assert_eq!(second.account(id).unwrap(), None);

        first.put_account(open_account(id, 0)).unwrap();
        second.put_account(open_account(id, 0)).unwrap();

        first.commit().unwrap();
        assert!(matches!(second.commit(), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn transaction_reads_its_own_writes() {
        let store = MemoryLedgerStore::new();
        let id = AccountId::new();

        let mut txn = store.begin().unwrap();
        txn.put_account(open_account(id, 25)).unwrap();
        assert_eq!(txn.account(id).unwrap().unwrap().balance, 25);
    }
}
