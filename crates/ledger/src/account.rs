//! Accounts and the repository that guards their balance invariant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vaultbook_core::{AccountId, LedgerError};

use crate::store::LedgerTxn;

/// Mutable balance record for one identity.
///
/// Created lazily on first deposit/transfer-in, or explicitly at
/// registration with balance 0. Mutated only by the ledger engine inside
/// a store transaction; never deleted.
///
/// Invariant: `balance >= 0` in every committed state. The balance is
/// integer minor units; floating point never enters the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: i64,
    pub opened_at: DateTime<Utc>,
}

impl Account {
    /// Fresh account with zero balance.
    pub fn open(id: AccountId, opened_at: DateTime<Utc>) -> Self {
        Self {
            id,
            balance: 0,
            opened_at,
        }
    }
}

/// Maps identities to balance records within a caller-supplied transaction.
///
/// Stateless; every method takes the transaction it operates in, so one
/// engine operation can thread a single transaction through repository
/// and log calls.
pub struct AccountRepository;

impl AccountRepository {
    /// Look up an existing account, or fail with `AccountNotFound`.
    pub fn get<T: LedgerTxn + ?Sized>(txn: &mut T, id: AccountId) -> Result<Account, LedgerError> {
        txn.account(id)?.ok_or(LedgerError::AccountNotFound)
    }

    /// Look up an account, creating it with balance 0 if absent.
    ///
    /// Race-free: the absent read pins the identity in the transaction's
    /// read set, so of two concurrent creators exactly one commits and
    /// the other conflicts and retries onto the surviving record.
    pub fn get_or_create<T: LedgerTxn + ?Sized>(
        txn: &mut T,
        id: AccountId,
    ) -> Result<Account, LedgerError> {
        if let Some(existing) = txn.account(id)? {
            return Ok(existing);
        }
        let account = Account::open(id, Utc::now());
        txn.put_account(account.clone())?;
        Ok(account)
    }

    /// Mutate a balance by `delta` (positive or negative) inside `txn`.
    ///
    /// Rejects with `InsufficientFunds` if the resulting balance would be
    /// negative, staging nothing.
    pub fn apply_delta<T: LedgerTxn + ?Sized>(
        txn: &mut T,
        id: AccountId,
        delta: i64,
    ) -> Result<Account, LedgerError> {
        let mut account = Self::get(txn, id)?;
        let next = account
            .balance
            .checked_add(delta)
            .ok_or_else(|| LedgerError::invalid_amount("balance overflow"))?;
        if next < 0 {
            return Err(LedgerError::InsufficientFunds {
                balance: account.balance,
                requested: delta.unsigned_abs() as i64,
            });
        }
        account.balance = next;
        txn.put_account(account.clone())?;
        Ok(account)
    }
}
