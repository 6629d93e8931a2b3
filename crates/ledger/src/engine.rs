//! The ledger engine: deposit, withdraw, transfer as atomic operations.

use std::time::Duration;

use chrono::Utc;

use vaultbook_core::{AccountId, LedgerError, TransferId};

use crate::account::{Account, AccountRepository};
use crate::record::{TransactionKind, TransactionLog, TransactionRecord, TransferLink};
use crate::request::{DepositRequest, TransferRequest, WithdrawRequest};
use crate::store::{LedgerStore, LedgerTxn, StoreError};

/// Outcome of a committed operation: the caller's new balance plus the
/// record written against their account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub balance: i64,
    pub record: TransactionRecord,
}

/// Bounded retry with exponential backoff for transient store conflicts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(10),
        }
    }
}

/// Orchestrates ledger operations against the store.
///
/// Every operation is a single atomic transaction: all of its account
/// deltas and log appends become visible together, or none do. Conflicts
/// between concurrent operations are resolved by the store; the losing
/// transaction is retried here per [`RetryPolicy`] and surfaces
/// [`LedgerError::Contention`] once the budget is exhausted.
pub struct LedgerEngine<S: LedgerStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: LedgerStore> LedgerEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Explicitly open a zero-balance account (registration path).
    ///
    /// Idempotent: an existing account is returned unchanged.
    pub fn open_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.run("open_account", |txn| AccountRepository::get_or_create(txn, id))
    }

    /// Deposit into the caller's account, creating it on first use.
    pub fn deposit(&self, req: &DepositRequest) -> Result<Receipt, LedgerError> {
        let amount = req.validate()?;
        self.run("deposit", |txn| {
            AccountRepository::get_or_create(txn, req.account)?;
            let account = AccountRepository::apply_delta(txn, req.account, amount.minor_units())?;
            let record = TransactionRecord::new(
                req.account,
                TransactionKind::Deposit,
                amount,
                req.description.clone(),
                Utc::now(),
                None,
            );
            TransactionLog::append(txn, record.clone())?;
            Ok(Receipt {
                balance: account.balance,
                record,
            })
        })
    }

    /// Withdraw from the caller's account.
    ///
    /// `AccountNotFound` if the account was never created;
    /// `InsufficientFunds` aborts with no mutation and no log entry.
    pub fn withdraw(&self, req: &WithdrawRequest) -> Result<Receipt, LedgerError> {
        let amount = req.validate()?;
        self.run("withdraw", |txn| {
            let account = AccountRepository::apply_delta(txn, req.account, -amount.minor_units())?;
            let record = TransactionRecord::new(
                req.account,
                TransactionKind::Withdrawal,
                amount,
                req.description.clone(),
                Utc::now(),
                None,
            );
            TransactionLog::append(txn, record.clone())?;
            Ok(Receipt {
                balance: account.balance,
                record,
            })
        })
    }

    /// Atomically move funds between two accounts.
    ///
    /// The receiver is created on demand, but the whole operation is one
    /// transaction: an `InsufficientFunds` abort rolls that creation back
    /// along with everything else.
    ///
    /// Both deltas and both appends are applied in canonical `AccountId`
    /// order rather than sender-then-receiver, so two accounts
    /// transferring to each other simultaneously acquire store locks in
    /// the same order and cannot deadlock.
    pub fn transfer(&self, req: &TransferRequest) -> Result<Receipt, LedgerError> {
        let amount = req.validate()?;
        self.run("transfer", |txn| {
            let sender = AccountRepository::get(txn, req.sender)?;
            AccountRepository::get_or_create(txn, req.receiver)?;

            if sender.balance < amount.minor_units() {
                return Err(LedgerError::InsufficientFunds {
                    balance: sender.balance,
                    requested: amount.minor_units(),
                });
            }

            let transfer_id = TransferId::new();
            let occurred_at = Utc::now();
            let outgoing = TransactionRecord::new(
                req.sender,
                TransactionKind::TransferOut,
                amount,
                req.description.clone(),
                occurred_at,
                Some(TransferLink {
                    transfer_id,
                    counterpart: req.receiver,
                }),
            );
            let incoming = TransactionRecord::new(
                req.receiver,
                TransactionKind::TransferIn,
                amount,
                req.description.clone(),
                occurred_at,
                Some(TransferLink {
                    transfer_id,
                    counterpart: req.sender,
                }),
            );

            let mut legs = [
                (req.sender, -amount.minor_units(), outgoing.clone()),
                (req.receiver, amount.minor_units(), incoming),
            ];
            legs.sort_by_key(|(id, _, _)| *id);

            let mut sender_balance = sender.balance;
            for (id, delta, record) in legs {
                let account = AccountRepository::apply_delta(txn, id, delta)?;
                if id == req.sender {
                    sender_balance = account.balance;
                }
                TransactionLog::append(txn, record)?;
            }

            Ok(Receipt {
                balance: sender_balance,
                record: outgoing,
            })
        })
    }

    /// Execute `body` in a fresh transaction, retrying conflicts.
    ///
    /// Business-rule failures abort immediately (the dropped transaction
    /// discards every staged write). Only conflicts are retried; the
    /// backoff doubles per attempt.
    fn run<R>(
        &self,
        op: &'static str,
        body: impl Fn(&mut S::Txn) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError> {
        let mut delay = self.retry.base_delay;
        let mut attempt: u32 = 0;
        loop {
            let mut txn = self.store.begin()?;
            match body(&mut txn) {
                Ok(out) => match txn.commit() {
                    Ok(()) => return Ok(out),
                    Err(StoreError::Conflict(reason)) => {
                        tracing::debug!(op, attempt, %reason, "commit conflict");
                    }
                    Err(err) => return Err(err.into()),
                },
                // A conflict observed mid-transaction retries like a
                // commit conflict.
                Err(err) if err.is_transient() => {
                    tracing::debug!(op, attempt, "read conflict");
                }
                Err(err) => return Err(err),
            }

            if attempt >= self.retry.max_retries {
                tracing::warn!(op, attempt, "retry budget exhausted, surfacing contention");
                return Err(LedgerError::Contention);
            }
            attempt += 1;
            std::thread::sleep(delay);
            delay = delay.saturating_mul(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Store whose every commit loses to a concurrent transaction.
    struct ConflictingStore {
        begins: Arc<AtomicU32>,
    }

    struct ConflictingTxn;

    impl LedgerTxn for ConflictingTxn {
        fn account(&mut self, _id: AccountId) -> Result<Option<Account>, StoreError> {
            Ok(None)
        }

        fn put_account(&mut self, _account: Account) -> Result<(), StoreError> {
            Ok(())
        }

        fn append_record(&mut self, _record: TransactionRecord) -> Result<(), StoreError> {
            Ok(())
        }

        fn records_by_owner(
            &mut self,
            _owner: AccountId,
        ) -> Result<Vec<TransactionRecord>, StoreError> {
            Ok(Vec::new())
        }

        fn commit(self) -> Result<(), StoreError> {
            Err(StoreError::Conflict("lost the race".to_string()))
        }
    }

    impl LedgerStore for ConflictingStore {
        type Txn = ConflictingTxn;

        fn begin(&self) -> Result<Self::Txn, StoreError> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            Ok(ConflictingTxn)
        }
    }

    #[test]
    fn exhausted_retries_surface_contention() {
        let begins = Arc::new(AtomicU32::new(0));
        let engine = LedgerEngine::with_retry(
            ConflictingStore {
                begins: begins.clone(),
            },
            RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
            },
        );

        let err = engine.open_account(AccountId::new()).unwrap_err();
        assert_eq!(err, LedgerError::Contention);
        assert!(err.is_transient());
        // Initial attempt plus the full retry budget, then give up.
        assert_eq!(begins.load(Ordering::SeqCst), 4);
    }

    /// Store that panics if any transaction is opened. Proves request
    /// validation happens before `begin()`.
    struct RefusingStore;

    struct RefusingTxn;

    impl LedgerTxn for RefusingTxn {
        fn account(&mut self, _id: AccountId) -> Result<Option<Account>, StoreError> {
            unreachable!()
        }

        fn put_account(&mut self, _account: Account) -> Result<(), StoreError> {
            unreachable!()
        }

        fn append_record(&mut self, _record: TransactionRecord) -> Result<(), StoreError> {
            unreachable!()
        }

        fn records_by_owner(
            &mut self,
            _owner: AccountId,
        ) -> Result<Vec<TransactionRecord>, StoreError> {
            unreachable!()
        }

        fn commit(self) -> Result<(), StoreError> {
            unreachable!()
        }
    }

    impl LedgerStore for RefusingStore {
        type Txn = RefusingTxn;

        fn begin(&self) -> Result<Self::Txn, StoreError> {
            panic!("transaction opened for an invalid request");
        }
    }

    #[test]
    fn invalid_deposit_never_opens_a_transaction() {
        let engine = LedgerEngine::new(RefusingStore);
        let req = DepositRequest {
            account: AccountId::new(),
            amount: -1,
            description: None,
        };
        assert!(matches!(engine.deposit(&req), Err(LedgerError::InvalidAmount(_))));
    }

    #[test]
    fn invalid_withdrawal_never_opens_a_transaction() {
        let engine = LedgerEngine::new(RefusingStore);
        let req = WithdrawRequest {
            account: AccountId::new(),
            amount: 0,
            description: None,
        };
        assert!(matches!(engine.withdraw(&req), Err(LedgerError::InvalidAmount(_))));
    }

    #[test]
    fn self_transfer_never_opens_a_transaction() {
        let engine = LedgerEngine::new(RefusingStore);
        let id = AccountId::new();
        let req = TransferRequest {
            sender: id,
            receiver: id,
            amount: 50,
            description: None,
        };
        assert!(matches!(engine.transfer(&req), Err(LedgerError::InvalidTransfer(_))));
    }
}
