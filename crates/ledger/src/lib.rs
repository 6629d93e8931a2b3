//! `vaultbook-ledger` — the ledger core.
//!
//! Account balances and an append-only transaction history, kept mutually
//! consistent by executing every operation as one atomic transaction
//! against a pluggable [`store::LedgerStore`].
//!
//! The crate is invoked by an authenticated request layer that supplies a
//! resolved caller identity and a validated payload; it returns a result
//! or a typed [`vaultbook_core::LedgerError`] for the outer layer to map
//! to a transport response.

pub mod account;
pub mod engine;
pub mod query;
pub mod record;
pub mod request;
pub mod store;

pub use account::{Account, AccountRepository};
pub use engine::{LedgerEngine, Receipt, RetryPolicy};
pub use query::QueryService;
pub use record::{TransactionKind, TransactionLog, TransactionRecord, TransferLink};
pub use request::{DepositRequest, TransferRequest, WithdrawRequest};
pub use store::{LedgerStore, LedgerTxn, StoreError};
