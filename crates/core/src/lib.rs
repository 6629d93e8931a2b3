//! `vaultbook-core` — ledger foundation building blocks.
//!
//! This crate contains **pure domain** primitives (identifiers, amounts,
//! the error taxonomy); no storage or transport concerns.

pub mod amount;
pub mod error;
pub mod id;

pub use amount::Amount;
pub use error::{LedgerError, LedgerResult};
pub use id::{AccountId, RecordId, TransferId};
