//! Ledger error taxonomy.

use thiserror::Error;

/// Result type used across the ledger layers.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Typed error surface returned to the request layer.
///
/// Business-rule failures (`InvalidAmount`, `InsufficientFunds`, ...) are
/// detected before or during a store transaction and always cause a full
/// abort; nothing is ever partially committed. Every error propagates to
/// the caller layer for translation into a user-facing response; the
/// engine never logs and swallows a failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Non-positive or malformed amount. Caller error; no transaction is
    /// opened.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// An identifier was malformed (parse failure at the boundary).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The operation target does not exist and creation is not implied.
    #[error("account not found")]
    AccountNotFound,

    /// The transfer receiver could not be resolved to an account identity.
    #[error("receiver not found")]
    ReceiverNotFound,

    /// Transfer-specific caller error (e.g. sender and receiver are the
    /// same account).
    #[error("invalid transfer: {0}")]
    InvalidTransfer(String),

    /// Business-rule rejection: the balance would go negative. No mutation.
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: i64, requested: i64 },

    /// Transient store conflict that exhausted the retry budget. Safe for
    /// the caller to retry later.
    #[error("operation aborted after repeated transaction conflicts")]
    Contention,

    /// Underlying durability/connectivity fault. Fatal to the operation,
    /// never partially applied.
    #[error("store failure: {0}")]
    Store(String),
}

impl LedgerError {
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_transfer(msg: impl Into<String>) -> Self {
        Self::InvalidTransfer(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Whether the caller may safely retry the operation as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Contention)
    }
}
