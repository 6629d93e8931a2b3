//! Validated operation requests.
//!
//! The outer request layer deserializes duck-typed bodies into these
//! structs; `validate()` runs before any store transaction is opened, so
//! caller errors never cost a transaction.

use serde::{Deserialize, Serialize};

use vaultbook_core::{AccountId, Amount, LedgerError};

/// Deposit `amount` minor units into the caller's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequest {
    pub account: AccountId,
    pub amount: i64,
    pub description: Option<String>,
}

impl DepositRequest {
    pub fn validate(&self) -> Result<Amount, LedgerError> {
        Amount::new(self.amount)
    }
}

/// Withdraw `amount` minor units from the caller's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub account: AccountId,
    pub amount: i64,
    pub description: Option<String>,
}

impl WithdrawRequest {
    pub fn validate(&self) -> Result<Amount, LedgerError> {
        Amount::new(self.amount)
    }
}

/// Move `amount` minor units from `sender` to `receiver`.
///
/// `receiver` is an already-resolved identity; the outer layer performs
/// any lookup-key resolution (e.g. email) and maps its failures to
/// `ReceiverNotFound`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: i64,
    pub description: Option<String>,
}

impl TransferRequest {
    pub fn validate(&self) -> Result<Amount, LedgerError> {
        let amount = Amount::new(self.amount)?;
        // Self-transfer is rejected outright rather than recorded as a
        // no-op pair of linked records.
        if self.sender == self.receiver {
            return Err(LedgerError::invalid_transfer(
                "sender and receiver are the same account",
            ));
        }
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_rejects_non_positive_amount() {
        let req = DepositRequest {
            account: AccountId::new(),
            amount: 0,
            description: None,
        };
        assert!(matches!(req.validate(), Err(LedgerError::InvalidAmount(_))));
    }

    #[test]
    fn transfer_rejects_self_transfer() {
        let id = AccountId::new();
        let req = TransferRequest {
            sender: id,
            receiver: id,
            amount: 100,
            description: None,
        };
        assert!(matches!(req.validate(), Err(LedgerError::InvalidTransfer(_))));
    }

    #[test]
    fn transfer_checks_amount_before_identities() {
        let id = AccountId::new();
        let req = TransferRequest {
            sender: id,
            receiver: id,
            amount: -1,
            description: None,
        };
        assert!(matches!(req.validate(), Err(LedgerError::InvalidAmount(_))));
    }
}
