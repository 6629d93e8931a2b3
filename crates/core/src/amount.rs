//! Monetary amount value object.
//!
//! Amounts are integer **minor units** (e.g. cents). Floating point never
//! enters the ledger; balances stay exact under any operation sequence.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A strictly positive amount in minor units.
///
/// Immutable and compared by value. The constructor is the single place
/// the `amount > 0` precondition is enforced, so holding an `Amount`
/// proves the operation payload was valid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    pub fn new(minor_units: i64) -> Result<Self, LedgerError> {
        if minor_units <= 0 {
            return Err(LedgerError::invalid_amount(format!(
                "amount must be positive, got {minor_units}"
            )));
        }
        Ok(Self(minor_units))
    }

    pub fn minor_units(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = LedgerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_positive_minor_units() {
        assert_eq!(Amount::new(1).unwrap().minor_units(), 1);
        assert_eq!(Amount::new(i64::MAX).unwrap().minor_units(), i64::MAX);
    }

    #[test]
    fn rejects_zero_and_negative() {
        assert!(matches!(Amount::new(0), Err(LedgerError::InvalidAmount(_))));
        assert!(matches!(Amount::new(-5), Err(LedgerError::InvalidAmount(_))));
    }

    #[test]
    fn serde_rejects_non_positive_payloads() {
        // The request layer deserializes amounts straight from JSON; the
        // try_from hook keeps invalid values unrepresentable.
        assert!(serde_json::from_str::<Amount>("0").is_err());
        assert!(serde_json::from_str::<Amount>("-10").is_err());
        assert_eq!(serde_json::from_str::<Amount>("250").unwrap(), Amount::new(250).unwrap());
    }
}
