//! Transaction records and the append-only log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vaultbook_core::{AccountId, Amount, LedgerError, RecordId, TransferId};

use crate::store::LedgerTxn;

/// What kind of monetary event a record describes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::TransferIn => "transfer_in",
        }
    }
}

impl core::str::FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            "transfer_out" => Ok(TransactionKind::TransferOut),
            "transfer_in" => Ok(TransactionKind::TransferIn),
            other => Err(LedgerError::store(format!(
                "unknown transaction kind '{other}'"
            ))),
        }
    }
}

/// Link between the two legs of a transfer.
///
/// Both legs carry the same `transfer_id`; `counterpart` is the other
/// account (who received for a `TransferOut`, who sent for a
/// `TransferIn`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLink {
    pub transfer_id: TransferId,
    pub counterpart: AccountId,
}

/// One immutable entry in an account's history.
///
/// Owned by exactly one account. The two records of a transfer share a
/// `TransferId` but are otherwise independent rows, one per account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: RecordId,
    pub owner: AccountId,
    pub kind: TransactionKind,
    /// Positive minor units.
    pub amount: i64,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    /// Present exactly on transfer records.
    pub transfer: Option<TransferLink>,
}

impl TransactionRecord {
    pub fn new(
        owner: AccountId,
        kind: TransactionKind,
        amount: Amount,
        description: Option<String>,
        occurred_at: DateTime<Utc>,
        transfer: Option<TransferLink>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            owner,
            kind,
            amount: amount.minor_units(),
            description,
            occurred_at,
            transfer,
        }
    }
}

/// Append-only record of monetary events, queryable by owner.
pub struct TransactionLog;

impl TransactionLog {
    /// Insert one immutable record inside the caller's transaction.
    pub fn append<T: LedgerTxn + ?Sized>(
        txn: &mut T,
        record: TransactionRecord,
    ) -> Result<RecordId, LedgerError> {
        let id = record.id;
        txn.append_record(record)?;
        Ok(id)
    }

    /// All records for `owner`, newest first.
    ///
    /// Sorted by timestamp descending, ties broken by record id descending,
    /// which makes the result a deterministic total order.
    pub fn list_by_owner<T: LedgerTxn + ?Sized>(
        txn: &mut T,
        owner: AccountId,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let mut records = txn.records_by_owner(owner)?;
        records.sort_by(|a, b| (b.occurred_at, b.id).cmp(&(a.occurred_at, a.id)));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            TransactionKind::Deposit,
            TransactionKind::Withdrawal,
            TransactionKind::TransferOut,
            TransactionKind::TransferIn,
        ] {
            assert_eq!(kind.as_str().parse::<TransactionKind>().unwrap(), kind);
        }
        assert!("interest".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn newest_first_order_is_deterministic() {
        let owner = AccountId::new();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();

        let amount = Amount::new(10).unwrap();
        let old = TransactionRecord::new(owner, TransactionKind::Deposit, amount, None, t0, None);
        // Two records at the same timestamp: the later-created id wins.
        let tie_a = TransactionRecord::new(owner, TransactionKind::Deposit, amount, None, t1, None);
        let tie_b = TransactionRecord::new(owner, TransactionKind::Deposit, amount, None, t1, None);

        let mut records = vec![old.clone(), tie_b.clone(), tie_a.clone()];
        records.sort_by(|a, b| (b.occurred_at, b.id).cmp(&(a.occurred_at, a.id)));

        assert_eq!(records, vec![tie_b, tie_a, old]);
    }
}
