//! Balance snapshot domain type.

use chrono::{DateTime, Utc};
use ledgerline_shared::types::{SnapshotId, TransactionId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{LedgerKey, Source};

/// Running balance of one ledger immediately after one transaction.
///
/// Snapshots are derived data: only the recalculation engine writes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// Unique identifier.
    pub id: SnapshotId,
    /// Owner of the ledger.
    pub user_id: UserId,
    /// Source of the ledger.
    pub source: Source,
    /// The transaction that produced this snapshot.
    pub transaction_id: TransactionId,
    /// Balance after applying the transaction, rounded for storage.
    pub amount: Decimal,
    /// Copied from the transaction; drives ledger order.
    pub date: DateTime<Utc>,
}

impl BalanceSnapshot {
    /// Returns the key of the ledger this snapshot belongs to.
    #[must_use]
    pub const fn key(&self) -> LedgerKey {
        LedgerKey::new(self.user_id, self.source)
    }

    /// Sort key matching [`Transaction::ledger_order`](super::Transaction::ledger_order).
    #[must_use]
    pub const fn ledger_order(&self) -> (DateTime<Utc>, TransactionId) {
        (self.date, self.transaction_id)
    }
}
