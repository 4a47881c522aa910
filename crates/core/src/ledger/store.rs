//! Persistence seam for transactions and balance snapshots.
//!
//! The db crate implements these traits on top of PostgreSQL; [`super::memory`]
//! implements them in memory for tests and tooling.

use std::future::Future;

use chrono::{DateTime, Utc};
use ledgerline_shared::types::{TransactionId, UserId};

use super::error::StoreError;
use super::snapshot::BalanceSnapshot;
use super::transaction::Transaction;
use super::types::{LedgerKey, PurgeSummary};

/// Opens units of work.
pub trait LedgerStore: Send + Sync {
    /// Unit of work type handed out by [`LedgerStore::begin`].
    type Unit: LedgerUnit;

    /// Starts a unit of work. Nothing it writes is visible until it commits.
    fn begin(&self) -> impl Future<Output = Result<Self::Unit, StoreError>> + Send;
}

/// One atomic unit of work.
///
/// Dropping a unit without calling [`LedgerUnit::commit`] discards every write
/// made through it.
pub trait LedgerUnit: Send {
    /// Serializes this unit against every other unit touching `key`, until the
    /// unit ends. Units must lock keys in ascending [`LedgerKey`] order.
    fn lock_ledger(&mut self, key: LedgerKey) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Finds one transaction of a user.
    fn find_transaction(
        &mut self,
        user_id: UserId,
        id: TransactionId,
    ) -> impl Future<Output = Result<Option<Transaction>, StoreError>> + Send;

    /// Lists every transaction of a user, newest first.
    fn list_transactions(
        &mut self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Transaction>, StoreError>> + Send;

    /// Inserts a transaction.
    fn insert_transaction(
        &mut self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Overwrites a transaction. Returns false when it does not exist.
    fn update_transaction(
        &mut self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Deletes a transaction. Returns false when it does not exist.
    fn delete_transaction(
        &mut self,
        user_id: UserId,
        id: TransactionId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Transactions of `key` dated at or after `from`, in ledger order.
    fn transactions_from(
        &mut self,
        key: LedgerKey,
        from: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Transaction>, StoreError>> + Send;

    /// The last snapshot of `key` dated strictly before `before`, in ledger order.
    fn latest_snapshot_before(
        &mut self,
        key: LedgerKey,
        before: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<BalanceSnapshot>, StoreError>> + Send;

    /// The last snapshot of `key`, in ledger order.
    fn latest_snapshot(
        &mut self,
        key: LedgerKey,
    ) -> impl Future<Output = Result<Option<BalanceSnapshot>, StoreError>> + Send;

    /// Every snapshot of `key`, in ledger order.
    fn snapshots(
        &mut self,
        key: LedgerKey,
    ) -> impl Future<Output = Result<Vec<BalanceSnapshot>, StoreError>> + Send;

    /// Counts snapshots of `key` dated at or after `from`.
    fn count_snapshots_from(
        &mut self,
        key: LedgerKey,
        from: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Deletes snapshots of `key` dated at or after `from`. Returns how many.
    fn delete_snapshots_from(
        &mut self,
        key: LedgerKey,
        from: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Deletes the snapshots produced by the given transactions, whatever their
    /// ledger. Returns how many.
    fn delete_snapshots_for(
        &mut self,
        user_id: UserId,
        transaction_ids: &[TransactionId],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Inserts a snapshot.
    fn insert_snapshot(
        &mut self,
        snapshot: &BalanceSnapshot,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Users that own at least one transaction or snapshot.
    fn ledger_users(&mut self) -> impl Future<Output = Result<Vec<UserId>, StoreError>> + Send;

    /// Deletes every transaction and snapshot of a user.
    fn purge_user(
        &mut self,
        user_id: UserId,
    ) -> impl Future<Output = Result<PurgeSummary, StoreError>> + Send;

    /// Makes every write of this unit visible at once.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
