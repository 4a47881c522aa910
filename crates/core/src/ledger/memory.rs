//! In-memory ledger store.
//!
//! Units of work take the store's single mutex for their whole lifetime, so units
//! run one at a time and [`LedgerUnit::lock_ledger`] has nothing left to do.
//! Writes go to a private copy of the state that replaces the shared state on
//! commit.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use ledgerline_shared::types::{SnapshotId, TransactionId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::error::StoreError;
use super::snapshot::BalanceSnapshot;
use super::store::{LedgerStore, LedgerUnit};
use super::transaction::{Transaction, sort_ledger_order};
use super::types::{LedgerKey, PurgeSummary};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    transactions: BTreeMap<TransactionId, Transaction>,
    snapshots: BTreeMap<SnapshotId, BalanceSnapshot>,
}

impl MemoryState {
    fn ledger_snapshots(&self, key: LedgerKey) -> Vec<BalanceSnapshot> {
        let mut snapshots: Vec<BalanceSnapshot> = self
            .snapshots
            .values()
            .filter(|s| s.key() == key)
            .cloned()
            .collect();
        snapshots.sort_by_key(BalanceSnapshot::ledger_order);
        snapshots
    }
}

/// Ledger store kept entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
    failing_commits: Arc<AtomicU32>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with [`StoreError::Unavailable`],
    /// leaving the stored state untouched.
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Injected commit failures not yet consumed.
    pub fn pending_commit_failures(&self) -> u32 {
        self.failing_commits.load(Ordering::SeqCst)
    }

    fn take_commit_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    type Unit = InMemoryLedgerUnit;

    async fn begin(&self) -> Result<Self::Unit, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryLedgerUnit {
            guard,
            working,
            store: self.clone(),
        })
    }
}

/// Unit of work over an [`InMemoryLedgerStore`].
#[derive(Debug)]
pub struct InMemoryLedgerUnit {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    store: InMemoryLedgerStore,
}

impl LedgerUnit for InMemoryLedgerUnit {
    async fn lock_ledger(&mut self, key: LedgerKey) -> Result<(), StoreError> {
        tracing::trace!(ledger = %key, "ledger locked");
        Ok(())
    }

    async fn find_transaction(
        &mut self,
        user_id: UserId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .working
            .transactions
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn list_transactions(&mut self, user_id: UserId) -> Result<Vec<Transaction>, StoreError> {
        let mut transactions: Vec<Transaction> = self
            .working
            .transactions
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        sort_ledger_order(&mut transactions);
        transactions.reverse();
        Ok(transactions)
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), StoreError> {
        if self.working.transactions.contains_key(&transaction.id) {
            return Err(StoreError::Conflict(format!(
                "transaction {} already exists",
                transaction.id
            )));
        }
        self.working
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn update_transaction(&mut self, transaction: &Transaction) -> Result<bool, StoreError> {
        match self.working.transactions.get_mut(&transaction.id) {
            Some(existing) if existing.user_id == transaction.user_id => {
                *existing = transaction.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_transaction(
        &mut self,
        user_id: UserId,
        id: TransactionId,
    ) -> Result<bool, StoreError> {
        let owned = self
            .working
            .transactions
            .get(&id)
            .is_some_and(|t| t.user_id == user_id);
        if !owned {
            return Ok(false);
        }
        self.working.transactions.remove(&id);
        // Snapshots cascade with their transaction.
        self.working.snapshots.retain(|_, s| s.transaction_id != id);
        Ok(true)
    }

    async fn transactions_from(
        &mut self,
        key: LedgerKey,
        from: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut transactions: Vec<Transaction> = self
            .working
            .transactions
            .values()
            .filter(|t| t.key() == key && t.date >= from)
            .cloned()
            .collect();
        sort_ledger_order(&mut transactions);
        Ok(transactions)
    }

    async fn latest_snapshot_before(
        &mut self,
        key: LedgerKey,
        before: DateTime<Utc>,
    ) -> Result<Option<BalanceSnapshot>, StoreError> {
        Ok(self
            .working
            .ledger_snapshots(key)
            .into_iter()
            .rev()
            .find(|s| s.date < before))
    }

    async fn latest_snapshot(&mut self, key: LedgerKey) -> Result<Option<BalanceSnapshot>, StoreError> {
        Ok(self.working.ledger_snapshots(key).pop())
    }

    async fn snapshots(&mut self, key: LedgerKey) -> Result<Vec<BalanceSnapshot>, StoreError> {
        Ok(self.working.ledger_snapshots(key))
    }

    async fn count_snapshots_from(
        &mut self,
        key: LedgerKey,
        from: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let count = self
            .working
            .snapshots
            .values()
            .filter(|s| s.key() == key && s.date >= from)
            .count();
        Ok(count as u64)
    }

    async fn delete_snapshots_from(
        &mut self,
        key: LedgerKey,
        from: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let before = self.working.snapshots.len();
        self.working
            .snapshots
            .retain(|_, s| !(s.key() == key && s.date >= from));
        Ok((before - self.working.snapshots.len()) as u64)
    }

    async fn delete_snapshots_for(
        &mut self,
        user_id: UserId,
        transaction_ids: &[TransactionId],
    ) -> Result<u64, StoreError> {
        let before = self.working.snapshots.len();
        self.working.snapshots.retain(|_, s| {
            !(s.user_id == user_id && transaction_ids.contains(&s.transaction_id))
        });
        Ok((before - self.working.snapshots.len()) as u64)
    }

    async fn insert_snapshot(&mut self, snapshot: &BalanceSnapshot) -> Result<(), StoreError> {
        if !self.working.transactions.contains_key(&snapshot.transaction_id) {
            return Err(StoreError::Corrupt(format!(
                "snapshot references missing transaction {}",
                snapshot.transaction_id
            )));
        }
        if self
            .working
            .snapshots
            .values()
            .any(|s| s.transaction_id == snapshot.transaction_id)
        {
            return Err(StoreError::Conflict(format!(
                "transaction {} already has a snapshot",
                snapshot.transaction_id
            )));
        }
        self.working.snapshots.insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn ledger_users(&mut self) -> Result<Vec<UserId>, StoreError> {
        let mut users: Vec<UserId> = self
            .working
            .transactions
            .values()
            .map(|t| t.user_id)
            .chain(self.working.snapshots.values().map(|s| s.user_id))
            .collect();
        users.sort_unstable();
        users.dedup();
        Ok(users)
    }

    async fn purge_user(&mut self, user_id: UserId) -> Result<PurgeSummary, StoreError> {
        let transactions_before = self.working.transactions.len();
        let snapshots_before = self.working.snapshots.len();
        self.working.transactions.retain(|_, t| t.user_id != user_id);
        self.working.snapshots.retain(|_, s| s.user_id != user_id);
        Ok(PurgeSummary {
            transactions: (transactions_before - self.working.transactions.len()) as u64,
            snapshots: (snapshots_before - self.working.snapshots.len()) as u64,
        })
    }

    async fn commit(self) -> Result<(), StoreError> {
        let Self {
            mut guard,
            working,
            store,
        } = self;
        if store.take_commit_failure() {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use crate::ledger::types::{Category, Source, TransactionKind};

    fn transaction(user_id: UserId, source: Source, day: u32) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            user_id,
            kind: TransactionKind::Income,
            category: Category::Salary,
            amount: dec!(10),
            date: Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap(),
            source,
        }
    }

    #[tokio::test]
    async fn test_uncommitted_unit_is_discarded() {
        let store = InMemoryLedgerStore::new();
        let user_id = UserId::new();
        let tx = transaction(user_id, Source::Bank, 1);

        let mut unit = store.begin().await.unwrap();
        unit.insert_transaction(&tx).await.unwrap();
        drop(unit);

        let mut unit = store.begin().await.unwrap();
        assert!(unit.find_transaction(user_id, tx.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_state_untouched() {
        let store = InMemoryLedgerStore::new();
        let user_id = UserId::new();
        let tx = transaction(user_id, Source::Bank, 1);

        store.fail_next_commits(1);
        let mut unit = store.begin().await.unwrap();
        unit.insert_transaction(&tx).await.unwrap();
        assert!(matches!(
            unit.commit().await,
            Err(StoreError::Unavailable(_))
        ));

        let mut unit = store.begin().await.unwrap();
        assert!(unit.list_transactions(user_id).await.unwrap().is_empty());
        unit.insert_transaction(&tx).await.unwrap();
        unit.commit().await.unwrap();

        let mut unit = store.begin().await.unwrap();
        assert_eq!(unit.list_transactions(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transactions_from_is_scoped_and_ordered() {
        let store = InMemoryLedgerStore::new();
        let user_id = UserId::new();
        let late = transaction(user_id, Source::Bank, 9);
        let early = transaction(user_id, Source::Bank, 2);
        let other_source = transaction(user_id, Source::Wallet, 5);
        let other_user = transaction(UserId::new(), Source::Bank, 5);

        let mut unit = store.begin().await.unwrap();
        for tx in [&late, &early, &other_source, &other_user] {
            unit.insert_transaction(tx).await.unwrap();
        }

        let key = LedgerKey::new(user_id, Source::Bank);
        let window = unit.transactions_from(key, early.date).await.unwrap();
        let ids: Vec<_> = window.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);

        let listed = unit.list_transactions(user_id).await.unwrap();
        assert_eq!(listed.first().map(|t| t.id), Some(late.id));
        assert_eq!(listed.len(), 3);
    }

    #[tokio::test]
    async fn test_deleting_transaction_cascades_to_snapshot() {
        let store = InMemoryLedgerStore::new();
        let user_id = UserId::new();
        let tx = transaction(user_id, Source::Wallet, 3);

        let mut unit = store.begin().await.unwrap();
        unit.insert_transaction(&tx).await.unwrap();
        unit.insert_snapshot(&BalanceSnapshot {
            id: SnapshotId::new(),
            user_id,
            source: Source::Wallet,
            transaction_id: tx.id,
            amount: dec!(10),
            date: tx.date,
        })
        .await
        .unwrap();

        assert!(unit.delete_transaction(user_id, tx.id).await.unwrap());
        assert!(unit.snapshots(tx.key()).await.unwrap().is_empty());
        assert!(!unit.delete_transaction(user_id, tx.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_requires_existing_transaction() {
        let store = InMemoryLedgerStore::new();
        let mut unit = store.begin().await.unwrap();

        let result = unit
            .insert_snapshot(&BalanceSnapshot {
                id: SnapshotId::new(),
                user_id: UserId::new(),
                source: Source::Bank,
                transaction_id: TransactionId::new(),
                amount: dec!(1),
                date: Utc::now(),
            })
            .await;
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }
}
