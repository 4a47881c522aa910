//! Transaction service.
//!
//! Entry point for callers that add, edit or remove transactions. Every write
//! validates its input, then runs one unit of work:
//! 1. lock the ledger key(s) involved, in ascending key order
//! 2. apply the transaction mutation
//! 3. let the [`RecalculationEngine`] rewrite the affected windows
//! 4. commit
//!
//! Writes failing with a retryable error are redone from step 1, up to
//! `max_attempts` times with a linear backoff.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ledgerline_shared::LedgerConfig;
use ledgerline_shared::types::{STORAGE_SCALE, TransactionId, UserId};
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::balance::{drift_allowance, last_date, replay};
use super::engine::{AddEvent, DeleteEvent, RecalculationEngine, UpdateEvent};
use super::error::LedgerError;
use super::snapshot::BalanceSnapshot;
use super::store::{LedgerStore, LedgerUnit};
use super::transaction::Transaction;
use super::types::{LedgerKey, PurgeSummary, Source, SourceBalances};
use super::validation::{TransactionInput, ValidTransaction};

/// Start of every full rebuild: 0001-01-01T00:00:00Z.
#[must_use]
pub fn ledger_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(-62_135_596_800, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Transaction service over a [`LedgerStore`].
pub struct TransactionService<S: LedgerStore> {
    store: Arc<S>,
    config: LedgerConfig,
}

impl<S: LedgerStore> TransactionService<S> {
    /// Creates a new transaction service.
    #[must_use]
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Records a new transaction and updates its ledger.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for bad input, or the store/engine error that
    /// survived every retry.
    pub async fn add(
        &self,
        user_id: UserId,
        input: &TransactionInput,
    ) -> Result<Transaction, LedgerError> {
        let transaction = input.validate()?.into_transaction(TransactionId::new(), user_id);

        let added = self
            .with_retry("add", || self.try_add(transaction.clone()))
            .await?;

        info!(
            user_id = %added.user_id,
            transaction_id = %added.id,
            source = %added.source,
            "Transaction added"
        );
        Ok(added)
    }

    async fn try_add(&self, transaction: Transaction) -> Result<Transaction, LedgerError> {
        let mut unit = self.store.begin().await?;
        unit.lock_ledger(transaction.key()).await?;

        // A previous attempt may have committed before reporting failure.
        match unit
            .find_transaction(transaction.user_id, transaction.id)
            .await?
        {
            Some(existing) if existing == transaction => {}
            Some(_) => return Err(LedgerError::ConcurrentModification),
            None => unit.insert_transaction(&transaction).await?,
        }

        RecalculationEngine::on_add(&mut unit, &AddEvent::from(&transaction)).await?;
        unit.commit().await?;
        Ok(transaction)
    }

    /// Replaces every editable field of a transaction and updates the ledger(s)
    /// it leaves and joins.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for bad input, `TransactionNotFound` if the user has
    /// no such transaction, or the store/engine error that survived every retry.
    pub async fn update(
        &self,
        user_id: UserId,
        id: TransactionId,
        input: &TransactionInput,
    ) -> Result<Transaction, LedgerError> {
        let valid = input.validate()?;

        let (before, after) = self
            .with_retry("update", || self.try_update(user_id, id, valid))
            .await?;

        info!(
            user_id = %user_id,
            transaction_id = %id,
            old_source = %before.source,
            new_source = %after.source,
            "Transaction updated"
        );
        Ok(after)
    }

    async fn try_update(
        &self,
        user_id: UserId,
        id: TransactionId,
        valid: ValidTransaction,
    ) -> Result<(Transaction, Transaction), LedgerError> {
        let mut unit = self.store.begin().await?;
        let seen = unit
            .find_transaction(user_id, id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))?;
        let after = valid.into_transaction(id, user_id);

        let mut keys = vec![seen.key(), after.key()];
        keys.sort_unstable();
        keys.dedup();
        for key in keys {
            unit.lock_ledger(key).await?;
        }

        let before = unit
            .find_transaction(user_id, id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))?;
        if before.source != seen.source {
            return Err(LedgerError::ConcurrentModification);
        }

        if !unit.update_transaction(&after).await? {
            return Err(LedgerError::TransactionNotFound(id));
        }
        RecalculationEngine::on_update(&mut unit, &UpdateEvent::between(&before, &after)).await?;
        unit.commit().await?;
        Ok((before, after))
    }

    /// Removes a transaction and updates its ledger. Returns the removed record.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` if the user has no such transaction, or the
    /// store/engine error that survived every retry.
    pub async fn delete(
        &self,
        user_id: UserId,
        id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        let removed = self
            .with_retry("delete", || self.try_delete(user_id, id))
            .await?;

        info!(
            user_id = %user_id,
            transaction_id = %id,
            source = %removed.source,
            "Transaction deleted"
        );
        Ok(removed)
    }

    async fn try_delete(
        &self,
        user_id: UserId,
        id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        let mut unit = self.store.begin().await?;
        let seen = unit
            .find_transaction(user_id, id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))?;
        unit.lock_ledger(seen.key()).await?;

        let removed = unit
            .find_transaction(user_id, id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))?;
        if removed.source != seen.source {
            return Err(LedgerError::ConcurrentModification);
        }

        if !unit.delete_transaction(user_id, id).await? {
            return Err(LedgerError::TransactionNotFound(id));
        }
        RecalculationEngine::on_delete(&mut unit, &DeleteEvent::from(&removed)).await?;
        unit.commit().await?;
        Ok(removed)
    }

    /// Returns one transaction of a user.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` if the user has no such transaction.
    pub async fn get(&self, user_id: UserId, id: TransactionId) -> Result<Transaction, LedgerError> {
        let mut unit = self.store.begin().await?;
        unit.find_transaction(user_id, id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    /// Lists a user's transactions, newest first.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Transaction>, LedgerError> {
        let mut unit = self.store.begin().await?;
        Ok(unit.list_transactions(user_id).await?)
    }

    /// Current balance of each source.
    pub async fn balances(&self, user_id: UserId) -> Result<SourceBalances, LedgerError> {
        let mut unit = self.store.begin().await?;
        let bank = unit
            .latest_snapshot(LedgerKey::new(user_id, Source::Bank))
            .await?;
        let wallet = unit
            .latest_snapshot(LedgerKey::new(user_id, Source::Wallet))
            .await?;

        let latest: Vec<BalanceSnapshot> = bank.iter().chain(wallet.iter()).cloned().collect();
        Ok(SourceBalances {
            bank: bank.map_or(Decimal::ZERO, |s| s.amount),
            wallet: wallet.map_or(Decimal::ZERO, |s| s.amount),
            as_of: last_date(&latest),
        })
    }

    /// Every snapshot of one ledger, in ledger order.
    pub async fn ledger(
        &self,
        user_id: UserId,
        source: Source,
    ) -> Result<Vec<BalanceSnapshot>, LedgerError> {
        let mut unit = self.store.begin().await?;
        Ok(unit.snapshots(LedgerKey::new(user_id, source)).await?)
    }

    /// Users that own any ledger data.
    pub async fn users(&self) -> Result<Vec<UserId>, LedgerError> {
        let mut unit = self.store.begin().await?;
        Ok(unit.ledger_users().await?)
    }

    /// Recomputes a whole ledger from zero. Returns the number of snapshots written.
    ///
    /// # Errors
    ///
    /// Returns the store/engine error that survived every retry.
    pub async fn rebuild(&self, user_id: UserId, source: Source) -> Result<usize, LedgerError> {
        let key = LedgerKey::new(user_id, source);
        let report = self
            .with_retry("rebuild", || async move {
                let mut unit = self.store.begin().await?;
                unit.lock_ledger(key).await?;
                let report = RecalculationEngine::recalculate(&mut unit, key, ledger_epoch()).await?;
                unit.commit().await?;
                Ok(report)
            })
            .await?;

        info!(
            user_id = %user_id,
            source = %source,
            snapshots = report.replayed,
            stale_removed = report.stale_removed,
            "Ledger rebuilt"
        );
        Ok(report.replayed)
    }

    /// Compares the stored ledger with a from-zero replay of its transactions.
    /// Returns the number of snapshots checked.
    ///
    /// Amounts are compared exactly unless some transaction carries more than two
    /// decimal places, in which case the documented rounding drift is tolerated.
    ///
    /// # Errors
    ///
    /// Returns `InconsistentLedger` on the first difference.
    pub async fn verify(&self, user_id: UserId, source: Source) -> Result<usize, LedgerError> {
        let key = LedgerKey::new(user_id, source);
        let mut unit = self.store.begin().await?;
        // Both reads must see the same committed state.
        unit.lock_ledger(key).await?;
        let transactions = unit.transactions_from(key, ledger_epoch()).await?;
        let stored = unit.snapshots(key).await?;
        drop(unit);

        let inconsistent = |detail: String| LedgerError::InconsistentLedger {
            user_id,
            ledger_source: source,
            detail,
        };

        let expected = replay(key, Decimal::ZERO, &transactions)?;
        if stored.len() != expected.len() {
            return Err(inconsistent(format!(
                "{} snapshots for {} transactions",
                stored.len(),
                expected.len()
            )));
        }

        let tolerant = transactions
            .iter()
            .any(|tx| tx.amount.scale() > STORAGE_SCALE);
        for (position, (snapshot, want)) in stored.iter().zip(&expected).enumerate() {
            if snapshot.transaction_id != want.transaction_id {
                return Err(inconsistent(format!(
                    "snapshot {position} belongs to {} instead of {}",
                    snapshot.transaction_id, want.transaction_id
                )));
            }
            let allowance = if tolerant {
                drift_allowance(position)
            } else {
                Decimal::ZERO
            };
            if (snapshot.amount - want.amount).abs() > allowance {
                return Err(inconsistent(format!(
                    "snapshot of {} holds {} instead of {}",
                    snapshot.transaction_id, snapshot.amount, want.amount
                )));
            }
        }

        Ok(stored.len())
    }

    /// Deletes every transaction and snapshot of a user.
    ///
    /// # Errors
    ///
    /// Returns the store error that survived every retry.
    pub async fn reset(&self, user_id: UserId) -> Result<PurgeSummary, LedgerError> {
        let summary = self
            .with_retry("reset", || async move {
                let mut unit = self.store.begin().await?;
                for source in Source::ALL {
                    unit.lock_ledger(LedgerKey::new(user_id, source)).await?;
                }
                let summary = unit.purge_user(user_id).await?;
                unit.commit().await?;
                Ok(summary)
            })
            .await?;

        info!(
            user_id = %user_id,
            transactions = summary.transactions,
            snapshots = summary.snapshots,
            "User ledger data reset"
        );
        Ok(summary)
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut tries = 1;
        loop {
            match attempt().await {
                Err(err) if err.is_retryable() && tries < max_attempts => {
                    warn!(
                        operation,
                        attempt = tries,
                        error = %err,
                        "Ledger write failed, retrying"
                    );
                    let backoff = self.config.retry_backoff_ms.saturating_mul(u64::from(tries));
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    tries += 1;
                }
                result => return result,
            }
        }
    }
}
