//! Recalculation engine.
//!
//! Every mutation of a ledger is handled the same way: pick the window of
//! transactions at or after the earliest touched date, drop their snapshots,
//! seed from the snapshot just before the window (or zero) and replay the window
//! in ledger order. Snapshots before the window are never touched.
//!
//! All hooks run inside a caller-provided [`LedgerUnit`] that already holds the
//! ledger lock for every key involved and has already applied the transaction
//! mutation. The caller commits or drops the unit.

use chrono::{DateTime, Utc};
use ledgerline_shared::types::{TransactionId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::balance::replay;
use super::error::LedgerError;
use super::store::LedgerUnit;
use super::transaction::Transaction;
use super::types::{LedgerKey, Source, TransactionKind};

/// A transaction was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEvent {
    /// Owner.
    pub user_id: UserId,
    /// The stored transaction.
    pub transaction_id: TransactionId,
    /// Source of the stored transaction.
    pub source: Source,
    /// Date of the stored transaction.
    pub date: DateTime<Utc>,
    /// Positive amount.
    pub amount: Decimal,
    /// Income or expense.
    pub kind: TransactionKind,
}

impl From<&Transaction> for AddEvent {
    fn from(tx: &Transaction) -> Self {
        Self {
            user_id: tx.user_id,
            transaction_id: tx.id,
            source: tx.source,
            date: tx.date,
            amount: tx.amount,
            kind: tx.kind,
        }
    }
}

/// A transaction was removed. Carries the values it had before removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEvent {
    /// Owner.
    pub user_id: UserId,
    /// The removed transaction.
    pub transaction_id: TransactionId,
    /// Source it was recorded against.
    pub source: Source,
    /// Date it had.
    pub date: DateTime<Utc>,
}

impl From<&Transaction> for DeleteEvent {
    fn from(tx: &Transaction) -> Self {
        Self {
            user_id: tx.user_id,
            transaction_id: tx.id,
            source: tx.source,
            date: tx.date,
        }
    }
}

/// A transaction was edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEvent {
    /// Owner.
    pub user_id: UserId,
    /// The edited transaction.
    pub transaction_id: TransactionId,
    /// Source before the edit.
    pub old_source: Source,
    /// Date before the edit.
    pub old_date: DateTime<Utc>,
    /// Source after the edit.
    pub new_source: Source,
    /// Date after the edit.
    pub new_date: DateTime<Utc>,
    /// Amount after the edit.
    pub new_amount: Decimal,
    /// Kind after the edit.
    pub new_kind: TransactionKind,
}

impl UpdateEvent {
    /// Builds the event from the record before and after the edit.
    #[must_use]
    pub fn between(old: &Transaction, new: &Transaction) -> Self {
        Self {
            user_id: new.user_id,
            transaction_id: new.id,
            old_source: old.source,
            old_date: old.date,
            new_source: new.source,
            new_date: new.date,
            new_amount: new.amount,
            new_kind: new.kind,
        }
    }

    /// Earliest date whose snapshots the edit can invalidate.
    #[must_use]
    pub fn earliest(&self) -> DateTime<Utc> {
        self.old_date.min(self.new_date)
    }

    /// Ledgers affected, old source first, without duplicates.
    #[must_use]
    pub fn sources(&self) -> Vec<Source> {
        if self.old_source == self.new_source {
            vec![self.old_source]
        } else {
            vec![self.old_source, self.new_source]
        }
    }
}

/// Outcome of rewriting one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowReport {
    /// Ledger rewritten.
    pub key: LedgerKey,
    /// First date of the window.
    pub window_start: DateTime<Utc>,
    /// Balance the replay started from.
    pub seed: Decimal,
    /// Transactions replayed, equal to snapshots written.
    pub replayed: usize,
    /// Snapshots removed before the replay.
    pub stale_removed: u64,
    /// Last balance written, `None` when the window was empty.
    pub closing: Option<Decimal>,
}

/// Keeps balance snapshots in step with the transactions they derive from.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecalculationEngine;

impl RecalculationEngine {
    /// Rewrites the ledger after a transaction was stored.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` if the stored transaction is not part of its
    /// own window, and `Internal` if the stored record disagrees with the event.
    pub async fn on_add<U: LedgerUnit>(
        unit: &mut U,
        event: &AddEvent,
    ) -> Result<WindowReport, LedgerError> {
        let key = LedgerKey::new(event.user_id, event.source);
        let window = unit.transactions_from(key, event.date).await?;

        let stored = window
            .iter()
            .find(|tx| tx.id == event.transaction_id)
            .ok_or(LedgerError::TransactionNotFound(event.transaction_id))?;
        if stored.date != event.date || stored.amount != event.amount || stored.kind != event.kind
        {
            return Err(LedgerError::Internal(format!(
                "stored transaction {} does not match the add event",
                event.transaction_id
            )));
        }

        Self::rewrite_window(unit, key, event.date, window).await
    }

    /// Rewrites the ledger after a transaction was removed.
    ///
    /// The removed transaction is skipped even if the unit still returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the rewritten window is inconsistent.
    pub async fn on_delete<U: LedgerUnit>(
        unit: &mut U,
        event: &DeleteEvent,
    ) -> Result<WindowReport, LedgerError> {
        let key = LedgerKey::new(event.user_id, event.source);
        unit.delete_snapshots_for(event.user_id, &[event.transaction_id])
            .await?;

        let mut window = unit.transactions_from(key, event.date).await?;
        window.retain(|tx| tx.id != event.transaction_id);

        Self::rewrite_window(unit, key, event.date, window).await
    }

    /// Rewrites every ledger touched by an edit: the old source first, then the
    /// new one when it differs. Both windows start at the earlier of the two
    /// dates.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` if the edited transaction is missing from the
    /// new ledger, and `Internal` if it still shows up in the vacated ledger or
    /// disagrees with the event.
    pub async fn on_update<U: LedgerUnit>(
        unit: &mut U,
        event: &UpdateEvent,
    ) -> Result<Vec<WindowReport>, LedgerError> {
        let earliest = event.earliest();
        unit.delete_snapshots_for(event.user_id, &[event.transaction_id])
            .await?;

        let mut reports = Vec::with_capacity(2);
        for source in event.sources() {
            let key = LedgerKey::new(event.user_id, source);
            let window = unit.transactions_from(key, earliest).await?;
            let edited = window.iter().find(|tx| tx.id == event.transaction_id);

            if source == event.new_source {
                let edited = edited.ok_or(LedgerError::TransactionNotFound(event.transaction_id))?;
                if edited.date != event.new_date
                    || edited.amount != event.new_amount
                    || edited.kind != event.new_kind
                {
                    return Err(LedgerError::Internal(format!(
                        "stored transaction {} does not match the update event",
                        event.transaction_id
                    )));
                }
            } else if edited.is_some() {
                return Err(LedgerError::Internal(format!(
                    "transaction {} is still recorded against {source}",
                    event.transaction_id
                )));
            }

            reports.push(Self::rewrite_window(unit, key, earliest, window).await?);
        }

        Ok(reports)
    }

    /// Rewrites the ledger of `key` from `from` onwards, whatever triggered it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the rewritten window is inconsistent.
    pub async fn recalculate<U: LedgerUnit>(
        unit: &mut U,
        key: LedgerKey,
        from: DateTime<Utc>,
    ) -> Result<WindowReport, LedgerError> {
        let window = unit.transactions_from(key, from).await?;
        Self::rewrite_window(unit, key, from, window).await
    }

    async fn rewrite_window<U: LedgerUnit>(
        unit: &mut U,
        key: LedgerKey,
        window_start: DateTime<Utc>,
        window: Vec<Transaction>,
    ) -> Result<WindowReport, LedgerError> {
        let stale_removed = unit.delete_snapshots_from(key, window_start).await?;
        let seed = unit
            .latest_snapshot_before(key, window_start)
            .await?
            .map_or(Decimal::ZERO, |snapshot| snapshot.amount);

        let snapshots = replay(key, seed, &window)?;
        for snapshot in &snapshots {
            unit.insert_snapshot(snapshot).await?;
        }

        let written = unit.count_snapshots_from(key, window_start).await?;
        let expected = u64::try_from(window.len()).unwrap_or(u64::MAX);
        if written != expected {
            return Err(LedgerError::InconsistentLedger {
                user_id: key.user_id,
                ledger_source: key.source,
                detail: format!(
                    "{written} snapshots from {window_start} after replaying {expected} transactions"
                ),
            });
        }

        debug!(
            user_id = %key.user_id,
            source = %key.source,
            window_start = %window_start,
            seed = %seed,
            replayed = window.len(),
            stale_removed,
            "Ledger window rewritten"
        );

        Ok(WindowReport {
            key,
            window_start,
            seed,
            replayed: window.len(),
            stale_removed,
            closing: snapshots.last().map(|snapshot| snapshot.amount),
        })
    }
}
