//! Running balance calculations.
//!
//! A ledger is replayed from a seed: the persisted balance immediately before the
//! window, or zero. The running total is carried exactly; each snapshot rounds it
//! only at the point where it becomes a persisted amount.
//!
//! Rounding drift: when a later replay seeds from an already-rounded snapshot and
//! amounts carry more than two decimal places, its totals may differ from a
//! from-zero replay by up to half a cent per seeding boundary. That error is
//! accepted; [`drift_allowance`] bounds it for verification.

use chrono::{DateTime, Utc};
use ledgerline_shared::types::{SnapshotId, fits_storage, round_for_storage};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::snapshot::BalanceSnapshot;
use super::transaction::Transaction;
use super::types::LedgerKey;

/// Running balance at one position of a replay.
///
/// - `applied`: number of transactions applied since the seed
/// - `previous_balance`: balance before the last transaction
/// - `current_balance`: balance after the last transaction, unrounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningBalance {
    /// Transactions applied since the seed.
    pub applied: usize,
    /// Balance before the last applied transaction.
    pub previous_balance: Decimal,
    /// Balance after the last applied transaction.
    pub current_balance: Decimal,
}

impl RunningBalance {
    /// Starts a replay from a seed balance.
    #[must_use]
    pub const fn seeded(seed: Decimal) -> Self {
        Self {
            applied: 0,
            previous_balance: seed,
            current_balance: seed,
        }
    }

    /// Applies one signed change. Returns `None` when the sum overflows `Decimal`.
    ///
    /// - current_balance[N] = current_balance[N-1] + change
    /// - previous_balance[N] = current_balance[N-1]
    #[must_use]
    pub fn next_entry(&self, change: Decimal) -> Option<Self> {
        Some(Self {
            applied: self.applied + 1,
            previous_balance: self.current_balance,
            current_balance: self.current_balance.checked_add(change)?,
        })
    }

    /// The value written to storage for this position.
    #[must_use]
    pub fn persisted(&self) -> Decimal {
        round_for_storage(self.current_balance)
    }
}

/// Replays a window of transactions on top of a seed.
///
/// `window` must already be in ledger order and belong to `key`. Returns one
/// snapshot per transaction, in the same order.
///
/// # Errors
///
/// Returns `BalanceOutOfRange` at the first transaction whose balance cannot be
/// persisted.
pub fn replay(
    key: LedgerKey,
    seed: Decimal,
    window: &[Transaction],
) -> Result<Vec<BalanceSnapshot>, LedgerError> {
    let mut running = RunningBalance::seeded(seed);
    window
        .iter()
        .map(|tx| {
            running = running
                .next_entry(tx.signed_amount())
                .filter(|next| fits_storage(next.current_balance))
                .ok_or(LedgerError::BalanceOutOfRange {
                    user_id: key.user_id,
                    ledger_source: key.source,
                    transaction_id: tx.id,
                })?;
            Ok(BalanceSnapshot {
                id: SnapshotId::new(),
                user_id: key.user_id,
                source: key.source,
                transaction_id: tx.id,
                amount: running.persisted(),
                date: tx.date,
            })
        })
        .collect()
}

/// Largest difference tolerated between a stored snapshot at `position` and a
/// from-zero replay. Both sides round on their own and every earlier snapshot
/// may have been a seeding boundary, so the bound is one cent per snapshot up to
/// and including `position`.
#[must_use]
pub fn drift_allowance(position: usize) -> Decimal {
    let snapshots = u64::try_from(position).map_or(u64::MAX, |p| p.saturating_add(1));
    Decimal::new(1, 2) * Decimal::from(snapshots)
}

/// Latest date in a ledger, if any.
#[must_use]
pub fn last_date(snapshots: &[BalanceSnapshot]) -> Option<DateTime<Utc>> {
    snapshots.iter().map(|s| s.date).max()
}
