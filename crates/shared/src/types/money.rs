//! Money rounding rules.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are `rust_decimal::Decimal` end to end. Rounding happens exactly once,
//! when a running balance is persisted; arithmetic in between stays exact.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept on persisted balance amounts.
pub const STORAGE_SCALE: u32 = 2;

/// Largest magnitude a persisted amount may have: 17 integer digits and
/// [`STORAGE_SCALE`] decimals, the shape of the `NUMERIC(19,2)` balance column.
#[must_use]
pub fn max_stored_amount() -> Decimal {
    Decimal::from_i128_with_scale(9_999_999_999_999_999_999, STORAGE_SCALE)
}

/// Whether `amount`, once rounded for storage, fits the persisted range.
#[must_use]
pub fn fits_storage(amount: Decimal) -> bool {
    round_for_storage(amount).abs() <= max_stored_amount()
}

/// Rounds an amount to [`STORAGE_SCALE`] places, midpoints away from zero.
///
/// This matches the `toFixed(2)` display rounding users already see for their balances.
#[must_use]
pub fn round_for_storage(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(STORAGE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
