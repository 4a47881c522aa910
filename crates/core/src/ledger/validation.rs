//! Business rule validation for incoming transactions.
//!
//! Raw input arrives with free-form strings for type, category and source.
//! Validation normalizes them (trimmed, case-insensitive) and enforces:
//! - amount is strictly positive and fits the persisted balance range
//! - date is not before 0001-01-01, where every full replay starts
//! - type, category and source are known values
//! - the category belongs to the type
//!
//! Dates are truncated to whole microseconds, the precision stores keep.

use chrono::{DateTime, SubsecRound, Utc};
use ledgerline_shared::types::{TransactionId, UserId, max_stored_amount};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::service::ledger_epoch;
use super::transaction::Transaction;
use super::types::{Category, Source, TransactionKind};

/// Transaction fields as supplied by a caller, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInput {
    /// When the transaction happened.
    pub date: DateTime<Utc>,
    /// Amount, must be positive.
    pub amount: Decimal,
    /// `income` or `expense`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Category name from the vocabulary of `kind`.
    pub category: String,
    /// `bank` or `wallet`.
    pub source: String,
}

/// Transaction fields that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidTransaction {
    /// When the transaction happened.
    pub date: DateTime<Utc>,
    /// Positive amount.
    pub amount: Decimal,
    /// Income or expense.
    pub kind: TransactionKind,
    /// Category matching `kind`.
    pub category: Category,
    /// Funding source.
    pub source: Source,
}

impl TransactionInput {
    /// Validates the input.
    ///
    /// # Errors
    ///
    /// Returns the first rule the input breaks.
    pub fn validate(&self) -> Result<ValidTransaction, ValidationError> {
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(self.amount));
        }
        if self.amount > max_stored_amount() {
            return Err(ValidationError::AmountTooLarge(self.amount));
        }
        if self.date < ledger_epoch() {
            return Err(ValidationError::DateBeforeEpoch(self.date));
        }

        let kind: TransactionKind = self.kind.parse()?;
        let source: Source = self.source.parse()?;
        let category: Category = self.category.parse()?;

        if category.kind() != kind {
            return Err(ValidationError::CategoryKindMismatch { category, kind });
        }

        Ok(ValidTransaction {
            date: self.date.trunc_subsecs(6),
            amount: self.amount,
            kind,
            category,
            source,
        })
    }
}

impl ValidTransaction {
    /// Builds the stored transaction record.
    #[must_use]
    pub const fn into_transaction(self, id: TransactionId, user_id: UserId) -> Transaction {
        Transaction {
            id,
            user_id,
            kind: self.kind,
            category: self.category,
            amount: self.amount,
            date: self.date,
            source: self.source,
        }
    }
}
