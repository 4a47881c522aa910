//! Ledger error types.
//!
//! - [`ValidationError`]: bad input, raised before the engine runs.
//! - [`StoreError`]: failures reported by a store adapter.
//! - [`LedgerError`]: everything a ledger operation can surface to its caller.

use chrono::{DateTime, Utc};
use ledgerline_shared::types::{TransactionId, UserId};
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{Category, Source, TransactionKind};

/// Input rejected before the recalculation engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Amount is zero or negative.
    #[error("Amount must be a positive number, got {0}")]
    NonPositiveAmount(Decimal),

    /// Amount does not fit the persisted balance range.
    #[error("Amount must not exceed 99999999999999999.99, got {0}")]
    AmountTooLarge(Decimal),

    /// Date lies before the start of every ledger, 0001-01-01.
    #[error("Date must not be before 0001-01-01, got {0}")]
    DateBeforeEpoch(DateTime<Utc>),

    /// Transaction type is neither income nor expense.
    #[error("Unknown transaction type: {0}")]
    UnknownKind(String),

    /// Category is not part of the vocabulary.
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    /// Category exists but belongs to the other transaction type.
    #[error("Invalid category {category} for the given transaction type {kind}")]
    CategoryKindMismatch {
        /// The requested category.
        category: Category,
        /// The requested transaction type.
        kind: TransactionKind,
    },

    /// Source is neither bank nor wallet.
    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

/// Failure reported by a [`LedgerStore`](super::store::LedgerStore) adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store could not be reached or the I/O failed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Another writer got in the way (serialization failure, lock timeout).
    #[error("Store conflict: {0}")]
    Conflict(String),

    /// Stored data could not be mapped back into the domain.
    #[error("Corrupt stored data: {0}")]
    Corrupt(String),

    /// The store refused a value outside its column range (SQLSTATE 22003).
    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Store could not complete the operation; the whole operation can be retried.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Concurrent modification detected.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    /// The ledger does not match its transactions after a replay.
    #[error("Ledger {user_id}/{ledger_source} is inconsistent: {detail}")]
    InconsistentLedger {
        /// Owner of the ledger.
        user_id: UserId,
        /// Source of the ledger.
        ledger_source: Source,
        /// What did not match.
        detail: String,
    },

    /// A running balance left the range that can be persisted.
    #[error("Balance of ledger {user_id}/{ledger_source} is out of range at transaction {transaction_id}")]
    BalanceOutOfRange {
        /// Owner of the ledger.
        user_id: UserId,
        /// Source of the ledger.
        ledger_source: Source,
        /// First transaction whose balance does not fit.
        transaction_id: TransactionId,
    },

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::Conflict(_) => Self::ConcurrentModification,
            StoreError::Corrupt(msg) | StoreError::OutOfRange(msg) => Self::Internal(msg),
        }
    }
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::InconsistentLedger { .. } => "INCONSISTENT_LEDGER",
            Self::BalanceOutOfRange { .. } => "BALANCE_OUT_OF_RANGE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::TransactionNotFound(_) => 404,
            Self::ConcurrentModification => 409,
            Self::BalanceOutOfRange { .. } => 422,
            Self::StoreUnavailable(_) => 503,
            Self::InconsistentLedger { .. } | Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// Recalculation is idempotent, so a retry always redoes the whole window.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::ConcurrentModification)
    }
}
