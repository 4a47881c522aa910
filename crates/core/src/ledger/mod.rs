//! Per-source running balance ledger.
//!
//! This module implements the core ledger functionality:
//! - Domain types and the category vocabulary
//! - Input validation
//! - Balance replay
//! - The recalculation engine that keeps snapshots in step with transactions
//! - Store traits and an in-memory store
//! - The transaction service callers go through

pub mod balance;
pub mod engine;
pub mod error;
pub mod memory;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod transaction;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod validation_props;

pub use balance::{RunningBalance, replay};
pub use engine::{AddEvent, DeleteEvent, RecalculationEngine, UpdateEvent, WindowReport};
pub use error::{LedgerError, StoreError, ValidationError};
pub use memory::{InMemoryLedgerStore, InMemoryLedgerUnit};
pub use service::{TransactionService, ledger_epoch};
pub use snapshot::BalanceSnapshot;
pub use store::{LedgerStore, LedgerUnit};
pub use transaction::{Transaction, sort_ledger_order};
pub use types::{Category, LedgerKey, PurgeSummary, Source, SourceBalances, TransactionKind};
pub use validation::{TransactionInput, ValidTransaction};
