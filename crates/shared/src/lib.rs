//! Shared types and configuration for ledgerline.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for users, transactions and balance snapshots
//! - Money rounding rules for persisted balances
//! - Configuration management

pub mod config;
pub mod types;

pub use config::{AppConfig, DatabaseConfig, LedgerConfig};
