//! Core business logic for Ledgerline.
//!
//! This crate contains the ledger domain with ZERO web or database dependencies.
//! Domain types, validation rules, the balance replay and the recalculation
//! engine live here; persistence is reached through the traits in
//! [`ledger::store`].
//!
//! # Modules
//!
//! - `ledger` - Transactions, balance snapshots and their recalculation

pub mod ledger;
