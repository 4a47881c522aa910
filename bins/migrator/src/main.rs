//! Database migration runner for Ledgerline.
//!
//! Usage:
//!   migrator up      - Create the transactions and balances tables
//!   migrator down    - Drop them again
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop everything and re-run migrations
//!
//! The target database is read from `DATABASE_URL`.

use ledgerline_db::migration::Migrator;
use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    cli::run_cli(Migrator).await;
}
