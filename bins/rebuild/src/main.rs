//! Ledger maintenance tool.
//!
//! Replays stored transactions to rebuild every running-balance snapshot, or
//! with `--verify` only compares the stored ledger against a replay.
//!
//! Usage:
//!   ledgerline-rebuild --user <uuid> [--source bank|wallet] [--verify]
//!   ledgerline-rebuild --all [--source bank|wallet] [--verify]

use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledgerline_core::ledger::{LedgerError, Source, TransactionService};
use ledgerline_db::{SeaOrmLedgerStore, connect_with};
use ledgerline_shared::AppConfig;
use ledgerline_shared::types::UserId;

#[derive(Parser, Debug)]
#[command(name = "ledgerline-rebuild")]
#[command(about = "Rebuild or verify per-source running balances")]
#[command(group(ArgGroup::new("target").required(true).args(["user", "all"])))]
struct Cli {
    /// Only this user's ledgers.
    #[arg(long)]
    user: Option<UserId>,

    /// Every user with at least one transaction.
    #[arg(long)]
    all: bool,

    /// Limit to one source (bank or wallet).
    #[arg(long)]
    source: Option<Source>,

    /// Compare instead of rewriting; exits non-zero on any mismatch.
    #[arg(long)]
    verify: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgerline=debug,ledgerline_rebuild=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;

    let db = connect_with(&config.database)
        .await
        .context("failed to connect to database")?;
    info!("Connected to database");

    let service = TransactionService::new(Arc::new(SeaOrmLedgerStore::new(db)), config.ledger);

    let users = match cli.user {
        Some(user_id) => vec![user_id],
        None => service.users().await?,
    };
    let sources = cli.source.map_or_else(|| Source::ALL.to_vec(), |s| vec![s]);

    let mut inconsistent = 0usize;
    for user_id in &users {
        for &source in &sources {
            if cli.verify {
                match service.verify(*user_id, source).await {
                    Ok(checked) => info!(user_id = %user_id, %source, checked, "Ledger consistent"),
                    Err(err @ LedgerError::InconsistentLedger { .. }) => {
                        error!(user_id = %user_id, %source, error = %err, "Ledger inconsistent");
                        inconsistent += 1;
                    }
                    Err(err) => return Err(err.into()),
                }
            } else {
                let rebuilt = service.rebuild(*user_id, source).await?;
                info!(user_id = %user_id, %source, rebuilt, "Ledger rebuilt");
            }
        }
    }

    info!(
        users = users.len(),
        ledgers = users.len() * sources.len(),
        inconsistent,
        "Done"
    );

    if inconsistent > 0 {
        anyhow::bail!("{inconsistent} ledger(s) do not match their transactions");
    }
    Ok(())
}
