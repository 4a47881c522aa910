//! Ledger domain types.
//!
//! This module defines the vocabulary shared by the transaction store, the
//! balance ledger and the recalculation engine: transaction kinds, categories,
//! funding sources and the key that identifies one running balance.

use chrono::{DateTime, Utc};
use ledgerline_shared::types::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Whether a transaction adds money to a source or takes it away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money coming in.
    Income,
    /// Money going out.
    Expense,
}

impl TransactionKind {
    /// Returns the lowercase name used in storage and APIs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// Applies the sign of this kind to a positive amount.
    ///
    /// Income is added to a running balance, expense is subtracted.
    #[must_use]
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Self::Income => amount,
            Self::Expense => -amount,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(ValidationError::UnknownKind(s.to_string())),
        }
    }
}

/// The funding account a transaction affects.
///
/// Each source of a user is tracked as an independent running balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Bank account.
    Bank,
    /// Cash wallet.
    Wallet,
}

impl Source {
    /// Every source, in ledger order.
    pub const ALL: [Self; 2] = [Self::Bank, Self::Wallet];

    /// Returns the lowercase name used in storage and APIs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Wallet => "wallet",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bank" => Ok(Self::Bank),
            "wallet" => Ok(Self::Wallet),
            _ => Err(ValidationError::UnknownSource(s.to_string())),
        }
    }
}

/// Fixed category vocabulary, keyed by [`TransactionKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    // Income categories
    /// Wages and salary.
    Salary,
    /// Business revenue.
    Business,
    /// Investment returns.
    Investment,

    // Expense categories
    /// Eating out.
    Eating,
    /// Shopping.
    Shopping,
    /// Entertainment.
    Entertainment,
    /// Travel.
    Travel,
    /// Groceries.
    Groceries,
    /// Rent.
    Rent,
    /// Health.
    Health,
    /// Gifts.
    Gift,
    /// Fuel.
    Fuel,
    /// Transport.
    Transport,
    /// Anything else.
    Other,
}

impl Category {
    /// Every category, income categories first.
    pub const ALL: [Self; 14] = [
        Self::Salary,
        Self::Business,
        Self::Investment,
        Self::Eating,
        Self::Shopping,
        Self::Entertainment,
        Self::Travel,
        Self::Groceries,
        Self::Rent,
        Self::Health,
        Self::Gift,
        Self::Fuel,
        Self::Transport,
        Self::Other,
    ];

    /// Returns the transaction kind this category belongs to.
    #[must_use]
    pub const fn kind(self) -> TransactionKind {
        match self {
            Self::Salary | Self::Business | Self::Investment => TransactionKind::Income,
            Self::Eating
            | Self::Shopping
            | Self::Entertainment
            | Self::Travel
            | Self::Groceries
            | Self::Rent
            | Self::Health
            | Self::Gift
            | Self::Fuel
            | Self::Transport
            | Self::Other => TransactionKind::Expense,
        }
    }

    /// Returns the lowercase name used in storage and APIs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Salary => "salary",
            Self::Business => "business",
            Self::Investment => "investment",
            Self::Eating => "eating",
            Self::Shopping => "shopping",
            Self::Entertainment => "entertainment",
            Self::Travel => "travel",
            Self::Groceries => "groceries",
            Self::Rent => "rent",
            Self::Health => "health",
            Self::Gift => "gift",
            Self::Fuel => "fuel",
            Self::Transport => "transport",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

/// Identifies one independent running balance: a user's bank or wallet.
///
/// Keys order by user, then source. Writers that need two keys lock them in
/// this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerKey {
    /// Owner of the ledger.
    pub user_id: UserId,
    /// Funding source tracked by the ledger.
    pub source: Source,
}

impl LedgerKey {
    /// Creates a ledger key.
    #[must_use]
    pub const fn new(user_id: UserId, source: Source) -> Self {
        Self { user_id, source }
    }
}

impl std::fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.user_id, self.source)
    }
}

/// Current balance of each source for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBalances {
    /// Latest bank balance, zero when the bank ledger is empty.
    pub bank: Decimal,
    /// Latest wallet balance, zero when the wallet ledger is empty.
    pub wallet: Decimal,
    /// Date of the most recent snapshot across both sources.
    pub as_of: Option<DateTime<Utc>>,
}

impl SourceBalances {
    /// Returns the balance of one source.
    #[must_use]
    pub const fn get(&self, source: Source) -> Decimal {
        match source {
            Source::Bank => self.bank,
            Source::Wallet => self.wallet,
        }
    }

    /// Returns the combined balance of both sources.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.bank + self.wallet
    }
}

/// Rows removed when a user's data is reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeSummary {
    /// Transactions deleted.
    pub transactions: u64,
    /// Balance snapshots deleted.
    pub snapshots: u64,
}
