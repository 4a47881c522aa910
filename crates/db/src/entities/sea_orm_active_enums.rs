//! `SeaORM` active enums, mapped one-to-one onto the ledger domain enums.

use ledgerline_core::ledger::{Category, Source, TransactionKind};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "transaction_type")]
pub enum TransactionType {
    #[sea_orm(string_value = "income")]
    Income,
    #[sea_orm(string_value = "expense")]
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "funding_source")]
pub enum FundingSource {
    #[sea_orm(string_value = "bank")]
    Bank,
    #[sea_orm(string_value = "wallet")]
    Wallet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "transaction_category"
)]
pub enum TransactionCategory {
    #[sea_orm(string_value = "salary")]
    Salary,
    #[sea_orm(string_value = "business")]
    Business,
    #[sea_orm(string_value = "investment")]
    Investment,
    #[sea_orm(string_value = "eating")]
    Eating,
    #[sea_orm(string_value = "shopping")]
    Shopping,
    #[sea_orm(string_value = "entertainment")]
    Entertainment,
    #[sea_orm(string_value = "travel")]
    Travel,
    #[sea_orm(string_value = "groceries")]
    Groceries,
    #[sea_orm(string_value = "rent")]
    Rent,
    #[sea_orm(string_value = "health")]
    Health,
    #[sea_orm(string_value = "gift")]
    Gift,
    #[sea_orm(string_value = "fuel")]
    Fuel,
    #[sea_orm(string_value = "transport")]
    Transport,
    #[sea_orm(string_value = "other")]
    Other,
}

impl From<TransactionKind> for TransactionType {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Income => Self::Income,
            TransactionKind::Expense => Self::Expense,
        }
    }
}

impl From<TransactionType> for TransactionKind {
    fn from(value: TransactionType) -> Self {
        match value {
            TransactionType::Income => Self::Income,
            TransactionType::Expense => Self::Expense,
        }
    }
}

impl From<Source> for FundingSource {
    fn from(source: Source) -> Self {
        match source {
            Source::Bank => Self::Bank,
            Source::Wallet => Self::Wallet,
        }
    }
}

impl From<FundingSource> for Source {
    fn from(value: FundingSource) -> Self {
        match value {
            FundingSource::Bank => Self::Bank,
            FundingSource::Wallet => Self::Wallet,
        }
    }
}

impl From<Category> for TransactionCategory {
    fn from(category: Category) -> Self {
        match category {
            Category::Salary => Self::Salary,
            Category::Business => Self::Business,
            Category::Investment => Self::Investment,
            Category::Eating => Self::Eating,
            Category::Shopping => Self::Shopping,
            Category::Entertainment => Self::Entertainment,
            Category::Travel => Self::Travel,
            Category::Groceries => Self::Groceries,
            Category::Rent => Self::Rent,
            Category::Health => Self::Health,
            Category::Gift => Self::Gift,
            Category::Fuel => Self::Fuel,
            Category::Transport => Self::Transport,
            Category::Other => Self::Other,
        }
    }
}

impl From<TransactionCategory> for Category {
    fn from(value: TransactionCategory) -> Self {
        match value {
            TransactionCategory::Salary => Self::Salary,
            TransactionCategory::Business => Self::Business,
            TransactionCategory::Investment => Self::Investment,
            TransactionCategory::Eating => Self::Eating,
            TransactionCategory::Shopping => Self::Shopping,
            TransactionCategory::Entertainment => Self::Entertainment,
            TransactionCategory::Travel => Self::Travel,
            TransactionCategory::Groceries => Self::Groceries,
            TransactionCategory::Rent => Self::Rent,
            TransactionCategory::Health => Self::Health,
            TransactionCategory::Gift => Self::Gift,
            TransactionCategory::Fuel => Self::Fuel,
            TransactionCategory::Transport => Self::Transport,
            TransactionCategory::Other => Self::Other,
        }
    }
}
