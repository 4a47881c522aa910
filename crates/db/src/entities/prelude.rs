//! `SeaORM` entity prelude.

pub use super::balances::Entity as Balances;
pub use super::transactions::Entity as Transactions;
