//! Transaction aggregate.

use chrono::{DateTime, Utc};
use ledgerline_shared::types::{TransactionId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{Category, LedgerKey, Source, TransactionKind};

/// An income or expense recorded against one funding source.
///
/// `amount` is always positive; the sign comes from `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier. Also the tie-break between same-instant transactions.
    pub id: TransactionId,
    /// Owner of the transaction.
    pub user_id: UserId,
    /// Income or expense.
    pub kind: TransactionKind,
    /// Category, always consistent with `kind`.
    pub category: Category,
    /// Positive amount.
    pub amount: Decimal,
    /// When the transaction happened.
    pub date: DateTime<Utc>,
    /// Funding source affected.
    pub source: Source,
}

impl Transaction {
    /// Returns the key of the ledger this transaction belongs to.
    #[must_use]
    pub const fn key(&self) -> LedgerKey {
        LedgerKey::new(self.user_id, self.source)
    }

    /// Returns the amount with the sign of its kind applied.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }

    /// Sort key used everywhere transactions are replayed or read in ledger order.
    #[must_use]
    pub const fn ledger_order(&self) -> (DateTime<Utc>, TransactionId) {
        (self.date, self.id)
    }
}

/// Sorts transactions into ledger order: date, then id.
pub fn sort_ledger_order(transactions: &mut [Transaction]) {
    transactions.sort_by_key(Transaction::ledger_order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn transaction(kind: TransactionKind, amount: Decimal, day: u32) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            user_id: UserId::new(),
            kind,
            category: match kind {
                TransactionKind::Income => Category::Salary,
                TransactionKind::Expense => Category::Rent,
            },
            amount,
            date: Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap(),
            source: Source::Bank,
        }
    }

    #[test]
    fn test_signed_amount() {
        assert_eq!(
            transaction(TransactionKind::Income, dec!(100), 1).signed_amount(),
            dec!(100)
        );
        assert_eq!(
            transaction(TransactionKind::Expense, dec!(30), 1).signed_amount(),
            dec!(-30)
        );
    }

    #[test]
    fn test_sort_ledger_order_breaks_ties_by_id() {
        let first = transaction(TransactionKind::Income, dec!(1), 2);
        let second = transaction(TransactionKind::Income, dec!(2), 2);
        let earlier = transaction(TransactionKind::Expense, dec!(3), 1);

        let mut transactions = vec![second.clone(), earlier.clone(), first.clone()];
        sort_ledger_order(&mut transactions);

        let ids: Vec<_> = transactions.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![earlier.id, first.id, second.id]);
    }

    #[test]
    fn test_key() {
        let tx = transaction(TransactionKind::Income, dec!(5), 3);
        assert_eq!(tx.key(), LedgerKey::new(tx.user_id, Source::Bank));
    }
}
