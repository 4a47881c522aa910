//! Property-based tests for transaction input validation.
//!
//! - Property 1: Non-positive amounts are always rejected
//! - Property 2: Every category validates only with its own type
//! - Property 3: Parsing ignores case and surrounding whitespace

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::error::ValidationError;
use super::types::{Category, Source, TransactionKind};
use super::validation::TransactionInput;

/// Strategy to generate a valid positive amount (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate zero or a negative amount.
fn non_positive_amount() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|cents| Decimal::new(-cents, 2))
}

fn kind_strategy() -> impl Strategy<Value = TransactionKind> {
    prop_oneof![Just(TransactionKind::Income), Just(TransactionKind::Expense)]
}

fn source_strategy() -> impl Strategy<Value = Source> {
    prop_oneof![Just(Source::Bank), Just(Source::Wallet)]
}

fn category_strategy() -> impl Strategy<Value = Category> {
    prop::sample::select(Category::ALL.to_vec())
}

/// Randomly upper-cases characters and pads with spaces.
fn scramble(value: &str, mask: u64, pad: usize) -> String {
    let body: String = value
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if mask >> (i % 64) & 1 == 1 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect();
    format!("{}{body}{}", " ".repeat(pad), " ".repeat(pad))
}

fn make_input(
    amount: Decimal,
    kind: TransactionKind,
    category: Category,
    source: Source,
) -> TransactionInput {
    TransactionInput {
        date: Utc.with_ymd_and_hms(2025, 1, 15, 8, 30, 0).unwrap(),
        amount,
        kind: kind.as_str().to_string(),
        category: category.as_str().to_string(),
        source: source.as_str().to_string(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1: *For any* amount <= 0, validation SHALL reject the input
    /// before looking at any other field.
    #[test]
    fn prop_non_positive_amount_rejected(
        amount in non_positive_amount(),
        kind in kind_strategy(),
        category in category_strategy(),
        source in source_strategy(),
    ) {
        let result = make_input(amount, kind, category, source).validate();
        prop_assert_eq!(result, Err(ValidationError::NonPositiveAmount(amount)));
    }

    /// Property 2: *For any* category and type, validation SHALL succeed exactly
    /// when the category belongs to the type.
    #[test]
    fn prop_category_matches_kind(
        amount in positive_amount(),
        kind in kind_strategy(),
        category in category_strategy(),
        source in source_strategy(),
    ) {
        let result = make_input(amount, kind, category, source).validate();
        if category.kind() == kind {
            let valid = result.unwrap();
            prop_assert_eq!(valid.category, category);
            prop_assert_eq!(valid.kind, kind);
            prop_assert_eq!(valid.source, source);
            prop_assert_eq!(valid.amount, amount);
        } else {
            prop_assert_eq!(
                result,
                Err(ValidationError::CategoryKindMismatch { category, kind })
            );
        }
    }

    /// Property 3: *For any* casing and padding of valid names, validation SHALL
    /// resolve the same values.
    #[test]
    fn prop_names_parse_case_insensitively(
        amount in positive_amount(),
        category in category_strategy(),
        source in source_strategy(),
        mask in any::<u64>(),
        pad in 0usize..3,
    ) {
        let kind = category.kind();
        let input = TransactionInput {
            kind: scramble(kind.as_str(), mask, pad),
            category: scramble(category.as_str(), mask.rotate_left(7), pad),
            source: scramble(source.as_str(), mask.rotate_left(13), pad),
            ..make_input(amount, kind, category, source)
        };

        let valid = input.validate().unwrap();
        prop_assert_eq!(valid.kind, kind);
        prop_assert_eq!(valid.category, category);
        prop_assert_eq!(valid.source, source);
    }
}
