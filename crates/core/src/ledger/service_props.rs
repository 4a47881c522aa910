//! Property-based tests for TransactionService.
//!
//! - Property 1: Ledger equals a from-scratch replay after every write
//! - Property 2: Backdated inserts shift every later snapshot by their amount
//! - Property 3: Moving a transaction between sources keeps the net balance

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ledgerline_shared::LedgerConfig;
use ledgerline_shared::types::UserId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::memory::InMemoryLedgerStore;
use super::service::TransactionService;
use super::transaction::{Transaction, sort_ledger_order};
use super::types::Source;
use super::validation::TransactionInput;

/// One write against the service. Indices pick among existing transactions.
#[derive(Debug, Clone)]
enum Op {
    Add(Draft),
    Update(usize, Draft),
    Delete(usize),
}

#[derive(Debug, Clone)]
struct Draft {
    cents: i64,
    income: bool,
    bank: bool,
    hour: i64,
}

impl Draft {
    fn input(&self) -> TransactionInput {
        let (kind, category) = if self.income {
            ("income", "salary")
        } else {
            ("expense", "groceries")
        };
        TransactionInput {
            date: at(self.hour),
            amount: Decimal::new(self.cents, 2),
            kind: kind.to_string(),
            category: category.to_string(),
            source: if self.bank { "bank" } else { "wallet" }.to_string(),
        }
    }
}

fn at(hour: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
}

/// Strategy to generate a transaction draft. Hours collide often on purpose.
fn draft_strategy() -> impl Strategy<Value = Draft> {
    (1i64..100_000i64, any::<bool>(), any::<bool>(), 0i64..12i64).prop_map(
        |(cents, income, bank, hour)| Draft {
            cents,
            income,
            bank,
            hour,
        },
    )
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => draft_strategy().prop_map(Op::Add),
        2 => (any::<usize>(), draft_strategy()).prop_map(|(i, d)| Op::Update(i, d)),
        1 => any::<usize>().prop_map(Op::Delete),
    ]
}

fn service() -> TransactionService<InMemoryLedgerStore> {
    TransactionService::new(
        Arc::new(InMemoryLedgerStore::new()),
        LedgerConfig::default(),
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

/// Ground truth: prefix sums of the surviving transactions of one source.
fn expected_ledger(transactions: &[Transaction], source: Source) -> Vec<Decimal> {
    let mut of_source: Vec<Transaction> = transactions
        .iter()
        .filter(|t| t.source == source)
        .cloned()
        .collect();
    sort_ledger_order(&mut of_source);

    let mut running = Decimal::ZERO;
    of_source
        .iter()
        .map(|t| {
            running += t.signed_amount();
            running
        })
        .collect()
}

async fn stored_ledger(
    service: &TransactionService<InMemoryLedgerStore>,
    user_id: UserId,
    source: Source,
) -> Vec<Decimal> {
    service
        .ledger(user_id, source)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.amount)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property 1: *For any* sequence of adds, updates and deletes, both ledgers
    /// SHALL equal a from-scratch replay of the surviving transactions.
    #[test]
    fn prop_ledger_matches_replay_after_every_write(
        ops in prop::collection::vec(op_strategy(), 1..25),
    ) {
        runtime().block_on(async {
            let service = service();
            let user_id = UserId::new();
            let mut live: Vec<Transaction> = Vec::new();

            for op in &ops {
                match op {
                    Op::Add(draft) => {
                        live.push(service.add(user_id, &draft.input()).await.unwrap());
                    }
                    Op::Update(i, draft) if !live.is_empty() => {
                        let slot = i % live.len();
                        live[slot] = service
                            .update(user_id, live[slot].id, &draft.input())
                            .await
                            .unwrap();
                    }
                    Op::Delete(i) if !live.is_empty() => {
                        let removed = live.remove(i % live.len());
                        service.delete(user_id, removed.id).await.unwrap();
                    }
                    Op::Update(..) | Op::Delete(_) => {}
                }

                for source in Source::ALL {
                    prop_assert_eq!(
                        stored_ledger(&service, user_id, source).await,
                        expected_ledger(&live, source)
                    );
                }
            }

            for source in Source::ALL {
                prop_assert_eq!(
                    service.verify(user_id, source).await.unwrap(),
                    expected_ledger(&live, source).len()
                );
            }
            Ok(())
        })?;
    }

    /// Property 2: *For any* ledger, inserting a transaction before existing ones
    /// SHALL shift each later snapshot by its signed amount and leave earlier
    /// snapshots unchanged.
    #[test]
    fn prop_backdated_insert_shifts_later_snapshots(
        drafts in prop::collection::vec(draft_strategy(), 1..10),
        inserted in draft_strategy(),
    ) {
        runtime().block_on(async {
            let service = service();
            let user_id = UserId::new();

            for draft in &drafts {
                let draft = Draft { bank: true, hour: draft.hour * 2 + 1, ..draft.clone() };
                service.add(user_id, &draft.input()).await.unwrap();
            }
            let before = service.ledger(user_id, Source::Bank).await.unwrap();

            let inserted = Draft { bank: true, hour: inserted.hour * 2, ..inserted };
            let added = service.add(user_id, &inserted.input()).await.unwrap();
            let after = service.ledger(user_id, Source::Bank).await.unwrap();

            prop_assert_eq!(after.len(), before.len() + 1);
            let mut shifted = after.iter().filter(|s| s.transaction_id != added.id);
            for old in &before {
                let new = shifted.next().unwrap();
                prop_assert_eq!(new.transaction_id, old.transaction_id);
                if old.date > added.date {
                    prop_assert_eq!(new.amount, old.amount + added.signed_amount());
                } else {
                    prop_assert_eq!(new.amount, old.amount);
                }
            }
            Ok(())
        })?;
    }

    /// Property 3: *For any* ledgers, moving one transaction to the other source
    /// SHALL leave the combined closing balance unchanged.
    #[test]
    fn prop_source_move_preserves_net_balance(
        drafts in prop::collection::vec(draft_strategy(), 1..10),
        pick in any::<usize>(),
    ) {
        runtime().block_on(async {
            let service = service();
            let user_id = UserId::new();

            let mut live = Vec::new();
            for draft in &drafts {
                live.push(service.add(user_id, &draft.input()).await.unwrap());
            }
            let total_before = service.balances(user_id).await.unwrap().total();

            let moved = &live[pick % live.len()];
            let input = TransactionInput {
                date: moved.date,
                amount: moved.amount,
                kind: moved.kind.as_str().to_string(),
                category: moved.category.as_str().to_string(),
                source: match moved.source {
                    Source::Bank => "wallet",
                    Source::Wallet => "bank",
                }
                .to_string(),
            };
            let updated = service.update(user_id, moved.id, &input).await.unwrap();
            prop_assert_ne!(updated.source, moved.source);

            let balances = service.balances(user_id).await.unwrap();
            prop_assert_eq!(balances.total(), total_before);
            for source in Source::ALL {
                service.verify(user_id, source).await.unwrap();
            }
            Ok(())
        })?;
    }
}
