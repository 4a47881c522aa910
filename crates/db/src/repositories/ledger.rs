//! PostgreSQL implementation of the ledger store.
//!
//! Each unit of work is one database transaction at READ COMMITTED. Writers on a
//! ledger are serialized with a transaction-scoped advisory lock keyed on the
//! (user, source) pair, taken before the window is read, so every read after the
//! lock sees the latest committed state plus this unit's own writes.

use chrono::{DateTime, Utc};
use ledgerline_core::ledger::{
    BalanceSnapshot, LedgerKey, LedgerStore, LedgerUnit, PurgeSummary, Source, StoreError,
    Transaction,
};
use ledgerline_shared::types::{SnapshotId, TransactionId, UserId};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr,
    Statement, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::entities::sea_orm_active_enums::FundingSource;
use crate::entities::{balances, transactions};

/// Ledger store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct SeaOrmLedgerStore {
    db: DatabaseConnection,
}

impl SeaOrmLedgerStore {
    /// Creates a new store over a connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl LedgerStore for SeaOrmLedgerStore {
    type Unit = SeaOrmLedgerUnit;

    async fn begin(&self) -> Result<Self::Unit, StoreError> {
        let txn = self.db.begin().await.map_err(store_error)?;
        Ok(SeaOrmLedgerUnit { txn })
    }
}

/// Unit of work wrapping one database transaction.
///
/// Dropping it without commit rolls the transaction back.
pub struct SeaOrmLedgerUnit {
    txn: DatabaseTransaction,
}

impl std::fmt::Debug for SeaOrmLedgerUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeaOrmLedgerUnit").finish_non_exhaustive()
    }
}

impl LedgerUnit for SeaOrmLedgerUnit {
    async fn lock_ledger(&mut self, key: LedgerKey) -> Result<(), StoreError> {
        let lock_id = ledger_lock_id(key);
        self.txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT pg_advisory_xact_lock($1)",
                [lock_id.into()],
            ))
            .await
            .map_err(store_error)?;
        debug!(user_id = %key.user_id, source = %key.source, lock_id, "Ledger lock acquired");
        Ok(())
    }

    async fn find_transaction(
        &mut self,
        user_id: UserId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let model = transactions::Entity::find_by_id(id.0)
            .filter(transactions::Column::UserId.eq(user_id.0))
            .one(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(model.map(transaction_from_model))
    }

    async fn list_transactions(&mut self, user_id: UserId) -> Result<Vec<Transaction>, StoreError> {
        let models = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id.0))
            .order_by_desc(transactions::Column::OccurredAt)
            .order_by_desc(transactions::Column::Id)
            .all(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(models.into_iter().map(transaction_from_model).collect())
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), StoreError> {
        transactions::Entity::insert(transaction_active_model(transaction))
            .exec_without_returning(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn update_transaction(&mut self, transaction: &Transaction) -> Result<bool, StoreError> {
        let result = transactions::Entity::update_many()
            .set(transactions::ActiveModel {
                transaction_type: Set(transaction.kind.into()),
                category: Set(transaction.category.into()),
                amount: Set(transaction.amount),
                occurred_at: Set(transaction.date.into()),
                source: Set(transaction.source.into()),
                ..Default::default()
            })
            .filter(transactions::Column::Id.eq(transaction.id.0))
            .filter(transactions::Column::UserId.eq(transaction.user_id.0))
            .exec(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected == 1)
    }

    async fn delete_transaction(
        &mut self,
        user_id: UserId,
        id: TransactionId,
    ) -> Result<bool, StoreError> {
        let result = transactions::Entity::delete_many()
            .filter(transactions::Column::Id.eq(id.0))
            .filter(transactions::Column::UserId.eq(user_id.0))
            .exec(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected == 1)
    }

    async fn transactions_from(
        &mut self,
        key: LedgerKey,
        from: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let models = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(key.user_id.0))
            .filter(transactions::Column::Source.eq(FundingSource::from(key.source)))
            .filter(transactions::Column::OccurredAt.gte(from))
            .order_by_asc(transactions::Column::OccurredAt)
            .order_by_asc(transactions::Column::Id)
            .all(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(models.into_iter().map(transaction_from_model).collect())
    }

    async fn latest_snapshot_before(
        &mut self,
        key: LedgerKey,
        before: DateTime<Utc>,
    ) -> Result<Option<BalanceSnapshot>, StoreError> {
        let model = ledger_snapshots(key)
            .filter(balances::Column::OccurredAt.lt(before))
            .order_by_desc(balances::Column::OccurredAt)
            .order_by_desc(balances::Column::TransactionId)
            .one(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(model.map(snapshot_from_model))
    }

    async fn latest_snapshot(&mut self, key: LedgerKey) -> Result<Option<BalanceSnapshot>, StoreError> {
        let model = ledger_snapshots(key)
            .order_by_desc(balances::Column::OccurredAt)
            .order_by_desc(balances::Column::TransactionId)
            .one(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(model.map(snapshot_from_model))
    }

    async fn snapshots(&mut self, key: LedgerKey) -> Result<Vec<BalanceSnapshot>, StoreError> {
        let models = ledger_snapshots(key)
            .order_by_asc(balances::Column::OccurredAt)
            .order_by_asc(balances::Column::TransactionId)
            .all(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(models.into_iter().map(snapshot_from_model).collect())
    }

    async fn count_snapshots_from(
        &mut self,
        key: LedgerKey,
        from: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        ledger_snapshots(key)
            .filter(balances::Column::OccurredAt.gte(from))
            .count(&self.txn)
            .await
            .map_err(store_error)
    }

    async fn delete_snapshots_from(
        &mut self,
        key: LedgerKey,
        from: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = balances::Entity::delete_many()
            .filter(balances::Column::UserId.eq(key.user_id.0))
            .filter(balances::Column::Source.eq(FundingSource::from(key.source)))
            .filter(balances::Column::OccurredAt.gte(from))
            .exec(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected)
    }

    async fn delete_snapshots_for(
        &mut self,
        user_id: UserId,
        transaction_ids: &[TransactionId],
    ) -> Result<u64, StoreError> {
        if transaction_ids.is_empty() {
            return Ok(0);
        }
        let result = balances::Entity::delete_many()
            .filter(balances::Column::UserId.eq(user_id.0))
            .filter(balances::Column::TransactionId.is_in(transaction_ids.iter().map(|id| id.0)))
            .exec(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected)
    }

    async fn insert_snapshot(&mut self, snapshot: &BalanceSnapshot) -> Result<(), StoreError> {
        balances::Entity::insert(snapshot_active_model(snapshot))
            .exec_without_returning(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn ledger_users(&mut self) -> Result<Vec<UserId>, StoreError> {
        let users: Vec<Uuid> = transactions::Entity::find()
            .select_only()
            .column(transactions::Column::UserId)
            .distinct()
            .order_by_asc(transactions::Column::UserId)
            .into_tuple()
            .all(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(users.into_iter().map(UserId::from_uuid).collect())
    }

    async fn purge_user(&mut self, user_id: UserId) -> Result<PurgeSummary, StoreError> {
        let snapshots = balances::Entity::delete_many()
            .filter(balances::Column::UserId.eq(user_id.0))
            .exec(&self.txn)
            .await
            .map_err(store_error)?;
        let transactions = transactions::Entity::delete_many()
            .filter(transactions::Column::UserId.eq(user_id.0))
            .exec(&self.txn)
            .await
            .map_err(store_error)?;
        Ok(PurgeSummary {
            transactions: transactions.rows_affected,
            snapshots: snapshots.rows_affected,
        })
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().await.map_err(store_error)
    }
}

fn ledger_snapshots(key: LedgerKey) -> sea_orm::Select<balances::Entity> {
    balances::Entity::find()
        .filter(balances::Column::UserId.eq(key.user_id.0))
        .filter(balances::Column::Source.eq(FundingSource::from(key.source)))
}

/// Stable advisory lock id for a ledger: the user id folded to 63 bits, with
/// the source in the lowest bit.
pub fn ledger_lock_id(key: LedgerKey) -> i64 {
    let bits = key.user_id.0.as_u128();
    let high = u64::try_from(bits >> 64).unwrap_or_default();
    let low = u64::try_from(bits & u128::from(u64::MAX)).unwrap_or_default();
    let tag = match key.source {
        Source::Bank => 0,
        Source::Wallet => 1,
    };
    let mixed = ((high ^ low) << 1) | tag;
    i64::from_be_bytes(mixed.to_be_bytes())
}

/// Maps a database error onto the store error taxonomy.
pub fn store_error(err: DbErr) -> StoreError {
    if matches!(
        err.sql_err(),
        Some(SqlErr::UniqueConstraintViolation(_))
    ) {
        return StoreError::Conflict(err.to_string());
    }

    match &err {
        DbErr::Type(_) | DbErr::Json(_) | DbErr::TryIntoErr { .. } => {
            StoreError::Corrupt(err.to_string())
        }
        _ if is_serialization_failure(&err) => StoreError::Conflict(err.to_string()),
        _ if is_numeric_out_of_range(&err) => StoreError::OutOfRange(err.to_string()),
        _ => StoreError::Unavailable(err.to_string()),
    }
}

/// PostgreSQL `serialization_failure` (40001) and `deadlock_detected` (40P01).
fn is_serialization_failure(err: &DbErr) -> bool {
    let message = err.to_string();
    message.contains("40001")
        || message.contains("40P01")
        || message.contains("could not serialize access")
        || message.contains("deadlock detected")
}

/// PostgreSQL `numeric_value_out_of_range` (22003).
fn is_numeric_out_of_range(err: &DbErr) -> bool {
    let message = err.to_string();
    message.contains("22003")
        || message.contains("numeric field overflow")
        || message.contains("out of range for type numeric")
}

fn transaction_from_model(model: transactions::Model) -> Transaction {
    Transaction {
        id: TransactionId::from_uuid(model.id),
        user_id: UserId::from_uuid(model.user_id),
        kind: model.transaction_type.into(),
        category: model.category.into(),
        amount: model.amount,
        date: model.occurred_at.with_timezone(&Utc),
        source: model.source.into(),
    }
}

fn transaction_active_model(transaction: &Transaction) -> transactions::ActiveModel {
    transactions::ActiveModel {
        id: Set(transaction.id.0),
        user_id: Set(transaction.user_id.0),
        transaction_type: Set(transaction.kind.into()),
        category: Set(transaction.category.into()),
        amount: Set(transaction.amount),
        occurred_at: Set(transaction.date.into()),
        source: Set(transaction.source.into()),
        ..Default::default()
    }
}

fn snapshot_from_model(model: balances::Model) -> BalanceSnapshot {
    BalanceSnapshot {
        id: SnapshotId::from_uuid(model.id),
        user_id: UserId::from_uuid(model.user_id),
        source: model.source.into(),
        transaction_id: TransactionId::from_uuid(model.transaction_id),
        amount: model.amount,
        date: model.occurred_at.with_timezone(&Utc),
    }
}

fn snapshot_active_model(snapshot: &BalanceSnapshot) -> balances::ActiveModel {
    balances::ActiveModel {
        id: Set(snapshot.id.0),
        user_id: Set(snapshot.user_id.0),
        source: Set(snapshot.source.into()),
        transaction_id: Set(snapshot.transaction_id.0),
        amount: Set(snapshot.amount),
        occurred_at: Set(snapshot.date.into()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ledgerline_core::ledger::{Category, LedgerError, TransactionKind};
    use rust_decimal_macros::dec;

    fn sample_transaction() -> Transaction {
        Transaction {
            id: TransactionId::new(),
            user_id: UserId::new(),
            kind: TransactionKind::Expense,
            category: Category::Fuel,
            amount: dec!(42.125),
            date: Utc.with_ymd_and_hms(2025, 4, 2, 18, 45, 0).unwrap(),
            source: Source::Wallet,
        }
    }

    #[test]
    fn test_transaction_model_mapping() {
        let tx = sample_transaction();
        let active = transaction_active_model(&tx);
        let now = Utc::now().into();

        let model = transactions::Model {
            id: active.id.unwrap(),
            user_id: active.user_id.unwrap(),
            transaction_type: active.transaction_type.unwrap(),
            category: active.category.unwrap(),
            amount: active.amount.unwrap(),
            occurred_at: active.occurred_at.unwrap(),
            source: active.source.unwrap(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(transaction_from_model(model), tx);
    }

    #[test]
    fn test_snapshot_model_mapping() {
        let snapshot = BalanceSnapshot {
            id: SnapshotId::new(),
            user_id: UserId::new(),
            source: Source::Bank,
            transaction_id: TransactionId::new(),
            amount: dec!(-17.50),
            date: Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap(),
        };
        let active = snapshot_active_model(&snapshot);

        let model = balances::Model {
            id: active.id.unwrap(),
            user_id: active.user_id.unwrap(),
            source: active.source.unwrap(),
            transaction_id: active.transaction_id.unwrap(),
            amount: active.amount.unwrap(),
            occurred_at: active.occurred_at.unwrap(),
            created_at: Utc::now().into(),
        };
        assert_eq!(snapshot_from_model(model), snapshot);
    }

    #[test]
    fn test_ledger_lock_id_is_stable_and_source_specific() {
        let user_id = UserId::from_uuid(Uuid::from_u128(0x0123_4567_89ab_cdef_0011_2233_4455_6677));
        let bank = ledger_lock_id(LedgerKey::new(user_id, Source::Bank));
        let wallet = ledger_lock_id(LedgerKey::new(user_id, Source::Wallet));

        assert_eq!(bank, ledger_lock_id(LedgerKey::new(user_id, Source::Bank)));
        assert_ne!(bank, wallet);
        assert_eq!(bank ^ wallet, 1);
    }

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            store_error(DbErr::Type("bad numeric".into())),
            StoreError::Corrupt(_)
        ));
        assert!(matches!(
            store_error(DbErr::Custom(
                "could not serialize access due to concurrent update".into()
            )),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            store_error(DbErr::Custom("connection reset".into())),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn test_numeric_overflow_is_not_transient() {
        let err = store_error(DbErr::Custom(
            "error returned from database: numeric field overflow".into(),
        ));
        assert!(matches!(err, StoreError::OutOfRange(_)));
        assert!(!LedgerError::from(err).is_retryable());
        assert!(matches!(
            store_error(DbErr::Custom("SQLSTATE 22003".into())),
            StoreError::OutOfRange(_)
        ));
    }
}
