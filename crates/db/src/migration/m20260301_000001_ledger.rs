//! Ledger schema migration.
//!
//! Creates the transactions table and the balances table holding one running
//! balance snapshot per transaction.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: TABLES
        // ============================================================
        db.execute_unprepared(TRANSACTIONS_SQL).await?;
        db.execute_unprepared(BALANCES_SQL).await?;

        // ============================================================
        // PART 3: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
-- Income adds to a balance, expense subtracts
CREATE TYPE transaction_type AS ENUM ('income', 'expense');

-- Funding source, one running balance each
CREATE TYPE funding_source AS ENUM ('bank', 'wallet');

-- Category vocabulary; the pairing with transaction_type is checked below
CREATE TYPE transaction_category AS ENUM (
    'salary',
    'business',
    'investment',
    'eating',
    'shopping',
    'entertainment',
    'travel',
    'groceries',
    'rent',
    'health',
    'gift',
    'fuel',
    'transport',
    'other'
);
";

const TRANSACTIONS_SQL: &str = r"
CREATE TABLE transactions (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    transaction_type transaction_type NOT NULL,
    category transaction_category NOT NULL,
    amount NUMERIC NOT NULL,
    occurred_at TIMESTAMPTZ NOT NULL,
    source funding_source NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_category_type CHECK (
        (transaction_type = 'income' AND category IN ('salary', 'business', 'investment'))
        OR (transaction_type = 'expense' AND category NOT IN ('salary', 'business', 'investment'))
    )
);

-- Window queries: one ledger, ledger order
CREATE INDEX idx_transactions_ledger ON transactions(user_id, source, occurred_at, id);

-- Listing: newest first per user
CREATE INDEX idx_transactions_user_date ON transactions(user_id, occurred_at DESC, id DESC);
";

const BALANCES_SQL: &str = r"
CREATE TABLE balances (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    source funding_source NOT NULL,
    transaction_id UUID NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
    amount NUMERIC(19, 2) NOT NULL,
    occurred_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_balances_transaction UNIQUE (transaction_id)
);

-- Seed lookup and window deletes: one ledger, ledger order
CREATE INDEX idx_balances_ledger ON balances(user_id, source, occurred_at, transaction_id);
";

const TRIGGERS_SQL: &str = r"
CREATE OR REPLACE FUNCTION set_transactions_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_transactions_updated_at
    BEFORE UPDATE ON transactions
    FOR EACH ROW
    EXECUTE FUNCTION set_transactions_updated_at();
";

const DROP_ALL_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_transactions_updated_at ON transactions;
DROP FUNCTION IF EXISTS set_transactions_updated_at();

DROP TABLE IF EXISTS balances CASCADE;
DROP TABLE IF EXISTS transactions CASCADE;

DROP TYPE IF EXISTS transaction_category;
DROP TYPE IF EXISTS funding_source;
DROP TYPE IF EXISTS transaction_type;
";
