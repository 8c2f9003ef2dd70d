//! SQL schema definitions.

/// Complete schema for the tidemark v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Snapshots & Accrual
-- ============================================================

CREATE TABLE IF NOT EXISTS holder_snapshots (
    cycle INTEGER NOT NULL,
    address TEXT NOT NULL,
    balance INTEGER NOT NULL,
    observed_at INTEGER NOT NULL,
    PRIMARY KEY (cycle, address)
);

CREATE INDEX IF NOT EXISTS idx_snapshots_cycle ON holder_snapshots(cycle);

CREATE TABLE IF NOT EXISTS accrual_records (
    address TEXT PRIMARY KEY,
    credit TEXT NOT NULL DEFAULT '0',
    last_balance INTEGER NOT NULL DEFAULT 0,
    first_seen_at INTEGER NOT NULL,
    last_updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS accrual_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_applied_cycle INTEGER,
    cycles_applied INTEGER NOT NULL DEFAULT 0
);

-- ============================================================
-- Ingestion & Ledger
-- ============================================================

CREATE TABLE IF NOT EXISTS ingest_cursor (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_signature TEXT,
    last_processed_at INTEGER,
    history_gaps INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS ledger_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    pool_lamports INTEGER NOT NULL DEFAULT 0,
    cumulative_distributed INTEGER NOT NULL DEFAULT 0,
    cumulative_volume INTEGER NOT NULL DEFAULT 0,
    cumulative_trading_fees INTEGER NOT NULL DEFAULT 0,
    cumulative_reported_fees INTEGER NOT NULL DEFAULT 0,
    volume_baseline INTEGER NOT NULL DEFAULT 0,
    reported_baseline INTEGER NOT NULL DEFAULT 0,
    last_reset_at INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL DEFAULT 0
);

-- ============================================================
-- Payout Plans
-- ============================================================

CREATE TABLE IF NOT EXISTS payout_plans (
    distribution_id TEXT PRIMARY KEY,
    generated_at INTEGER NOT NULL,
    pool_lamports INTEGER NOT NULL,
    price_micro_usd INTEGER NOT NULL,
    price_as_of INTEGER NOT NULL,
    total_credit TEXT NOT NULL,
    total_converted_micro_usd INTEGER NOT NULL,
    total_paid_lamports INTEGER NOT NULL,
    remainder_lamports INTEGER NOT NULL,
    executed_at INTEGER
);

CREATE TABLE IF NOT EXISTS payout_entries (
    distribution_id TEXT NOT NULL REFERENCES payout_plans(distribution_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    address TEXT NOT NULL,
    credit TEXT NOT NULL,
    share_ppm INTEGER NOT NULL,
    amount_lamports INTEGER NOT NULL,
    amount_micro_usd INTEGER NOT NULL,
    PRIMARY KEY (distribution_id, position)
);

CREATE INDEX IF NOT EXISTS idx_entries_address ON payout_entries(address);

-- ============================================================
-- Settings
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
