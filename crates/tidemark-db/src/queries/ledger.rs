//! Revenue ledger query functions.
//!
//! The ledger is a singleton row; all mutations go through
//! [`tidemark_ledger::LedgerState`] so the checked-arithmetic rules live in
//! exactly one place. Multi-step operations (ingest batches, distribution
//! commits) load and store it inside their own transactions via
//! [`load`] / [`store`].

use rusqlite::Connection;
use tidemark_ledger::{LedgerState, RevenueSource};
use tidemark_types::{Lamports, UnixSecs};

use crate::Result;

/// Load the current ledger state.
pub fn load(conn: &Connection) -> Result<LedgerState> {
    let state = conn.query_row(
        "SELECT pool_lamports, cumulative_distributed, cumulative_volume,
                cumulative_trading_fees, cumulative_reported_fees,
                volume_baseline, reported_baseline, last_reset_at, updated_at
         FROM ledger_state WHERE id = 1",
        [],
        |row| {
            Ok(LedgerState {
                pool_lamports: row.get::<_, i64>(0)? as u64,
                cumulative_distributed: row.get::<_, i64>(1)? as u64,
                cumulative_volume: row.get::<_, i64>(2)? as u64,
                cumulative_trading_fees: row.get::<_, i64>(3)? as u64,
                cumulative_reported_fees: row.get::<_, i64>(4)? as u64,
                volume_baseline: row.get::<_, i64>(5)? as u64,
                reported_baseline: row.get::<_, i64>(6)? as u64,
                last_reset_at: row.get::<_, i64>(7)? as u64,
                updated_at: row.get::<_, i64>(8)? as u64,
            })
        },
    )?;
    Ok(state)
}

/// Persist the ledger state. Callers are expected to hold a transaction.
pub(crate) fn store(conn: &Connection, state: &LedgerState) -> Result<()> {
    conn.execute(
        "UPDATE ledger_state SET
            pool_lamports = ?1,
            cumulative_distributed = ?2,
            cumulative_volume = ?3,
            cumulative_trading_fees = ?4,
            cumulative_reported_fees = ?5,
            volume_baseline = ?6,
            reported_baseline = ?7,
            last_reset_at = ?8,
            updated_at = ?9
         WHERE id = 1",
        rusqlite::params![
            state.pool_lamports as i64,
            state.cumulative_distributed as i64,
            state.cumulative_volume as i64,
            state.cumulative_trading_fees as i64,
            state.cumulative_reported_fees as i64,
            state.volume_baseline as i64,
            state.reported_baseline as i64,
            state.last_reset_at as i64,
            state.updated_at as i64,
        ],
    )?;
    Ok(())
}

/// Credit revenue to the pool and return the updated ledger.
///
/// Used directly for operator-reported fees; trading fees from swap volume
/// arrive through `ingest::advance_cursor` instead, inside the same
/// transaction that advances the cursor.
pub fn record_revenue(
    conn: &Connection,
    amount: Lamports,
    source: RevenueSource,
    now: UnixSecs,
) -> Result<LedgerState> {
    let tx = conn.unchecked_transaction()?;
    let mut state = load(&tx)?;
    state.record_revenue(amount, source, now)?;
    store(&tx, &state)?;
    tx.commit()?;

    tracing::info!(amount, ?source, pool = state.pool_lamports, "revenue recorded");
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_fresh_ledger_is_zeroed() {
        let conn = test_db();
        let state = load(&conn).expect("load");
        assert_eq!(state.pool_lamports, 0);
        assert_eq!(state.cumulative_volume, 0);
        assert_eq!(state.cumulative_distributed, 0);
    }

    #[test]
    fn test_record_revenue_persists() {
        let conn = test_db();
        record_revenue(&conn, 5_000, RevenueSource::TradingFees, 100).expect("record");
        record_revenue(&conn, 2_000, RevenueSource::ReportedFees, 110).expect("record");

        let state = load(&conn).expect("load");
        assert_eq!(state.pool_lamports, 7_000);
        assert_eq!(state.cumulative_trading_fees, 5_000);
        assert_eq!(state.cumulative_reported_fees, 2_000);
        assert_eq!(state.updated_at, 110);
    }

    #[test]
    fn test_record_revenue_rejects_zero() {
        let conn = test_db();
        let err = record_revenue(&conn, 0, RevenueSource::ReportedFees, 100)
            .expect_err("zero amount must be rejected");
        assert!(matches!(err, crate::DbError::Ledger(_)));

        // Rejected call leaves the row untouched
        let state = load(&conn).expect("load");
        assert_eq!(state.pool_lamports, 0);
        assert_eq!(state.updated_at, 0);
    }

    #[test]
    fn test_store_round_trip() {
        let conn = test_db();
        let mut state = load(&conn).expect("load");
        state.record_revenue(42, RevenueSource::TradingFees, 7).expect("credit");
        store(&conn, &state).expect("store");

        let reloaded = load(&conn).expect("reload");
        assert_eq!(reloaded, state);
    }
}
