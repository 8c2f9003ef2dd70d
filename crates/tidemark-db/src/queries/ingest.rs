//! Ingest cursor query functions.
//!
//! The cursor advances in the same transaction that records a batch's
//! volume and fees, so a batch is either fully counted and skipped forever
//! after, or not counted and rescanned. A dropped pass costs a rescan, never
//! a double count.

use rusqlite::Connection;
use tidemark_ingest::IngestBatch;
use tidemark_ledger::{fee_from_volume, LedgerState, RevenueSource};
use tidemark_types::UnixSecs;

use crate::{queries::ledger, Result};

/// Current ingest cursor row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorRow {
    /// Newest fully processed signature, if any.
    pub last_signature: Option<String>,
    /// When the last batch was recorded.
    pub last_processed_at: Option<UnixSecs>,
    /// Times the provider no longer knew our cursor (pruned history).
    pub history_gaps: u64,
    /// Row update timestamp.
    pub updated_at: UnixSecs,
}

/// Load the ingest cursor.
pub fn cursor(conn: &Connection) -> Result<CursorRow> {
    let row = conn.query_row(
        "SELECT last_signature, last_processed_at, history_gaps, updated_at
         FROM ingest_cursor WHERE id = 1",
        [],
        |row| {
            Ok(CursorRow {
                last_signature: row.get(0)?,
                last_processed_at: row.get::<_, Option<i64>>(1)?.map(|t| t as u64),
                history_gaps: row.get::<_, i64>(2)? as u64,
                updated_at: row.get::<_, i64>(3)? as u64,
            })
        },
    )?;
    Ok(row)
}

/// Record one ingest batch and advance the cursor, atomically.
///
/// Volume is observed and the trading fee credited to the pool in the same
/// transaction that moves `last_signature` to the batch head. A batch whose
/// walk fell off pruned history bumps `history_gaps`; a batch against an
/// empty chain clears the cursor so the next pass re-baselines from head.
///
/// Returns the ledger state after the batch, along with the fee credited.
pub fn advance_cursor(
    conn: &Connection,
    batch: &IngestBatch,
    fee_bps: u64,
    now: UnixSecs,
) -> Result<(LedgerState, u64)> {
    let tx = conn.unchecked_transaction()?;

    let mut state = ledger::load(&tx)?;
    let mut fee = 0;
    if batch.total_volume > 0 {
        state.observe_volume(batch.total_volume, now)?;
        fee = fee_from_volume(batch.total_volume, fee_bps)?;
        if fee > 0 {
            state.record_revenue(fee, RevenueSource::TradingFees, now)?;
        }
        ledger::store(&tx, &state)?;
    }

    let gap: i64 = i64::from(!batch.cursor_found);
    tx.execute(
        "UPDATE ingest_cursor SET
            last_signature = ?1,
            last_processed_at = ?2,
            history_gaps = history_gaps + ?3,
            updated_at = ?2
         WHERE id = 1",
        rusqlite::params![batch.new_cursor, now as i64, gap],
    )?;
    tx.commit()?;

    tracing::info!(
        swaps = batch.swaps.len(),
        volume = batch.total_volume,
        fee,
        pages = batch.pages_scanned,
        cursor_found = batch.cursor_found,
        "ingest batch recorded"
    );
    Ok((state, fee))
}
