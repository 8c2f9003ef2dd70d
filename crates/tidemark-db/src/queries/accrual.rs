//! Accrual book query functions.
//!
//! `apply_cycle` is the single write path for balance-time credit: snapshot
//! rows, credit accumulation, `last_balance` maintenance, and the
//! idempotence marker all land in one transaction. A crash mid-cycle leaves
//! the previous cycle's book intact and the marker unset, so the retry
//! re-applies cleanly.

use std::collections::BTreeMap;

use rusqlite::Connection;
use tidemark_accrual::{cycle, fold_cycle, AccrualRecord, CycleOutcome};
use tidemark_types::{Address, Credit, CycleIndex, HolderBalance, UnixSecs};

use crate::{DbError, Result};

/// Idempotence marker for cycle application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccrualState {
    /// Highest cycle index folded into the book, if any.
    pub last_applied_cycle: Option<CycleIndex>,
    /// Total cycles applied since install.
    pub cycles_applied: u64,
}

/// Parse a decimal TEXT credit column.
fn parse_credit(idx: usize, text: &str) -> rusqlite::Result<Credit> {
    text.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccrualRecord> {
    let credit_text: String = row.get(1)?;
    Ok(AccrualRecord {
        address: row.get(0)?,
        credit: parse_credit(1, &credit_text)?,
        last_balance: row.get::<_, i64>(2)? as u64,
        first_seen_at: row.get::<_, i64>(3)? as u64,
        last_updated_at: row.get::<_, i64>(4)? as u64,
    })
}

/// Load the idempotence marker.
pub fn state(conn: &Connection) -> Result<AccrualState> {
    let state = conn.query_row(
        "SELECT last_applied_cycle, cycles_applied FROM accrual_state WHERE id = 1",
        [],
        |row| {
            Ok(AccrualState {
                last_applied_cycle: row.get::<_, Option<i64>>(0)?.map(|c| c as u64),
                cycles_applied: row.get::<_, i64>(1)? as u64,
            })
        },
    )?;
    Ok(state)
}

/// Load the entire accrual book keyed by holder address.
pub fn all_records(conn: &Connection) -> Result<BTreeMap<Address, AccrualRecord>> {
    let mut stmt = conn.prepare(
        "SELECT address, credit, last_balance, first_seen_at, last_updated_at
         FROM accrual_records",
    )?;
    let rows = stmt.query_map([], record_from_row)?;

    let mut records = BTreeMap::new();
    for row in rows {
        let record = row?;
        records.insert(record.address.clone(), record);
    }
    Ok(records)
}

/// Look up one holder's accrual record.
pub fn get_record(conn: &Connection, address: &str) -> Result<AccrualRecord> {
    conn.query_row(
        "SELECT address, credit, last_balance, first_seen_at, last_updated_at
         FROM accrual_records WHERE address = ?1",
        [address],
        record_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            DbError::NotFound(format!("accrual record for '{address}'"))
        }
        other => DbError::Sqlite(other),
    })
}

/// Top holders by accrued credit.
pub fn top_by_credit(conn: &Connection, limit: u32) -> Result<Vec<AccrualRecord>> {
    // Credit is decimal TEXT without leading zeros, so longer strings are
    // strictly larger and equal-length strings compare numerically.
    let mut stmt = conn.prepare(
        "SELECT address, credit, last_balance, first_seen_at, last_updated_at
         FROM accrual_records
         ORDER BY length(credit) DESC, credit DESC, address ASC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], record_from_row)?;
    rows.map(|r| r.map_err(DbError::Sqlite)).collect()
}

/// Persist the full accrual book. Callers are expected to hold a transaction.
fn store_records(
    conn: &Connection,
    records: &BTreeMap<Address, AccrualRecord>,
) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO accrual_records
            (address, credit, last_balance, first_seen_at, last_updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for record in records.values() {
        stmt.execute(rusqlite::params![
            record.address,
            record.credit.to_string(),
            record.last_balance as i64,
            record.first_seen_at as i64,
            record.last_updated_at as i64,
        ])?;
    }
    Ok(())
}

/// Fold one cycle's balance snapshot into the book, exactly once.
///
/// A cycle index at or behind the marker is a recorded no-op; otherwise
/// snapshot rows, updated records, and the advanced marker commit together.
pub fn apply_cycle(
    conn: &Connection,
    cycle_index: CycleIndex,
    observed_at: UnixSecs,
    balances: &[HolderBalance],
) -> Result<CycleOutcome> {
    let tx = conn.unchecked_transaction()?;

    let marker = state(&tx)?;
    if cycle::is_replay(cycle_index, marker.last_applied_cycle) {
        let last_applied = marker.last_applied_cycle.unwrap_or(cycle_index);
        tracing::debug!(cycle = cycle_index, last_applied, "cycle replay skipped");
        return Ok(CycleOutcome::AlreadyApplied {
            cycle: cycle_index,
            last_applied,
        });
    }

    // Snapshot rows sum duplicate addresses the same way the fold does.
    {
        let mut stmt = tx.prepare(
            "INSERT INTO holder_snapshots (cycle, address, balance, observed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(cycle, address)
             DO UPDATE SET balance = balance + excluded.balance",
        )?;
        for holder in balances {
            stmt.execute(rusqlite::params![
                cycle_index as i64,
                holder.address,
                holder.balance as i64,
                observed_at as i64,
            ])?;
        }
    }

    let mut records = all_records(&tx)?;
    let stats = fold_cycle(&mut records, balances, observed_at)?;
    store_records(&tx, &records)?;

    tx.execute(
        "UPDATE accrual_state
         SET last_applied_cycle = ?1, cycles_applied = cycles_applied + 1
         WHERE id = 1",
        [cycle_index as i64],
    )?;
    tx.commit()?;

    tracing::info!(
        cycle = cycle_index,
        holders = stats.holders_seen,
        new = stats.new_holders,
        zeroed = stats.zeroed_holders,
        "accrual cycle applied"
    );
    Ok(CycleOutcome::Applied {
        cycle: cycle_index,
        stats,
    })
}

/// Drop snapshot rows older than the retention floor.
///
/// Accrual records are untouched; only the per-cycle audit rows go.
pub fn prune_snapshots(conn: &Connection, keep_from_cycle: CycleIndex) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM holder_snapshots WHERE cycle < ?1",
        [keep_from_cycle as i64],
    )?;
    if deleted > 0 {
        tracing::debug!(deleted, keep_from_cycle, "pruned holder snapshots");
    }
    Ok(deleted)
}

/// Read the snapshot rows recorded for one cycle.
pub fn cycle_snapshot(conn: &Connection, cycle_index: CycleIndex) -> Result<Vec<HolderBalance>> {
    let mut stmt = conn.prepare(
        "SELECT address, balance FROM holder_snapshots
         WHERE cycle = ?1 ORDER BY address ASC",
    )?;
    let rows = stmt.query_map([cycle_index as i64], |row| {
        Ok(HolderBalance {
            address: row.get(0)?,
            balance: row.get::<_, i64>(1)? as u64,
        })
    })?;
    rows.map(|r| r.map_err(DbError::Sqlite)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn holders(pairs: &[(&str, u64)]) -> Vec<HolderBalance> {
        pairs
            .iter()
            .map(|(a, b)| HolderBalance {
                address: (*a).to_string(),
                balance: *b,
            })
            .collect()
    }

    #[test]
    fn test_apply_cycle_creates_records() {
        let conn = test_db();
        let outcome = apply_cycle(&conn, 10, 6_000, &holders(&[("alice", 100), ("bob", 40)]))
            .expect("apply");

        assert!(matches!(outcome, CycleOutcome::Applied { cycle: 10, .. }));
        let alice = get_record(&conn, "alice").expect("alice");
        assert_eq!(alice.credit, 100);
        assert_eq!(alice.last_balance, 100);

        let marker = state(&conn).expect("state");
        assert_eq!(marker.last_applied_cycle, Some(10));
        assert_eq!(marker.cycles_applied, 1);
    }

    #[test]
    fn test_apply_cycle_accumulates_across_cycles() {
        let conn = test_db();
        apply_cycle(&conn, 10, 6_000, &holders(&[("alice", 100)])).expect("apply");
        apply_cycle(&conn, 11, 6_600, &holders(&[("alice", 250)])).expect("apply");

        let alice = get_record(&conn, "alice").expect("alice");
        assert_eq!(alice.credit, 350);
        assert_eq!(alice.last_balance, 250);
    }

    #[test]
    fn test_apply_cycle_replay_is_noop() {
        let conn = test_db();
        apply_cycle(&conn, 10, 6_000, &holders(&[("alice", 100)])).expect("apply");
        let outcome = apply_cycle(&conn, 10, 6_100, &holders(&[("alice", 9_999)]))
            .expect("replay call succeeds");

        assert_eq!(
            outcome,
            CycleOutcome::AlreadyApplied {
                cycle: 10,
                last_applied: 10
            }
        );
        let alice = get_record(&conn, "alice").expect("alice");
        assert_eq!(alice.credit, 100, "replay must not credit again");

        let marker = state(&conn).expect("state");
        assert_eq!(marker.cycles_applied, 1);
    }

    #[test]
    fn test_apply_cycle_older_index_is_noop() {
        let conn = test_db();
        apply_cycle(&conn, 10, 6_000, &holders(&[("alice", 100)])).expect("apply");
        let outcome =
            apply_cycle(&conn, 9, 5_400, &holders(&[("alice", 1)])).expect("older call");
        assert!(matches!(outcome, CycleOutcome::AlreadyApplied { .. }));
    }

    #[test]
    fn test_absent_holder_zeroed_but_keeps_credit() {
        let conn = test_db();
        apply_cycle(&conn, 10, 6_000, &holders(&[("alice", 100), ("bob", 50)])).expect("apply");
        apply_cycle(&conn, 11, 6_600, &holders(&[("alice", 100)])).expect("apply");

        let bob = get_record(&conn, "bob").expect("bob");
        assert_eq!(bob.credit, 50);
        assert_eq!(bob.last_balance, 0);
    }

    #[test]
    fn test_snapshot_rows_recorded_per_cycle() {
        let conn = test_db();
        apply_cycle(&conn, 10, 6_000, &holders(&[("alice", 100), ("bob", 40)])).expect("apply");

        let rows = cycle_snapshot(&conn, 10).expect("snapshot");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].address, "alice");
        assert_eq!(rows[0].balance, 100);
    }

    #[test]
    fn test_snapshot_sums_duplicate_addresses() {
        let conn = test_db();
        apply_cycle(&conn, 10, 6_000, &holders(&[("alice", 60), ("alice", 40)])).expect("apply");

        let rows = cycle_snapshot(&conn, 10).expect("snapshot");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].balance, 100);

        let alice = get_record(&conn, "alice").expect("alice");
        assert_eq!(alice.credit, 100);
    }

    #[test]
    fn test_prune_snapshots_keeps_recent_cycles() {
        let conn = test_db();
        for cycle in 10..15 {
            apply_cycle(&conn, cycle, cycle * 600, &holders(&[("alice", 10)])).expect("apply");
        }

        let deleted = prune_snapshots(&conn, 13).expect("prune");
        assert_eq!(deleted, 3);
        assert!(cycle_snapshot(&conn, 12).expect("old cycle").is_empty());
        assert_eq!(cycle_snapshot(&conn, 13).expect("kept cycle").len(), 1);

        // Accrual book unaffected
        let alice = get_record(&conn, "alice").expect("alice");
        assert_eq!(alice.credit, 50);
    }

    #[test]
    fn test_top_by_credit_orders_numerically() {
        let conn = test_db();
        // "9" sorts after "1000" lexically; length-aware ordering must not.
        apply_cycle(&conn, 10, 6_000, &holders(&[("small", 9), ("large", 1_000)]))
            .expect("apply");

        let top = top_by_credit(&conn, 10).expect("top");
        assert_eq!(top[0].address, "large");
        assert_eq!(top[1].address, "small");
    }

    #[test]
    fn test_top_by_credit_limit() {
        let conn = test_db();
        apply_cycle(
            &conn,
            10,
            6_000,
            &holders(&[("a", 3), ("b", 2), ("c", 1)]),
        )
        .expect("apply");

        let top = top_by_credit(&conn, 2).expect("top");
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].address, "a");
    }

    #[test]
    fn test_get_record_not_found() {
        let conn = test_db();
        let err = get_record(&conn, "nobody").expect_err("missing holder");
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn test_credit_round_trips_beyond_u64() {
        let conn = test_db();
        let big = u128::from(u64::MAX) + 42;
        let mut records = BTreeMap::new();
        let mut record = AccrualRecord::new("whale".to_string(), 100);
        record.credit = big;
        records.insert("whale".to_string(), record);
        store_records(&conn, &records).expect("store");

        let whale = get_record(&conn, "whale").expect("whale");
        assert_eq!(whale.credit, big);
    }
}
