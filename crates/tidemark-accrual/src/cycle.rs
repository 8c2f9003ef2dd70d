//! Accrual cycle arithmetic.
//!
//! A cycle is a fixed-width window of unix time: cycle `N` covers
//! `[N * cycle_secs, (N + 1) * cycle_secs)`. The cycle index is the
//! idempotence key for credit accrual: each index is applied at most once,
//! no matter how often the snapshot task fires within the window.

use tidemark_types::{CycleIndex, UnixSecs};

/// Compute the cycle index containing `now_secs`.
///
/// A `cycle_secs` of zero is treated as one second so the division is
/// always defined.
pub fn cycle_index(now_secs: UnixSecs, cycle_secs: u64) -> CycleIndex {
    now_secs / cycle_secs.max(1)
}

/// Get the cycle index for the current wall clock.
pub fn current_cycle(cycle_secs: u64) -> CycleIndex {
    cycle_index(tidemark_types::now_secs(), cycle_secs)
}

/// Get the unix timestamp at which `cycle` begins.
pub fn cycle_start(cycle: CycleIndex, cycle_secs: u64) -> UnixSecs {
    cycle.saturating_mul(cycle_secs.max(1))
}

/// Get seconds until the next cycle boundary.
pub fn seconds_until_next_cycle(cycle_secs: u64) -> u64 {
    let secs = cycle_secs.max(1);
    let now = tidemark_types::now_secs();
    secs - (now % secs)
}

/// Oldest cycle index to retain, given a retention window in cycles.
///
/// Snapshots for cycles strictly below the floor may be pruned.
pub fn retention_floor(current: CycleIndex, retention_cycles: u64) -> CycleIndex {
    current.saturating_sub(retention_cycles)
}

/// Whether applying `cycle` would repeat work already folded in.
///
/// Accrual only ever moves forward: any cycle at or below the last applied
/// index is a replay and must be skipped.
pub fn is_replay(cycle: CycleIndex, last_applied: Option<CycleIndex>) -> bool {
    match last_applied {
        Some(last) => cycle <= last,
        None => false,
    }
}
