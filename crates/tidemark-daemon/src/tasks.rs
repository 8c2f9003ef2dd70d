//! Periodic task loops and their single-flight guards.
//!
//! Each task (ingest, snapshot, oracle refresh) runs on its own schedule and
//! owns its slice of state; manual RPC triggers go through the same pass
//! functions behind the same guards, so a scheduled run and an operator run
//! can never overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tidemark_accrual::{cycle, CycleOutcome};
use tidemark_db::queries;
use tidemark_types::now_secs;
use tracing::{debug, info, warn};

use crate::events::Event;
use crate::DaemonState;

/// Single-flight guard for one task.
pub struct TaskGuard {
    running: AtomicBool,
}

impl TaskGuard {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }

    /// Try to claim the task. `None` means a pass is already running.
    pub fn try_acquire(&self) -> Option<TaskPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TaskPermit { guard: self })
    }

    /// Whether a pass currently holds the guard.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Default for TaskGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the duration of one pass; releases the guard on drop.
pub struct TaskPermit<'a> {
    guard: &'a TaskGuard,
}

impl Drop for TaskPermit<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}

/// Guards for every task the daemon runs.
#[derive(Default)]
pub struct TaskGuards {
    pub ingest: TaskGuard,
    pub snapshot: TaskGuard,
    pub distribution: TaskGuard,
}

/// Result of one ingest pass.
#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub swaps: usize,
    pub volume_lamports: u64,
    pub fee_lamports: u64,
    pub pages_scanned: u32,
    pub cursor_found: bool,
    pub pool_lamports: u64,
}

/// Result of one snapshot pass.
#[derive(Debug, Serialize)]
pub struct SnapshotSummary {
    pub cycle: u64,
    pub applied: bool,
    pub holders_seen: u64,
    pub new_holders: u64,
    pub zeroed_holders: u64,
    pub snapshots_pruned: usize,
}

/// Run one ingest pass: scan from the cursor, then record the batch and
/// advance the cursor in one transaction.
///
/// The database lock is held only around the cursor read and the final
/// write, never across network calls.
pub async fn ingest_pass(state: &DaemonState) -> anyhow::Result<IngestSummary> {
    let cursor_row = {
        let db = state.db.lock().await;
        queries::ingest::cursor(&db)?
    };

    let batch = state
        .ingestor
        .fetch_new(cursor_row.last_signature.as_deref())
        .await?;

    let now = now_secs();
    let (ledger, fee) = {
        let db = state.db.lock().await;
        queries::ingest::advance_cursor(&db, &batch, state.config.distribution.fee_bps, now)?
    };

    if !batch.cursor_found {
        warn!(
            old_cursor = ?cursor_row.last_signature,
            "ingest cursor not found upstream; history gap recorded, resuming from head"
        );
        state.event_bus.emit(Event::now(
            "CursorNotFound",
            serde_json::json!({
                "old_cursor": cursor_row.last_signature,
                "new_cursor": batch.new_cursor,
            }),
        ));
    }

    state.event_bus.emit(Event::now(
        "IngestCompleted",
        serde_json::json!({
            "swaps": batch.swaps.len(),
            "volume_lamports": batch.total_volume,
            "fee_lamports": fee,
            "pages_scanned": batch.pages_scanned,
            "cursor_found": batch.cursor_found,
        }),
    ));
    if fee > 0 {
        state.event_bus.emit(Event::now(
            "RevenueRecorded",
            serde_json::json!({
                "amount_lamports": fee,
                "source": "trading_fees",
                "pool_lamports": ledger.pool_lamports,
            }),
        ));
    }

    Ok(IngestSummary {
        swaps: batch.swaps.len(),
        volume_lamports: batch.total_volume,
        fee_lamports: fee,
        pages_scanned: batch.pages_scanned,
        cursor_found: batch.cursor_found,
        pool_lamports: ledger.pool_lamports,
    })
}

/// Run one snapshot pass: fetch current holder balances and fold them into
/// the accrual book for the current cycle.
pub async fn snapshot_pass(state: &DaemonState) -> anyhow::Result<SnapshotSummary> {
    let holders = state
        .indexer
        .fetch_holders(&state.config.chain.token_mint)
        .await?;

    let now = now_secs();
    let cycle_index = cycle::cycle_index(now, state.config.accrual.cycle_secs);

    let db = state.db.lock().await;
    match queries::accrual::apply_cycle(&db, cycle_index, now, &holders)? {
        CycleOutcome::Applied { cycle, stats } => {
            let floor =
                cycle::retention_floor(cycle, state.config.accrual.snapshot_retention_cycles);
            let pruned = if floor > 0 {
                queries::accrual::prune_snapshots(&db, floor)?
            } else {
                0
            };

            state.event_bus.emit(Event::now(
                "CycleApplied",
                serde_json::json!({
                    "cycle": cycle,
                    "holders_seen": stats.holders_seen,
                    "new_holders": stats.new_holders,
                    "zeroed_holders": stats.zeroed_holders,
                    "credited_total": stats.credited_total.to_string(),
                }),
            ));

            Ok(SnapshotSummary {
                cycle,
                applied: true,
                holders_seen: stats.holders_seen,
                new_holders: stats.new_holders,
                zeroed_holders: stats.zeroed_holders,
                snapshots_pruned: pruned,
            })
        }
        CycleOutcome::AlreadyApplied {
            cycle,
            last_applied,
        } => {
            state.event_bus.emit(Event::now(
                "CycleSkipped",
                serde_json::json!({
                    "cycle": cycle,
                    "last_applied": last_applied,
                }),
            ));
            Ok(SnapshotSummary {
                cycle,
                applied: false,
                holders_seen: 0,
                new_holders: 0,
                zeroed_holders: 0,
                snapshots_pruned: 0,
            })
        }
    }
}

/// Fetch the spot price and store it in the cache.
pub async fn refresh_price(state: &DaemonState) -> tidemark_oracle::Result<u64> {
    let price = state.price_client.fetch_price().await?;
    state.price_cache.set(price, now_secs()).await;
    Ok(price)
}

async fn task_enabled(state: &DaemonState, key: &str) -> bool {
    let db = state.db.lock().await;
    queries::settings::get_bool(&db, key, true).unwrap_or(true)
}

/// Scheduled ingest loop.
pub async fn ingest_loop(state: std::sync::Arc<DaemonState>) {
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    let interval_secs = state.config.chain.ingest_interval_secs.max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !task_enabled(&state, "ingest_enabled").await {
                    debug!("ingest disabled by setting, tick skipped");
                    continue;
                }
                let Some(_permit) = state.guards.ingest.try_acquire() else {
                    debug!("ingest pass already running, tick skipped");
                    continue;
                };
                if let Err(e) = ingest_pass(&state).await {
                    warn!(error = %e, "ingest pass failed, will retry next tick");
                }
            }
            _ = shutdown_rx.recv() => {
                info!("ingest loop stopping");
                break;
            }
        }
    }
}

/// Scheduled snapshot loop, aligned to cycle boundaries.
pub async fn snapshot_loop(state: std::sync::Arc<DaemonState>) {
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    let cycle_secs = state.config.accrual.cycle_secs.max(1);

    loop {
        if task_enabled(&state, "snapshot_enabled").await {
            if let Some(_permit) = state.guards.snapshot.try_acquire() {
                if let Err(e) = snapshot_pass(&state).await {
                    warn!(error = %e, "snapshot pass failed, will retry next cycle");
                }
            } else {
                debug!("snapshot pass already running, boundary skipped");
            }
        }

        // Wake just inside the next cycle
        let wait = cycle::seconds_until_next_cycle(cycle_secs) + 1;
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(wait)) => {}
            _ = shutdown_rx.recv() => {
                info!("snapshot loop stopping");
                break;
            }
        }
    }
}

/// Scheduled price refresh loop.
pub async fn oracle_loop(state: std::sync::Arc<DaemonState>) {
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    let interval_secs = state.config.oracle.refresh_interval_secs.max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !task_enabled(&state, "oracle_refresh_enabled").await {
                    debug!("oracle refresh disabled by setting, tick skipped");
                    continue;
                }
                match refresh_price(&state).await {
                    Ok(price) => debug!(price_micro_usd = price, "price refreshed"),
                    Err(e) => warn!(error = %e, "price refresh failed, serving cached quote"),
                }
            }
            _ = shutdown_rx.recv() => {
                info!("oracle loop stopping");
                break;
            }
        }
    }
}
