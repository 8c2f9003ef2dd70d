//! Status command handlers.

use std::sync::Arc;

use serde_json::Value;
use tidemark_accrual::cycle;
use tidemark_db::queries;
use tidemark_types::now_secs;

use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Daemon status: cursor, cycle marker, pool, price freshness, task states.
pub async fn get_status(state: &Arc<DaemonState>) -> Result {
    let now = now_secs();

    let (cursor, marker, ledger) = {
        let db = state.db.lock().await;
        let cursor = queries::ingest::cursor(&db)
            .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
        let marker = queries::accrual::state(&db)
            .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
        let ledger = queries::ledger::load(&db)
            .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
        (cursor, marker, ledger)
    };

    let price = state
        .price_cache
        .quote_for_display(now, state.config.oracle.max_payout_staleness_secs)
        .await
        .ok();

    Ok(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "now": now,
        "current_cycle": cycle::cycle_index(now, state.config.accrual.cycle_secs),
        "cursor": {
            "last_signature": cursor.last_signature,
            "last_processed_at": cursor.last_processed_at,
            "history_gaps": cursor.history_gaps,
        },
        "accrual": {
            "last_applied_cycle": marker.last_applied_cycle,
            "cycles_applied": marker.cycles_applied,
        },
        "pool_lamports": ledger.pool_lamports,
        "cumulative_distributed": ledger.cumulative_distributed,
        "price": price,
        "tasks": {
            "ingest_running": state.guards.ingest.is_running(),
            "snapshot_running": state.guards.snapshot.is_running(),
            "distribution_running": state.guards.distribution.is_running(),
        },
        "events_emitted": state.event_bus.sequence(),
    }))
}
