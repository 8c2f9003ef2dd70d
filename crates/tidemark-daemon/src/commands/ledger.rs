//! Revenue ledger command handlers.

use std::sync::Arc;

use serde_json::Value;
use tidemark_db::{queries, DbError};
use tidemark_ledger::{LedgerError, RevenueSource};
use tidemark_types::{lamports_to_micro_usd, now_secs};

use crate::events::Event;
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Get the pool and lifetime counters, with a USD view when a price exists.
pub async fn get_pool(state: &Arc<DaemonState>) -> Result {
    let ledger = {
        let db = state.db.lock().await;
        queries::ledger::load(&db)
            .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?
    };

    let quote = state
        .price_cache
        .quote_for_display(now_secs(), state.config.oracle.max_payout_staleness_secs)
        .await
        .ok();
    let pool_micro_usd =
        quote.and_then(|q| lamports_to_micro_usd(ledger.pool_lamports, q.price_micro_usd));

    Ok(serde_json::json!({
        "pool_lamports": ledger.pool_lamports,
        "pool_micro_usd": pool_micro_usd,
        "cumulative_volume": ledger.cumulative_volume,
        "cumulative_trading_fees": ledger.cumulative_trading_fees,
        "cumulative_reported_fees": ledger.cumulative_reported_fees,
        "fees_since_reset": ledger.fees_since_reset(),
        "cumulative_distributed": ledger.cumulative_distributed,
        "last_reset_at": ledger.last_reset_at,
        "price": quote,
    }))
}

/// Record operator-reported revenue into the pool.
pub async fn report_revenue(state: &Arc<DaemonState>, params: &Value) -> Result {
    let amount = params
        .get("amount_lamports")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| RpcError::invalid_params("amount_lamports required"))?;

    let ledger = {
        let db = state.db.lock().await;
        queries::ledger::record_revenue(&db, amount, RevenueSource::ReportedFees, now_secs())
    }
    .map_err(|e| match e {
        DbError::Ledger(LedgerError::ZeroAmount) => {
            RpcError::invalid_params("amount_lamports must be positive")
        }
        other => RpcError::internal_error(&format!("db error: {other}")),
    })?;

    state.event_bus.emit(Event::now(
        "RevenueRecorded",
        serde_json::json!({
            "amount_lamports": amount,
            "source": "reported_fees",
            "pool_lamports": ledger.pool_lamports,
        }),
    ));

    Ok(serde_json::json!({
        "pool_lamports": ledger.pool_lamports,
        "cumulative_reported_fees": ledger.cumulative_reported_fees,
    }))
}
