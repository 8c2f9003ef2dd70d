//! Price oracle command handlers.

use std::sync::Arc;

use serde_json::Value;
use tidemark_types::now_secs;

use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Get the display price quote (stale-ok, age made explicit).
pub async fn get_price(state: &Arc<DaemonState>) -> Result {
    let quote = state
        .price_cache
        .quote_for_display(now_secs(), state.config.oracle.max_payout_staleness_secs)
        .await
        .map_err(|_| RpcError::price_unavailable())?;

    Ok(serde_json::json!({
        "price_micro_usd": quote.price_micro_usd,
        "as_of": quote.as_of,
        "stale": quote.stale,
    }))
}

/// Dev-only: inject a price into the cache.
pub async fn dev_set_price(state: &Arc<DaemonState>, params: &Value) -> Result {
    let price = params
        .get("price_micro_usd")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| RpcError::invalid_params("price_micro_usd required"))?;
    if price == 0 {
        return Err(RpcError::invalid_params("price_micro_usd must be positive"));
    }

    state.price_cache.set(price, now_secs()).await;
    Ok(serde_json::json!({"price_set": true}))
}
