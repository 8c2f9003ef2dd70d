//! Holder command handlers.

use std::sync::Arc;

use serde_json::Value;
use tidemark_db::queries;
use tidemark_payout::{compute_plan, evaluate, HolderTier, PlanOutcome};
use tidemark_types::now_secs;

use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Get one holder's accrual record, eligibility, and an advisory share
/// estimate against the current pool.
///
/// Unknown addresses return a zeroed record rather than an error; the
/// estimate is omitted when no price was ever cached.
pub async fn get_holder(state: &Arc<DaemonState>, params: &Value) -> Result {
    let address = params
        .get("address")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("address required"))?;

    let inputs = {
        let db = state.db.lock().await;
        queries::payout::distribution_inputs(&db)
            .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?
    };

    let supply: u128 = inputs
        .records
        .iter()
        .map(|r| u128::from(r.last_balance))
        .sum();
    let total_supply = u64::try_from(supply).unwrap_or(u64::MAX);
    let policy = state.config.distribution.eligibility_policy();

    let record = inputs.records.iter().find(|r| r.address == address);
    let (known, credit, last_balance, first_seen_at, last_updated_at) = match record {
        Some(r) => (
            true,
            r.credit,
            r.last_balance,
            Some(r.first_seen_at),
            Some(r.last_updated_at),
        ),
        None => (false, 0, 0, None, None),
    };
    let eligibility = evaluate(last_balance, total_supply, &policy);
    let tier: HolderTier = eligibility.tier;

    // Advisory estimate: this holder's line in a plan computed against the
    // display quote. Last-known-good semantics; never an error payload.
    let now = now_secs();
    let estimated = match state
        .price_cache
        .quote_for_display(now, state.config.oracle.max_payout_staleness_secs)
        .await
    {
        Ok(quote) => {
            match compute_plan(&inputs, quote.price_micro_usd, quote.as_of, &policy, now) {
                Ok(PlanOutcome::Computed(plan)) => plan
                    .entries
                    .iter()
                    .find(|e| e.address == address)
                    .map(|e| {
                        serde_json::json!({
                            "amount_lamports": e.amount_lamports,
                            "amount_micro_usd": e.amount_micro_usd,
                            "share_ppm": e.share_ppm,
                            "as_of": quote.as_of,
                            "price_stale": quote.stale,
                        })
                    }),
                _ => None,
            }
        }
        Err(_) => None,
    };

    Ok(serde_json::json!({
        "address": address,
        "known": known,
        "credit": credit.to_string(),
        "last_balance": last_balance,
        "first_seen_at": first_seen_at,
        "last_updated_at": last_updated_at,
        "eligible": eligibility.eligible,
        "tier": tier,
        "estimated": estimated,
    }))
}

/// Top holders by accrued credit.
pub async fn top_holders(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = params
        .get("limit")
        .and_then(|v| v.as_u64())
        .unwrap_or(20)
        .min(500) as u32;

    let records = {
        let db = state.db.lock().await;
        queries::accrual::top_by_credit(&db, limit)
            .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?
    };

    let rows: Vec<Value> = records
        .iter()
        .map(|r| {
            serde_json::json!({
                "address": r.address,
                "credit": r.credit.to_string(),
                "last_balance": r.last_balance,
                "first_seen_at": r.first_seen_at,
                "last_updated_at": r.last_updated_at,
            })
        })
        .collect();

    Ok(serde_json::json!(rows))
}
