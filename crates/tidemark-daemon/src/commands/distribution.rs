//! Distribution command handlers.
//!
//! `estimate_distribution` is the read-only preview; `run_distribution` is
//! the real thing: plan, persist, execute, commit, in that order. The plan
//! is stored before execution so a failed run leaves an audit row with
//! `executed_at` unset instead of vanishing.

use std::sync::Arc;

use serde_json::Value;
use tidemark_db::{queries, DbError};
use tidemark_ledger::LedgerError;
use tidemark_oracle::OracleError;
use tidemark_payout::{compute_plan, PayoutExecutor, PlanOutcome};
use tidemark_types::now_secs;
use tracing::{info, warn};

use crate::events::Event;
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Preview the distribution the current pool and credit book would produce.
///
/// Uses the display price (last known good, stale allowed) and mutates
/// nothing.
pub async fn estimate_distribution(state: &Arc<DaemonState>) -> Result {
    let now = now_secs();
    let quote = state
        .price_cache
        .quote_for_display(now, state.config.oracle.max_payout_staleness_secs)
        .await
        .map_err(|_| RpcError::price_unavailable())?;

    let inputs = {
        let db = state.db.lock().await;
        queries::payout::distribution_inputs(&db)
            .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?
    };

    let policy = state.config.distribution.eligibility_policy();
    let outcome = compute_plan(&inputs, quote.price_micro_usd, quote.as_of, &policy, now)
        .map_err(|e| RpcError::internal_error(&format!("plan computation failed: {e}")))?;

    match outcome {
        PlanOutcome::Computed(plan) => Ok(serde_json::json!({
            "outcome": "computed",
            "entries": plan.entries.len(),
            "total_paid_lamports": plan.total_paid_lamports,
            "remainder_lamports": plan.remainder_lamports,
            "total_converted_micro_usd": plan.total_converted_micro_usd,
            "total_credit": plan.total_credit.to_string(),
            "pool_lamports": plan.pool_lamports,
            "price": quote,
        })),
        PlanOutcome::NothingToDistribute(reason) => Ok(serde_json::json!({
            "outcome": "skipped",
            "reason": reason,
        })),
    }
}

/// Compute, persist, execute, and commit one distribution.
///
/// Refuses to run against a stale or missing price, and refuses to overlap
/// another run. An execution failure leaves the stored plan uncommitted; the
/// pool and credit book are only touched by the final commit transaction.
pub async fn run_distribution(state: &Arc<DaemonState>) -> Result {
    let _permit = state
        .guards
        .distribution
        .try_acquire()
        .ok_or_else(|| RpcError::task_busy("distribution"))?;

    let now = now_secs();
    let quote = match state
        .price_cache
        .quote_for_payout(now, state.config.oracle.max_payout_staleness_secs)
        .await
    {
        Ok(quote) => quote,
        Err(OracleError::StalePrice {
            age_secs,
            max_age_secs,
        }) => {
            warn!(age_secs, max_age_secs, "distribution refused: price stale");
            state.event_bus.emit(Event::now(
                "StalePrice",
                serde_json::json!({
                    "age_secs": age_secs,
                    "max_age_secs": max_age_secs,
                }),
            ));
            return Err(RpcError::stale_price(age_secs, max_age_secs));
        }
        Err(_) => return Err(RpcError::price_unavailable()),
    };

    let inputs = {
        let db = state.db.lock().await;
        queries::payout::distribution_inputs(&db)
            .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?
    };

    let policy = state.config.distribution.eligibility_policy();
    let outcome = compute_plan(&inputs, quote.price_micro_usd, quote.as_of, &policy, now)
        .map_err(|e| RpcError::internal_error(&format!("plan computation failed: {e}")))?;

    let plan = match outcome {
        PlanOutcome::Computed(plan) => plan,
        PlanOutcome::NothingToDistribute(reason) => {
            info!(?reason, "distribution skipped");
            return Ok(serde_json::json!({
                "distributed": false,
                "reason": reason,
            }));
        }
    };

    {
        let db = state.db.lock().await;
        queries::payout::store_plan(&db, &plan)
            .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
    }

    state.event_bus.emit(Event::now(
        "DistributionComputed",
        serde_json::json!({
            "distribution_id": plan.distribution_id,
            "entries": plan.entries.len(),
            "total_paid_lamports": plan.total_paid_lamports,
        }),
    ));

    // Execution happens outside the db lock. A failure here leaves the plan
    // stored but uncommitted: nothing was debited, nothing was reset.
    let receipt = state.executor.execute(&plan).await.map_err(|e| {
        warn!(
            distribution_id = %plan.distribution_id,
            error = %e,
            "plan execution failed; plan left uncommitted"
        );
        RpcError::execution_failed(&e.to_string())
    })?;

    let after = {
        let db = state.db.lock().await;
        queries::payout::commit_distribution(&db, &plan, now_secs())
    }
    .map_err(|e| match e {
        DbError::Ledger(LedgerError::InsufficientPool {
            requested,
            available,
        }) => RpcError::insufficient_pool(requested, available),
        other => RpcError::internal_error(&format!("db error: {other}")),
    })?;

    state.event_bus.emit(Event::now(
        "DistributionCommitted",
        serde_json::json!({
            "distribution_id": plan.distribution_id,
            "total_paid_lamports": plan.total_paid_lamports,
            "pool_lamports": after.ledger.pool_lamports,
            "credits_reset": after.credits_reset,
        }),
    ));

    info!(
        distribution_id = %plan.distribution_id,
        entries = plan.entries.len(),
        total_paid = plan.total_paid_lamports,
        "distribution committed"
    );

    Ok(serde_json::json!({
        "distributed": true,
        "distribution_id": plan.distribution_id,
        "entries": plan.entries.len(),
        "total_paid_lamports": plan.total_paid_lamports,
        "remainder_lamports": plan.remainder_lamports,
        "receipt_reference": receipt.reference,
        "pool_lamports": after.ledger.pool_lamports,
        "credits_reset": after.credits_reset,
    }))
}

/// Fetch one stored payout plan with its entries.
pub async fn get_payout_plan(state: &Arc<DaemonState>, params: &Value) -> Result {
    let distribution_id = params
        .get("distribution_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params("distribution_id required"))?;

    let plan = {
        let db = state.db.lock().await;
        queries::payout::plan(&db, distribution_id).map_err(|e| match e {
            DbError::NotFound(what) => RpcError::not_found(&what),
            other => RpcError::internal_error(&format!("db error: {other}")),
        })?
    };

    serde_json::to_value(&plan)
        .map_err(|e| RpcError::internal_error(&format!("serialization error: {e}")))
}

/// List recent payout plans, newest first.
pub async fn list_payout_plans(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = params
        .get("limit")
        .and_then(|v| v.as_u64())
        .unwrap_or(20)
        .min(100) as u32;

    let summaries = {
        let db = state.db.lock().await;
        queries::payout::recent_plans(&db, limit)
            .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?
    };

    let rows: Vec<Value> = summaries
        .iter()
        .map(|s| {
            serde_json::json!({
                "distribution_id": s.distribution_id,
                "generated_at": s.generated_at,
                "total_paid_lamports": s.total_paid_lamports,
                "total_converted_micro_usd": s.total_converted_micro_usd,
                "entry_count": s.entry_count,
                "executed_at": s.executed_at,
            })
        })
        .collect();

    Ok(serde_json::json!(rows))
}
