//! Manual task triggers.
//!
//! Each trigger runs the same pass function the scheduled loop runs, behind
//! the same single-flight guard, so an operator kick and a timer tick can
//! never double-process.

use std::sync::Arc;

use serde_json::Value;

use crate::rpc::RpcError;
use crate::{tasks, DaemonState};

type Result = std::result::Result<Value, RpcError>;

/// Run one ingest pass immediately.
pub async fn run_ingest_once(state: &Arc<DaemonState>) -> Result {
    let _permit = state
        .guards
        .ingest
        .try_acquire()
        .ok_or_else(|| RpcError::task_busy("ingest"))?;

    let summary = tasks::ingest_pass(state)
        .await
        .map_err(|e| RpcError::internal_error(&format!("ingest failed: {e}")))?;

    serde_json::to_value(&summary)
        .map_err(|e| RpcError::internal_error(&format!("serialization error: {e}")))
}

/// Run one snapshot pass immediately.
pub async fn run_snapshot_once(state: &Arc<DaemonState>) -> Result {
    let _permit = state
        .guards
        .snapshot
        .try_acquire()
        .ok_or_else(|| RpcError::task_busy("snapshot"))?;

    let summary = tasks::snapshot_pass(state)
        .await
        .map_err(|e| RpcError::internal_error(&format!("snapshot failed: {e}")))?;

    serde_json::to_value(&summary)
        .map_err(|e| RpcError::internal_error(&format!("serialization error: {e}")))
}
