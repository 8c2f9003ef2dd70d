//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! JSON-RPC method calls to the appropriate command handlers. The socket's
//! filesystem permissions are the operator gate; this is not a public
//! endpoint.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Error code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "PARSE_ERROR".to_string(),
            data: None,
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self {
            code: -32602,
            message: "INVALID_PARAMS".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self {
            code: -32603,
            message: "INTERNAL_ERROR".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    // Domain errors

    /// No price was ever cached (-32001).
    pub fn price_unavailable() -> Self {
        Self {
            code: -32001,
            message: "PRICE_UNAVAILABLE".to_string(),
            data: None,
        }
    }

    /// Price too old for a distribution run (-32002).
    pub fn stale_price(age_secs: u64, max_age_secs: u64) -> Self {
        Self {
            code: -32002,
            message: "STALE_PRICE".to_string(),
            data: Some(serde_json::json!({
                "age_secs": age_secs,
                "max_age_secs": max_age_secs,
            })),
        }
    }

    /// A pass of this task is already running (-32003).
    pub fn task_busy(task: &str) -> Self {
        Self {
            code: -32003,
            message: "TASK_BUSY".to_string(),
            data: Some(serde_json::json!({"task": task})),
        }
    }

    /// Plan total exceeds the live pool (-32004).
    pub fn insufficient_pool(requested: u64, available: u64) -> Self {
        Self {
            code: -32004,
            message: "INSUFFICIENT_POOL".to_string(),
            data: Some(serde_json::json!({
                "requested": requested,
                "available": available,
            })),
        }
    }

    /// Requested record does not exist (-32005).
    pub fn not_found(what: &str) -> Self {
        Self {
            code: -32005,
            message: "NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"what": what})),
        }
    }

    /// Payout executor rejected the plan (-32006).
    pub fn execution_failed(detail: &str) -> Self {
        Self {
            code: -32006,
            message: "EXECUTION_FAILED".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("RPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => dispatch_request(state.clone(), request).await,
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Status & ledger
        "get_status" => commands::status::get_status(&state).await,
        "get_pool" => commands::ledger::get_pool(&state).await,
        "report_revenue" => commands::ledger::report_revenue(&state, &request.params).await,

        // Oracle
        "get_price" => commands::oracle::get_price(&state).await,

        // Holders
        "get_holder" => commands::holders::get_holder(&state, &request.params).await,
        "top_holders" => commands::holders::top_holders(&state, &request.params).await,

        // Distribution
        "estimate_distribution" => commands::distribution::estimate_distribution(&state).await,
        "run_distribution" => commands::distribution::run_distribution(&state).await,
        "get_payout_plan" => {
            commands::distribution::get_payout_plan(&state, &request.params).await
        }
        "list_payout_plans" => {
            commands::distribution::list_payout_plans(&state, &request.params).await
        }

        // Manual task triggers
        "run_ingest_once" => commands::control::run_ingest_once(&state).await,
        "run_snapshot_once" => commands::control::run_snapshot_once(&state).await,

        // Dev-only commands
        "dev_set_price" => commands::oracle::dev_set_price(&state, &request.params).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}
