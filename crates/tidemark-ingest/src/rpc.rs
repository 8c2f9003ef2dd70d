//! JSON-RPC chain access over HTTP.
//!
//! Speaks the two read methods the scan needs, `getSignaturesForAddress`
//! and `getTransaction` (jsonParsed, confirmed commitment), against any
//! standard RPC provider. Transport and HTTP-status failures are retried
//! with capped jittered backoff; JSON-RPC error objects are not retried.

use std::time::Duration;

use serde_json::{json, Value};
use tidemark_types::Lamports;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::debug;

use crate::scan::{SignatureInfo, SignatureSource};
use crate::volume::max_balance_delta;
use crate::{IngestError, Result};

/// HTTP JSON-RPC implementation of [`SignatureSource`].
#[derive(Clone, Debug)]
pub struct RpcChainClient {
    http: reqwest::Client,
    rpc_url: String,
    retry_attempts: usize,
}

impl RpcChainClient {
    /// Build a client with a bounded request timeout.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Http`] if the underlying client cannot be built
    pub fn new(rpc_url: &str, request_timeout_secs: u64, retry_attempts: usize) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            rpc_url: rpc_url.to_string(),
            retry_attempts,
        })
    }

    /// POST one JSON-RPC request, retrying transport failures.
    async fn call(&self, request: &Value) -> Result<Value> {
        let strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(self.retry_attempts);

        let body = Retry::spawn(strategy, || self.call_once(request)).await?;
        Ok(body)
    }

    async fn call_once(&self, request: &Value) -> Result<Value> {
        let response = self
            .http
            .post(&self.rpc_url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        Ok(body)
    }
}

impl SignatureSource for RpcChainClient {
    async fn signatures_page(
        &self,
        address: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        let config = match before {
            Some(before) => json!({ "limit": limit, "before": before, "commitment": "confirmed" }),
            None => json!({ "limit": limit, "commitment": "confirmed" }),
        };
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getSignaturesForAddress",
            "params": [address, config]
        });

        let body = self.call(&request).await?;
        if let Some(err) = body.get("error") {
            return Err(IngestError::Rpc(err.to_string()));
        }
        let entries = body
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| IngestError::MalformedResponse("result is not an array".to_string()))?;

        entries.iter().map(parse_signature_entry).collect()
    }

    async fn transaction_volume(&self, signature: &str) -> Result<Option<Lamports>> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getTransaction",
            "params": [
                signature,
                {
                    "encoding": "jsonParsed",
                    "commitment": "confirmed",
                    "maxSupportedTransactionVersion": 0
                }
            ]
        });

        let body = self.call(&request).await?;
        if let Some(err) = body.get("error") {
            debug!(signature, error = %err, "ingest: getTransaction returned rpc error");
            return Ok(None);
        }
        Ok(volume_from_transaction(&body))
    }
}

/// Parse one `getSignaturesForAddress` entry.
fn parse_signature_entry(entry: &Value) -> Result<SignatureInfo> {
    let signature = entry
        .get("signature")
        .and_then(Value::as_str)
        .ok_or_else(|| IngestError::MalformedResponse("entry without signature".to_string()))?
        .to_string();
    Ok(SignatureInfo {
        signature,
        slot: entry.get("slot").and_then(Value::as_u64).unwrap_or(0),
        failed: entry.get("err").map(|e| !e.is_null()).unwrap_or(false),
        block_time: entry.get("blockTime").and_then(Value::as_i64),
    })
}

/// Measure one `getTransaction` response body.
///
/// `None` for missing/unparsable transactions; `Some(0)` for failed ones.
fn volume_from_transaction(body: &Value) -> Option<Lamports> {
    let result = match body.get("result") {
        Some(value) if !value.is_null() => value,
        _ => return None,
    };
    let meta = match result.get("meta") {
        Some(value) if !value.is_null() => value,
        _ => return None,
    };
    if meta.get("err").map(|e| !e.is_null()).unwrap_or(false) {
        return Some(0);
    }

    let pre = lamport_array(meta.get("preBalances"))?;
    let post = lamport_array(meta.get("postBalances"))?;
    Some(max_balance_delta(&pre, &post))
}

/// Decode a balance array; any non-u64 element makes the whole array
/// unusable (misaligned deltas are worse than a skipped transaction).
fn lamport_array(value: Option<&Value>) -> Option<Vec<u64>> {
    value?
        .as_array()?
        .iter()
        .map(Value::as_u64)
        .collect::<Option<Vec<u64>>>()
}
