//! # tidemark-ingest
//!
//! Incremental swap-transaction ingestion from a chain RPC provider.
//!
//! The ingestor walks `getSignaturesForAddress` pages backward from the
//! chain head until it meets the durable cursor (the last fully processed
//! signature), fetches each strictly-newer transaction, and measures its
//! volume. The cursor is advanced by the caller only after the whole batch
//! is durably recorded, so a crash mid-pass reprocesses instead of
//! skipping, and the cursor re-scan keeps reprocessing from double
//! counting.
//!
//! ## Modules
//!
//! - [`volume`] — The per-transaction volume heuristic
//! - [`scan`] — Cursor-bounded pagination over a [`scan::SignatureSource`]
//! - [`rpc`] — JSON-RPC `SignatureSource` over HTTP

pub mod rpc;
pub mod scan;
pub mod volume;

pub use rpc::RpcChainClient;
pub use scan::{IngestBatch, Ingestor, ScanLimits, SignatureInfo, SignatureSource, SwapObservation};

/// Error types for ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// HTTP transport failure after retries.
    #[error("chain rpc request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The RPC provider returned a JSON-RPC error object.
    #[error("chain rpc error: {0}")]
    Rpc(String),

    /// The RPC response was missing required fields.
    #[error("malformed rpc response: {0}")]
    MalformedResponse(String),

    /// Arithmetic overflow while summing batch volume.
    #[error("arithmetic overflow in batch volume")]
    Overflow,
}

/// Convenience result type for ingestion.
pub type Result<T> = std::result::Result<T, IngestError>;
