//! # tidemark-snapshot
//!
//! Balance snapshot client.
//!
//! Talks to a balance-indexing HTTP API that answers one question: who
//! holds the token right now, and how much. The indexer is a black box;
//! its answer feeds one accrual cycle. A fetch that fails after the retry
//! budget skips the cycle entirely, so a flaky indexer costs a sampling
//! window but never corrupts the credit book.
//!
//! ## Modules
//!
//! - [`indexer`] — The HTTP client

pub mod indexer;

pub use indexer::IndexerClient;

/// Error types for snapshot operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// HTTP transport failure after retries.
    #[error("indexer request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The indexer response did not match the expected shape.
    #[error("malformed indexer response: {0}")]
    MalformedResponse(String),
}

/// Convenience result type for snapshot operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;
