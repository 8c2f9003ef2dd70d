//! # tidemark-oracle
//!
//! Price oracle adapter: fetches the native-coin spot price from an HTTP
//! price API and serves it to the rest of the system with explicit
//! staleness semantics.
//!
//! Two read paths exist on purpose. Display reads (`get_price`, pool value
//! in USD, advisory holder estimates) take the last known good price with
//! an `as_of` timestamp and a `stale` flag and never fail once a price has
//! been cached. Payout reads refuse prices older than the configured bound:
//! a distribution must never be valued against a dead feed.
//!
//! ## Modules
//!
//! - [`cache`] — Last-known-good price cache with the two read paths
//! - [`client`] — HTTP price fetcher with bounded retry

pub mod cache;
pub mod client;

pub use cache::{PriceCache, PriceQuote};
pub use client::PriceClient;

/// Error types for oracle operations.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// No price has ever been cached.
    #[error("no price available yet")]
    PriceUnavailable,

    /// Cached price is too old for payout use.
    #[error("price is stale: {age_secs}s old, payout bound {max_age_secs}s")]
    StalePrice {
        /// Age of the cached price in seconds.
        age_secs: u64,
        /// Configured maximum age for payout use.
        max_age_secs: u64,
    },

    /// Upstream returned a price that cannot be used.
    #[error("invalid upstream price: {0}")]
    InvalidUpstreamPrice(String),

    /// Upstream response did not contain the expected pair.
    #[error("malformed price response: {0}")]
    MalformedResponse(String),

    /// HTTP transport failure.
    #[error("price fetch failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Convenience result type for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;
