//! # tidemark-ledger
//!
//! Revenue pool accounting.
//!
//! The ledger tracks the undistributed revenue pool and lifetime counters
//! for both revenue streams: trading fees derived from observed swap volume,
//! and externally reported revenue pushed in over RPC. A distribution commit
//! debits the pool and locks per-stream baselines so already-counted revenue
//! is never counted twice.
//!
//! ## Modules
//!
//! - [`pool`] — Ledger state and pool mutations

pub mod pool;

pub use pool::{fee_from_volume, LedgerState, RevenueSource};

/// Error types for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Amount is zero.
    #[error("ledger amount is zero")]
    ZeroAmount,

    /// Arithmetic overflow.
    #[error("arithmetic overflow in ledger calculation")]
    Overflow,

    /// Fee rate exceeds 100%.
    #[error("fee rate {bps} bps exceeds denominator")]
    InvalidFeeRate {
        /// The offending rate in basis points.
        bps: u64,
    },

    /// The pool cannot cover the requested debit.
    #[error("insufficient pool: requested {requested} lamports, available {available}")]
    InsufficientPool {
        /// Lamports requested.
        requested: u64,
        /// Lamports actually in the pool.
        available: u64,
    },
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
