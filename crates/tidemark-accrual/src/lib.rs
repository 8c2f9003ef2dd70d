//! # tidemark-accrual
//!
//! Balance-time accrual for token holders.
//!
//! Each holder accumulates credit equal to its token balance once per
//! accrual cycle. Credit is therefore a balance-time integral in units of
//! base-unit-cycles: holding 100 tokens for 10 cycles earns the same credit
//! as holding 1000 tokens for 1 cycle. Distribution shares are proportional
//! to credit, and credit resets to zero for paid holders.
//!
//! ## Modules
//!
//! - [`cycle`] — Cycle index arithmetic
//! - [`fold`] — Per-cycle credit fold over a balance snapshot

pub mod cycle;
pub mod fold;

pub use fold::{fold_cycle, AccrualRecord, CycleOutcome, FoldStats};

/// Error types for accrual operations.
#[derive(Debug, thiserror::Error)]
pub enum AccrualError {
    /// Arithmetic overflow while accumulating credit.
    #[error("arithmetic overflow")]
    Overflow,

    /// A snapshot balance was invalid.
    #[error("invalid balance for {address}: {reason}")]
    InvalidBalance {
        /// Holder address.
        address: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Convenience result type for accrual operations.
pub type Result<T> = std::result::Result<T, AccrualError>;
