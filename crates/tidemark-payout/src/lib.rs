//! # tidemark-payout
//!
//! Distribution calculation: who gets paid, how much, and the seam through
//! which a plan leaves the system.
//!
//! A distribution turns a frozen view of the ledger and the accrual book
//! into an immutable [`plan::PayoutPlan`]: eligibility gates on current
//! balance, shares are proportional to balance-time credit, and all money
//! math is integer with floor rounding so the plan can never pay out more
//! than the pool holds. Computation mutates nothing; the db layer commits
//! the plan afterwards in its own transaction.
//!
//! ## Modules
//!
//! - [`eligibility`] — Current-balance gate and holder tiers
//! - [`plan`] — The distribution calculator
//! - [`executor`] — [`executor::PayoutExecutor`] seam and the stub executor

pub mod eligibility;
pub mod executor;
pub mod plan;

pub use eligibility::{evaluate, Eligibility, EligibilityPolicy, HolderTier};
pub use executor::{ExecutionReceipt, PayoutExecutor, StubExecutor};
pub use plan::{compute_plan, DistributionInputs, PayoutPlan, PlanEntry, PlanOutcome, SkipReason};

/// Error types for payout operations.
#[derive(Debug, thiserror::Error)]
pub enum PayoutError {
    /// Arithmetic overflow in plan calculation.
    #[error("arithmetic overflow in payout calculation")]
    Overflow,

    /// The payout price is zero or missing.
    #[error("invalid payout price: {price_micro_usd} micro-USD")]
    InvalidPrice {
        /// The offending price.
        price_micro_usd: u64,
    },

    /// The external executor rejected or failed the plan.
    #[error("plan execution failed: {0}")]
    ExecutionFailed(String),
}

/// Convenience result type for payout operations.
pub type Result<T> = std::result::Result<T, PayoutError>;
