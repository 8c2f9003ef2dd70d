//! The payout execution seam.
//!
//! Tidemark computes plans; it never moves funds. An implementation of
//! [`PayoutExecutor`] (an on-chain transfer batcher, a custody API, a test
//! double) takes an immutable plan and either succeeds as a whole or fails
//! as a whole. The ledger commit happens only after a plan-level success,
//! so a failed or half-finished executor run leaves every counter and every
//! holder's credit untouched.

use serde::{Deserialize, Serialize};
use tidemark_types::UnixSecs;

use crate::plan::PayoutPlan;
use crate::{PayoutError, Result};

/// Proof of plan-level execution returned by an executor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    /// The plan that was executed.
    pub distribution_id: String,
    /// When the executor finished.
    pub executed_at: UnixSecs,
    /// Executor-assigned reference (transaction signature, batch id, ...).
    pub reference: String,
}

/// External system that carries out a payout plan.
///
/// Implementors do the actual transfers. The abstraction keeps distribution
/// logic testable without touching a chain.
pub trait PayoutExecutor {
    /// Execute the whole plan, all entries or none.
    ///
    /// An `Ok` receipt means every entry was paid; the caller may commit.
    /// Any `Err` means the plan must be treated as not executed.
    fn execute(
        &self,
        plan: &PayoutPlan,
    ) -> impl std::future::Future<Output = Result<ExecutionReceipt>> + Send;
}

/// Executor that acknowledges plans without moving funds.
///
/// Stands in until a real transfer backend is wired up, mirroring how the
/// price oracle ships with a development stub. Useful in tests and for
/// dry-running the full distribution path.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubExecutor;

impl PayoutExecutor for StubExecutor {
    async fn execute(&self, plan: &PayoutPlan) -> Result<ExecutionReceipt> {
        if plan.entries.is_empty() {
            return Err(PayoutError::ExecutionFailed(
                "plan has no entries".to_string(),
            ));
        }

        let executed_at = tidemark_types::now_secs();
        tracing::info!(
            distribution_id = %plan.distribution_id,
            holders = plan.entries.len(),
            total_paid = plan.total_paid_lamports,
            "payout: stub executor acknowledged plan"
        );

        Ok(ExecutionReceipt {
            distribution_id: plan.distribution_id.clone(),
            executed_at,
            reference: format!("stub-{}", plan.distribution_id),
        })
    }
}
