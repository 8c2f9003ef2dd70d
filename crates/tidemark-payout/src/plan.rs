//! The distribution calculator.
//!
//! `compute_plan` turns one frozen `{ ledger, accrual records }` view into
//! an immutable [`PayoutPlan`]. The view must come from a single database
//! transaction so the pool and the credit book describe the same instant;
//! the calculator itself is pure and mutates nothing.
//!
//! ## Formula
//!
//! ```text
//! amount[holder] = pool * credit[holder] / total_eligible_credit   (floor)
//! ```
//!
//! Floor division guarantees `sum(amounts) <= pool`; the remainder stays in
//! the pool for the next window. Holders whose share floors to zero are
//! dropped from the plan and keep their credit.

use serde::{Deserialize, Serialize};
use tidemark_accrual::AccrualRecord;
use tidemark_ledger::LedgerState;
use tidemark_types::{
    lamports_to_micro_usd, Address, BaseUnits, Credit, Lamports, MicroUsd, UnixSecs,
};
use uuid::Uuid;

use crate::eligibility::{evaluate, EligibilityPolicy};
use crate::{PayoutError, Result};

/// Parts-per-million denominator for plan shares.
pub const PPM_DENOMINATOR: u64 = 1_000_000;

/// Frozen view of everything a distribution reads.
///
/// Produced by one database transaction; never assembled from separate
/// reads.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DistributionInputs {
    /// Ledger state at the freeze instant.
    pub ledger: LedgerState,
    /// Every accrual record at the freeze instant.
    pub records: Vec<AccrualRecord>,
}

/// One holder's line in a payout plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Holder address.
    pub address: Address,
    /// Credit backing this entry.
    #[serde(with = "tidemark_types::credit_str")]
    pub credit: Credit,
    /// Share of the eligible credit, in parts per million (floor).
    pub share_ppm: u64,
    /// Payout amount in lamports.
    pub amount_lamports: Lamports,
    /// Payout amount converted to micro-USD at the plan price.
    pub amount_micro_usd: MicroUsd,
}

/// Immutable record of one computed distribution.
///
/// Persisted append-only; only `executed_at` is ever set after creation,
/// exactly once, by the commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutPlan {
    /// Unique plan id (uuid v4).
    pub distribution_id: String,
    /// When the plan was computed.
    pub generated_at: UnixSecs,
    /// Pool size the plan was computed against.
    pub pool_lamports: Lamports,
    /// Price used for USD conversion, micro-USD per SOL.
    pub price_micro_usd: MicroUsd,
    /// When that price was fetched.
    pub price_as_of: UnixSecs,
    /// Total eligible credit backing the plan.
    #[serde(with = "tidemark_types::credit_str")]
    pub total_credit: Credit,
    /// USD value of the total paid, micro-USD (floor).
    pub total_converted_micro_usd: MicroUsd,
    /// Sum of entry amounts; never exceeds `pool_lamports`.
    pub total_paid_lamports: Lamports,
    /// `pool_lamports - total_paid_lamports`; stays in the pool.
    pub remainder_lamports: Lamports,
    /// Set exactly once when the plan commits; `None` until then.
    pub executed_at: Option<UnixSecs>,
    /// Per-holder lines, largest credit first.
    pub entries: Vec<PlanEntry>,
}

/// Why a distribution run computed no plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The pool is empty.
    EmptyPool,
    /// No eligible holder carries credit.
    NoEligibleCredit,
    /// Pool is nonzero but every eligible share floors to zero lamports.
    DustPool,
}

/// Outcome of a distribution computation.
///
/// "Nothing to distribute" is a defined no-op, not an error: scheduled and
/// manual runs both land here when the pool or the credit book is empty.
#[derive(Clone, Debug)]
pub enum PlanOutcome {
    /// A plan was computed and is ready for execution.
    Computed(Box<PayoutPlan>),
    /// No plan; nothing was or will be mutated for this run.
    NothingToDistribute(SkipReason),
}

/// Compute a payout plan from a frozen distribution view.
///
/// Eligibility gates on each record's `last_balance` against the total
/// observed supply (the sum of all `last_balance` values). Shares are
/// proportional to credit over the eligible set only; credit held by
/// ineligible holders is excluded from the denominator and survives for
/// later distributions.
///
/// # Arguments
///
/// * `inputs` - Frozen ledger + accrual view from one transaction
/// * `price_micro_usd` - Payout-grade price (staleness already enforced)
/// * `price_as_of` - Fetch time of that price, recorded in the plan
/// * `policy` - Eligibility thresholds
/// * `now` - Plan generation timestamp
///
/// # Errors
///
/// - [`PayoutError::InvalidPrice`] if the price is zero
/// - [`PayoutError::Overflow`] on arithmetic overflow
pub fn compute_plan(
    inputs: &DistributionInputs,
    price_micro_usd: MicroUsd,
    price_as_of: UnixSecs,
    policy: &EligibilityPolicy,
    now: UnixSecs,
) -> Result<PlanOutcome> {
    if price_micro_usd == 0 {
        return Err(PayoutError::InvalidPrice { price_micro_usd });
    }

    let pool = inputs.ledger.pool_lamports;
    if pool == 0 {
        return Ok(PlanOutcome::NothingToDistribute(SkipReason::EmptyPool));
    }

    let mut supply: u128 = 0;
    for record in &inputs.records {
        supply += u128::from(record.last_balance);
    }
    let total_supply: BaseUnits = u64::try_from(supply).map_err(|_| PayoutError::Overflow)?;

    let mut eligible: Vec<&AccrualRecord> = Vec::new();
    let mut total_credit: Credit = 0;
    for record in &inputs.records {
        if record.credit == 0 {
            continue;
        }
        if !evaluate(record.last_balance, total_supply, policy).eligible {
            continue;
        }
        total_credit = total_credit
            .checked_add(record.credit)
            .ok_or(PayoutError::Overflow)?;
        eligible.push(record);
    }

    if total_credit == 0 {
        return Ok(PlanOutcome::NothingToDistribute(
            SkipReason::NoEligibleCredit,
        ));
    }

    // Largest credit first; address breaks ties deterministically.
    eligible.sort_by(|a, b| {
        b.credit
            .cmp(&a.credit)
            .then_with(|| a.address.cmp(&b.address))
    });

    let mut entries = Vec::with_capacity(eligible.len());
    let mut total_paid: Lamports = 0;
    for record in eligible {
        let numerator = u128::from(pool)
            .checked_mul(record.credit)
            .ok_or(PayoutError::Overflow)?;
        let amount_lamports =
            u64::try_from(numerator / total_credit).map_err(|_| PayoutError::Overflow)?;
        if amount_lamports == 0 {
            // Dust share: holder keeps its credit for the next window.
            continue;
        }

        let share = record
            .credit
            .checked_mul(u128::from(PPM_DENOMINATOR))
            .ok_or(PayoutError::Overflow)?
            / total_credit;
        let share_ppm = u64::try_from(share).map_err(|_| PayoutError::Overflow)?;

        let amount_micro_usd = lamports_to_micro_usd(amount_lamports, price_micro_usd)
            .ok_or(PayoutError::Overflow)?;

        total_paid = total_paid
            .checked_add(amount_lamports)
            .ok_or(PayoutError::Overflow)?;

        entries.push(PlanEntry {
            address: record.address.clone(),
            credit: record.credit,
            share_ppm,
            amount_lamports,
            amount_micro_usd,
        });
    }

    if entries.is_empty() {
        return Ok(PlanOutcome::NothingToDistribute(SkipReason::DustPool));
    }

    let total_converted_micro_usd =
        lamports_to_micro_usd(total_paid, price_micro_usd).ok_or(PayoutError::Overflow)?;

    let plan = PayoutPlan {
        distribution_id: Uuid::new_v4().to_string(),
        generated_at: now,
        pool_lamports: pool,
        price_micro_usd,
        price_as_of,
        total_credit,
        total_converted_micro_usd,
        total_paid_lamports: total_paid,
        remainder_lamports: pool - total_paid,
        executed_at: None,
        entries,
    };

    tracing::info!(
        distribution_id = %plan.distribution_id,
        holders = plan.entries.len(),
        pool = plan.pool_lamports,
        total_paid = plan.total_paid_lamports,
        remainder = plan.remainder_lamports,
        "payout: plan computed"
    );

    Ok(PlanOutcome::Computed(Box::new(plan)))
}
