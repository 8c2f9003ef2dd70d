//! Current-balance eligibility gate and holder tiers.
//!
//! Eligibility is a pure function of the holder's *current* balance: a
//! holder that accumulated credit and then sold below the minimum keeps the
//! credit but is excluded from the plan being computed. Tiers classify
//! holders by their share of observed supply in basis points; they drive
//! reporting, not payout amounts.

use serde::{Deserialize, Serialize};
use tidemark_types::{BaseUnits, BPS_DENOMINATOR};

/// Thresholds gating distribution eligibility.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityPolicy {
    /// Minimum current balance (base units) to be included in a plan.
    pub min_balance: BaseUnits,
    /// Whale tier floor, in basis points of observed supply.
    pub tier_whale_bps: u64,
    /// Dolphin tier floor, in basis points of observed supply.
    pub tier_dolphin_bps: u64,
    /// Fish tier floor, in basis points of observed supply.
    pub tier_fish_bps: u64,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            min_balance: 0,
            tier_whale_bps: 100,
            tier_dolphin_bps: 10,
            tier_fish_bps: 1,
        }
    }
}

/// Holder size class relative to observed supply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolderTier {
    /// At least `tier_whale_bps` of supply (default 1%).
    Whale,
    /// At least `tier_dolphin_bps` of supply (default 0.1%).
    Dolphin,
    /// At least `tier_fish_bps` of supply (default 0.01%).
    Fish,
    /// Everything smaller.
    Shrimp,
}

/// The result of evaluating one holder against the policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    /// Whether the holder is included in distribution plans.
    pub eligible: bool,
    /// Size tier at the evaluated balance.
    pub tier: HolderTier,
}

/// Evaluate a holder's current balance against the policy.
///
/// A zero balance is never eligible, whatever the minimum: absent or
/// fully-exited holders accrue nothing and receive nothing until they
/// reappear in a snapshot.
pub fn evaluate(
    balance: BaseUnits,
    total_supply: BaseUnits,
    policy: &EligibilityPolicy,
) -> Eligibility {
    let eligible = balance > 0 && balance >= policy.min_balance;

    let share_bps = if total_supply == 0 {
        0
    } else {
        u128::from(balance) * u128::from(BPS_DENOMINATOR) / u128::from(total_supply)
    };

    let tier = if share_bps >= u128::from(policy.tier_whale_bps) {
        HolderTier::Whale
    } else if share_bps >= u128::from(policy.tier_dolphin_bps) {
        HolderTier::Dolphin
    } else if share_bps >= u128::from(policy.tier_fish_bps) {
        HolderTier::Fish
    } else {
        HolderTier::Shrimp
    };

    Eligibility { eligible, tier }
}
