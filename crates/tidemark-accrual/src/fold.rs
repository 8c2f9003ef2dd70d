//! Per-cycle credit fold.
//!
//! One fold applies one balance snapshot to the accrual book: every holder
//! present in the snapshot is credited its balance, every previously-known
//! holder absent from the snapshot has its live balance zeroed (credit is
//! retained). Folding the same cycle twice is prevented one level up by the
//! [`crate::cycle::is_replay`] gate; the fold itself is a plain merge.
//!
//! ## Formula
//!
//! ```text
//! credit[holder] += balance[holder]        (one addend per cycle)
//! ```
//!
//! Credit is u128: a u64 balance folded every cycle would need on the order
//! of 2^64 cycles to overflow.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tidemark_types::{Address, BaseUnits, Credit, CycleIndex, HolderBalance, UnixSecs};

use crate::{AccrualError, Result};

/// Accrued credit ledger entry for a single holder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualRecord {
    /// Holder address (base58 account key).
    pub address: Address,
    /// Accumulated balance-time credit in base-unit-cycles.
    #[serde(with = "tidemark_types::credit_str")]
    pub credit: Credit,
    /// Balance observed at the most recent fold, in base units.
    pub last_balance: BaseUnits,
    /// When this holder first entered the book.
    pub first_seen_at: UnixSecs,
    /// When this record was last touched by a fold or a payout reset.
    pub last_updated_at: UnixSecs,
}

impl AccrualRecord {
    /// Create a fresh record with zero credit.
    pub fn new(address: Address, observed_at: UnixSecs) -> Self {
        Self {
            address,
            credit: 0,
            last_balance: 0,
            first_seen_at: observed_at,
            last_updated_at: observed_at,
        }
    }

    /// Credit one cycle's worth of balance-time.
    ///
    /// # Errors
    ///
    /// - [`AccrualError::Overflow`] if the credit counter would overflow
    pub fn credit_balance(&mut self, balance: BaseUnits, observed_at: UnixSecs) -> Result<()> {
        self.credit = self
            .credit
            .checked_add(Credit::from(balance))
            .ok_or(AccrualError::Overflow)?;
        self.last_balance = balance;
        self.last_updated_at = observed_at;
        Ok(())
    }

    /// Mark the holder absent from the latest snapshot.
    ///
    /// Live balance drops to zero (no further accrual, not eligible for
    /// payout) but earned credit survives until the next distribution that
    /// pays this holder.
    pub fn mark_absent(&mut self, observed_at: UnixSecs) {
        self.last_balance = 0;
        self.last_updated_at = observed_at;
    }

    /// Reset credit to zero after the holder has been paid.
    pub fn reset_credit(&mut self, observed_at: UnixSecs) {
        self.credit = 0;
        self.last_updated_at = observed_at;
    }
}

/// Summary of one applied fold.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldStats {
    /// Distinct holders present in the snapshot.
    pub holders_seen: u64,
    /// Holders that entered the book this cycle.
    pub new_holders: u64,
    /// Known holders absent from the snapshot and zeroed this cycle.
    pub zeroed_holders: u64,
    /// Total credit granted this cycle (equals the observed supply held).
    #[serde(with = "tidemark_types::credit_str")]
    pub credited_total: Credit,
}

/// Outcome of attempting to apply one accrual cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle was folded into the book.
    Applied {
        /// Cycle index that was applied.
        cycle: CycleIndex,
        /// Fold summary.
        stats: FoldStats,
    },
    /// The cycle was at or behind the last applied index and was skipped.
    AlreadyApplied {
        /// Cycle index that was requested.
        cycle: CycleIndex,
        /// Last index actually folded in.
        last_applied: CycleIndex,
    },
}

/// Fold one balance snapshot into the accrual book.
///
/// Snapshot rows are aggregated by address first, so a holder split across
/// several token accounts is credited once with the summed balance.
///
/// # Arguments
///
/// * `records` - The accrual book, keyed by holder address
/// * `balances` - Holder balances observed for this cycle
/// * `observed_at` - Snapshot timestamp recorded on every touched row
///
/// # Errors
///
/// - [`AccrualError::InvalidBalance`] if one holder's summed balance
///   overflows u64
/// - [`AccrualError::Overflow`] if any credit counter overflows
pub fn fold_cycle(
    records: &mut BTreeMap<Address, AccrualRecord>,
    balances: &[HolderBalance],
    observed_at: UnixSecs,
) -> Result<FoldStats> {
    let mut by_address: BTreeMap<&str, BaseUnits> = BTreeMap::new();
    for hb in balances {
        let slot = by_address.entry(hb.address.as_str()).or_insert(0);
        *slot = slot
            .checked_add(hb.balance)
            .ok_or_else(|| AccrualError::InvalidBalance {
                address: hb.address.clone(),
                reason: "summed balance overflows u64".to_string(),
            })?;
    }

    let mut stats = FoldStats {
        holders_seen: by_address.len() as u64,
        ..FoldStats::default()
    };

    for (address, balance) in &by_address {
        let record = records.entry((*address).to_string()).or_insert_with(|| {
            stats.new_holders += 1;
            AccrualRecord::new((*address).to_string(), observed_at)
        });
        record.credit_balance(*balance, observed_at)?;
        stats.credited_total = stats
            .credited_total
            .checked_add(Credit::from(*balance))
            .ok_or(AccrualError::Overflow)?;
    }

    for (address, record) in records.iter_mut() {
        if record.last_balance > 0 && !by_address.contains_key(address.as_str()) {
            record.mark_absent(observed_at);
            stats.zeroed_holders += 1;
        }
    }

    tracing::trace!(
        holders = stats.holders_seen,
        new = stats.new_holders,
        zeroed = stats.zeroed_holders,
        credited = %stats.credited_total,
        "accrual: folded cycle snapshot"
    );

    Ok(stats)
}
