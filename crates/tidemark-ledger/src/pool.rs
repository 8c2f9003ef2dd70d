//! Ledger state and pool mutations.
//!
//! All amounts are lamports. The pool grows from two revenue streams:
//!
//! - **Trading fees**: `volume * fee_bps / 10_000`, derived from ingested
//!   swap volume
//! - **Reported fees**: amounts pushed in via `report_revenue`
//!
//! and shrinks only when a distribution commits. Lifetime counters are
//! monotonic. A commit locks the per-stream baselines at their current
//! cumulative values, so each pool window is auditable as
//! `cumulative - baseline` without rewriting history.

use serde::{Deserialize, Serialize};
use tidemark_types::{Lamports, UnixSecs, BPS_DENOMINATOR};

use crate::{LedgerError, Result};

/// Which stream a revenue amount came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueSource {
    /// Fees derived from observed swap volume.
    TradingFees,
    /// Revenue reported externally over RPC.
    ReportedFees,
}

/// Compute the fee owed on a volume at a basis-point rate.
///
/// Floor division; sub-lamport dust rounds down to zero.
///
/// # Errors
///
/// - [`LedgerError::InvalidFeeRate`] if `fee_bps` exceeds 10_000
pub fn fee_from_volume(volume: Lamports, fee_bps: u64) -> Result<Lamports> {
    if fee_bps > BPS_DENOMINATOR {
        return Err(LedgerError::InvalidFeeRate { bps: fee_bps });
    }
    let fee = u128::from(volume) * u128::from(fee_bps) / u128::from(BPS_DENOMINATOR);
    // fee <= volume because fee_bps <= denominator, so this cannot fail.
    u64::try_from(fee).map_err(|_| LedgerError::Overflow)
}

/// Revenue ledger: the pool plus lifetime counters for both streams.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Undistributed revenue currently in the pool.
    pub pool_lamports: Lamports,
    /// Lifetime lamports paid out across all committed distributions.
    pub cumulative_distributed: Lamports,
    /// Lifetime swap volume observed by the ingestor.
    pub cumulative_volume: Lamports,
    /// Lifetime trading fees derived from volume.
    pub cumulative_trading_fees: Lamports,
    /// Lifetime revenue reported over RPC.
    pub cumulative_reported_fees: Lamports,
    /// Trading-fee counter value locked at the last commit.
    pub volume_baseline: Lamports,
    /// Reported-revenue counter value locked at the last commit.
    pub reported_baseline: Lamports,
    /// When baselines were last locked (0 = never).
    pub last_reset_at: UnixSecs,
    /// When any field last changed.
    pub updated_at: UnixSecs,
}

impl LedgerState {
    /// Bump the lifetime volume counter.
    ///
    /// Volume alone moves no money; fee derivation and pool credit go
    /// through [`fee_from_volume`] and [`LedgerState::record_revenue`].
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ZeroAmount`] if `delta` is zero
    /// - [`LedgerError::Overflow`] if the counter overflows
    pub fn observe_volume(&mut self, delta: Lamports, now: UnixSecs) -> Result<()> {
        if delta == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        self.cumulative_volume = self
            .cumulative_volume
            .checked_add(delta)
            .ok_or(LedgerError::Overflow)?;
        self.updated_at = now;
        Ok(())
    }

    /// Credit revenue into the pool from one of the two streams.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ZeroAmount`] if `amount` is zero
    /// - [`LedgerError::Overflow`] if a lifetime counter overflows
    pub fn record_revenue(
        &mut self,
        amount: Lamports,
        source: RevenueSource,
        now: UnixSecs,
    ) -> Result<()> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        match source {
            RevenueSource::TradingFees => {
                self.cumulative_trading_fees = self
                    .cumulative_trading_fees
                    .checked_add(amount)
                    .ok_or(LedgerError::Overflow)?;
            }
            RevenueSource::ReportedFees => {
                self.cumulative_reported_fees = self
                    .cumulative_reported_fees
                    .checked_add(amount)
                    .ok_or(LedgerError::Overflow)?;
            }
        }
        self.pool_lamports = self
            .pool_lamports
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.updated_at = now;

        tracing::debug!(
            amount,
            source = ?source,
            pool = self.pool_lamports,
            "ledger: revenue credited"
        );
        Ok(())
    }

    /// Apply a committed distribution to the ledger.
    ///
    /// Fails closed: if the pool cannot cover `amount_paid` nothing
    /// changes. On success the paid amount leaves the pool (any rounding
    /// remainder stays in), the distributed counter grows by exactly the
    /// paid amount, and both stream baselines lock at their current
    /// cumulative values.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ZeroAmount`] if `amount_paid` is zero
    /// - [`LedgerError::InsufficientPool`] if `amount_paid` exceeds the pool
    /// - [`LedgerError::Overflow`] if the distributed counter overflows
    pub fn commit_distribution(&mut self, amount_paid: Lamports, now: UnixSecs) -> Result<()> {
        if amount_paid == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let remaining =
            self.pool_lamports
                .checked_sub(amount_paid)
                .ok_or(LedgerError::InsufficientPool {
                    requested: amount_paid,
                    available: self.pool_lamports,
                })?;
        self.cumulative_distributed = self
            .cumulative_distributed
            .checked_add(amount_paid)
            .ok_or(LedgerError::Overflow)?;
        self.pool_lamports = remaining;
        self.volume_baseline = self.cumulative_trading_fees;
        self.reported_baseline = self.cumulative_reported_fees;
        self.last_reset_at = now;
        self.updated_at = now;

        tracing::info!(
            amount_paid,
            remainder = self.pool_lamports,
            "ledger: distribution committed, baselines locked"
        );
        Ok(())
    }

    /// Revenue accumulated since the last commit, across both streams.
    pub fn fees_since_reset(&self) -> Lamports {
        let trading = self
            .cumulative_trading_fees
            .saturating_sub(self.volume_baseline);
        let reported = self
            .cumulative_reported_fees
            .saturating_sub(self.reported_baseline);
        trading.saturating_add(reported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_from_volume() {
        // 1 SOL of volume at 100 bps (1%) = 0.01 SOL.
        assert_eq!(fee_from_volume(1_000_000_000, 100).expect("fee"), 10_000_000);
        assert_eq!(fee_from_volume(10_000, 50).expect("fee"), 50);
    }

    #[test]
    fn test_fee_floors_to_zero() {
        assert_eq!(fee_from_volume(99, 100).expect("fee"), 0);
    }

    #[test]
    fn test_fee_rate_above_denominator_rejected() {
        assert!(matches!(
            fee_from_volume(1000, 10_001),
            Err(LedgerError::InvalidFeeRate { bps: 10_001 })
        ));
    }

    #[test]
    fn test_fee_full_rate_no_overflow() {
        assert_eq!(fee_from_volume(u64::MAX, 10_000).expect("fee"), u64::MAX);
    }

    #[test]
    fn test_observe_volume_monotonic() {
        let mut ledger = LedgerState::default();
        ledger.observe_volume(1_000, 10).expect("observe");
        ledger.observe_volume(500, 11).expect("observe");

        assert_eq!(ledger.cumulative_volume, 1_500);
        assert_eq!(ledger.pool_lamports, 0, "volume alone moves no money");
    }

    #[test]
    fn test_observe_zero_volume_rejected() {
        let mut ledger = LedgerState::default();
        assert!(ledger.observe_volume(0, 10).is_err());
    }

    #[test]
    fn test_record_trading_fees() {
        let mut ledger = LedgerState::default();
        ledger
            .record_revenue(10_000_000, RevenueSource::TradingFees, 10)
            .expect("record");

        assert_eq!(ledger.pool_lamports, 10_000_000);
        assert_eq!(ledger.cumulative_trading_fees, 10_000_000);
        assert_eq!(ledger.cumulative_reported_fees, 0);
    }

    #[test]
    fn test_record_reported_fees() {
        let mut ledger = LedgerState::default();
        ledger
            .record_revenue(5_000, RevenueSource::ReportedFees, 10)
            .expect("record");

        assert_eq!(ledger.pool_lamports, 5_000);
        assert_eq!(ledger.cumulative_reported_fees, 5_000);
        assert_eq!(ledger.cumulative_trading_fees, 0);
    }

    #[test]
    fn test_record_zero_revenue_rejected() {
        let mut ledger = LedgerState::default();
        assert!(ledger
            .record_revenue(0, RevenueSource::TradingFees, 10)
            .is_err());
    }

    #[test]
    fn test_commit_distribution() {
        let mut ledger = LedgerState::default();
        ledger
            .record_revenue(10_000, RevenueSource::ReportedFees, 10)
            .expect("record");
        ledger.commit_distribution(7_500, 20).expect("commit");

        // Remainder stays in the pool.
        assert_eq!(ledger.pool_lamports, 2_500);
        assert_eq!(ledger.cumulative_distributed, 7_500);
        assert_eq!(ledger.last_reset_at, 20);
        assert_eq!(ledger.reported_baseline, 10_000);
        assert_eq!(ledger.fees_since_reset(), 0);
    }

    #[test]
    fn test_commit_exceeding_pool_fails_closed() {
        let mut ledger = LedgerState::default();
        ledger
            .record_revenue(10_000, RevenueSource::ReportedFees, 10)
            .expect("record");

        let err = ledger.commit_distribution(10_001, 20);
        assert!(matches!(
            err,
            Err(LedgerError::InsufficientPool {
                requested: 10_001,
                available: 10_000
            })
        ));
        // Nothing changed.
        assert_eq!(ledger.pool_lamports, 10_000);
        assert_eq!(ledger.cumulative_distributed, 0);
        assert_eq!(ledger.reported_baseline, 0);
        assert_eq!(ledger.updated_at, 10);
    }

    #[test]
    fn test_baselines_window_accounting() {
        let mut ledger = LedgerState::default();
        ledger.observe_volume(1_000_000_000, 10).expect("observe");
        ledger
            .record_revenue(10_000_000, RevenueSource::TradingFees, 10)
            .expect("trading");
        ledger
            .record_revenue(3_000, RevenueSource::ReportedFees, 11)
            .expect("reported");
        assert_eq!(ledger.fees_since_reset(), 10_003_000);

        ledger.commit_distribution(10_003_000, 12).expect("commit");
        assert_eq!(ledger.fees_since_reset(), 0);

        // Post-commit revenue opens a new window; history is intact.
        ledger
            .record_revenue(500, RevenueSource::ReportedFees, 13)
            .expect("reported");
        assert_eq!(ledger.fees_since_reset(), 500);
        assert_eq!(ledger.cumulative_reported_fees, 3_500);
        assert_eq!(ledger.cumulative_trading_fees, 10_000_000);
    }
}
