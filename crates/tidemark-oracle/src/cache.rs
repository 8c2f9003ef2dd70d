//! Last-known-good price cache.
//!
//! One slot, written by the refresh task whenever a fetch succeeds and by
//! the `dev_set_price` hook. A failed refresh leaves the slot untouched, so
//! readers keep working from the last good value while the feed recovers.

use serde::{Deserialize, Serialize};
use tidemark_types::{MicroUsd, UnixSecs};
use tokio::sync::RwLock;

use crate::{OracleError, Result};

/// A priced instant served to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Spot price in micro-USD per SOL.
    pub price_micro_usd: MicroUsd,
    /// When the price was fetched.
    pub as_of: UnixSecs,
    /// Whether the price is older than the staleness bound.
    pub stale: bool,
}

#[derive(Clone, Copy, Debug)]
struct PricePoint {
    price_micro_usd: MicroUsd,
    fetched_at: UnixSecs,
}

/// Shared cache holding the last successfully fetched price.
#[derive(Debug, Default)]
pub struct PriceCache {
    slot: RwLock<Option<PricePoint>>,
}

impl PriceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly fetched price.
    pub async fn set(&self, price_micro_usd: MicroUsd, fetched_at: UnixSecs) {
        let mut slot = self.slot.write().await;
        *slot = Some(PricePoint {
            price_micro_usd,
            fetched_at,
        });
    }

    /// Read path for display and advisory estimates.
    ///
    /// Always serves the last known good price with its age made explicit;
    /// `stale` is set when the price is older than `max_age_secs`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::PriceUnavailable`] if no price was ever cached
    pub async fn quote_for_display(
        &self,
        now: UnixSecs,
        max_age_secs: u64,
    ) -> Result<PriceQuote> {
        let point = self
            .slot
            .read()
            .await
            .ok_or(OracleError::PriceUnavailable)?;
        let age = now.saturating_sub(point.fetched_at);
        Ok(PriceQuote {
            price_micro_usd: point.price_micro_usd,
            as_of: point.fetched_at,
            stale: age > max_age_secs,
        })
    }

    /// Read path for distribution runs.
    ///
    /// # Errors
    ///
    /// - [`OracleError::PriceUnavailable`] if no price was ever cached
    /// - [`OracleError::StalePrice`] if the price is older than
    ///   `max_age_secs`
    pub async fn quote_for_payout(&self, now: UnixSecs, max_age_secs: u64) -> Result<PriceQuote> {
        let point = self
            .slot
            .read()
            .await
            .ok_or(OracleError::PriceUnavailable)?;
        let age = now.saturating_sub(point.fetched_at);
        if age > max_age_secs {
            return Err(OracleError::StalePrice {
                age_secs: age,
                max_age_secs,
            });
        }
        Ok(PriceQuote {
            price_micro_usd: point.price_micro_usd,
            as_of: point.fetched_at,
            stale: false,
        })
    }
}
