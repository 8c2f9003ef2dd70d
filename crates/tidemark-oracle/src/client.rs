//! HTTP price fetcher.
//!
//! Speaks the common `/simple/price?ids=<coin>&vs_currencies=<fiat>` shape
//! (CoinGecko and compatible mirrors). Every fetch has a bounded timeout
//! and a capped, jittered exponential backoff; when the budget is exhausted
//! the caller leaves the cache untouched and waits for the next refresh
//! tick.
//!
//! The upstream quotes in fractional USD. That float is converted to
//! integer micro-USD at the edge; everything downstream is integer math.

use std::collections::HashMap;
use std::time::Duration;

use tidemark_types::{MicroUsd, MICRO_USD_PER_USD};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, warn};

use crate::{OracleError, Result};

/// Spot-price response body: coin id -> currency -> price.
type SpotResponse = HashMap<String, HashMap<String, f64>>;

/// HTTP client for the spot price endpoint.
#[derive(Clone, Debug)]
pub struct PriceClient {
    http: reqwest::Client,
    base_url: String,
    coin_id: String,
    vs_currency: String,
    retry_attempts: usize,
}

impl PriceClient {
    /// Build a client with a bounded request timeout.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Http`] if the underlying client cannot be built
    pub fn new(
        base_url: &str,
        coin_id: &str,
        vs_currency: &str,
        request_timeout_secs: u64,
        retry_attempts: usize,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            coin_id: coin_id.to_string(),
            vs_currency: vs_currency.to_string(),
            retry_attempts,
        })
    }

    /// Fetch the spot price, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Http`] when the retry budget is exhausted
    /// - [`OracleError::MalformedResponse`] if the pair is missing
    /// - [`OracleError::InvalidUpstreamPrice`] for zero/NaN prices
    pub async fn fetch_price(&self) -> Result<MicroUsd> {
        let strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(self.retry_attempts);

        let price = Retry::spawn(strategy, || self.fetch_once()).await?;
        debug!(price_micro_usd = price, coin = %self.coin_id, "oracle: spot price fetched");
        Ok(price)
    }

    async fn fetch_once(&self) -> Result<MicroUsd> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.base_url, self.coin_id, self.vs_currency
        );

        let response = self.http.get(&url).send().await?;
        let response = match response.error_for_status() {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "oracle: price endpoint returned an error status");
                return Err(e.into());
            }
        };

        let body: SpotResponse = response.json().await?;
        extract_price(&body, &self.coin_id, &self.vs_currency)
    }
}

/// Pull the requested pair out of a spot response and convert to micro-USD.
///
/// # Errors
///
/// - [`OracleError::MalformedResponse`] if the pair is absent
/// - [`OracleError::InvalidUpstreamPrice`] for non-finite or non-positive
///   prices, or prices too large for micro-USD in u64
pub fn extract_price(body: &SpotResponse, coin_id: &str, vs_currency: &str) -> Result<MicroUsd> {
    let usd = body
        .get(coin_id)
        .and_then(|pairs| pairs.get(vs_currency))
        .copied()
        .ok_or_else(|| {
            OracleError::MalformedResponse(format!("missing pair {coin_id}/{vs_currency}"))
        })?;
    micro_usd_from_f64(usd)
}

/// Convert an upstream fractional-USD price to integer micro-USD.
fn micro_usd_from_f64(usd: f64) -> Result<MicroUsd> {
    if !usd.is_finite() || usd <= 0.0 {
        return Err(OracleError::InvalidUpstreamPrice(format!("{usd}")));
    }
    let micro = (usd * MICRO_USD_PER_USD as f64).round();
    if micro > u64::MAX as f64 {
        return Err(OracleError::InvalidUpstreamPrice(format!("{usd}")));
    }
    Ok(micro as u64)
}
