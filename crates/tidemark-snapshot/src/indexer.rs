//! Balance indexer HTTP client.
//!
//! Expected endpoint: `GET {base_url}/holders?mint=<mint>` returning a
//! JSON array of `{ "address": "...", "balance": <u64> }` rows. Balances
//! are base units as integers; the indexer may omit zero-balance accounts
//! and tidemark drops any it does include (a zero balance accrues
//! nothing). Duplicate addresses are passed through untouched; the accrual
//! fold aggregates them.

use std::time::Duration;

use serde::Deserialize;
use tidemark_types::{BaseUnits, HolderBalance};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::debug;

use crate::Result;

#[derive(Debug, Deserialize)]
struct HolderRow {
    address: String,
    balance: BaseUnits,
}

/// HTTP client for the balance indexer.
#[derive(Clone, Debug)]
pub struct IndexerClient {
    http: reqwest::Client,
    base_url: String,
    retry_attempts: usize,
}

impl IndexerClient {
    /// Build a client with a bounded request timeout.
    ///
    /// # Errors
    ///
    /// - [`crate::SnapshotError::Http`] if the underlying client cannot be
    ///   built
    pub fn new(base_url: &str, request_timeout_secs: u64, retry_attempts: usize) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_attempts,
        })
    }

    /// Fetch the current holder set for a mint, retrying transient
    /// failures.
    ///
    /// # Errors
    ///
    /// - [`crate::SnapshotError::Http`] when the retry budget is exhausted
    pub async fn fetch_holders(&self, mint: &str) -> Result<Vec<HolderBalance>> {
        let strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(self.retry_attempts);

        let rows = Retry::spawn(strategy, || self.fetch_once(mint)).await?;
        let holders = keep_nonzero(rows);
        debug!(holders = holders.len(), mint, "snapshot: holder set fetched");
        Ok(holders)
    }

    async fn fetch_once(&self, mint: &str) -> Result<Vec<HolderRow>> {
        let url = format!("{}/holders?mint={}", self.base_url, mint);
        let rows: Vec<HolderRow> = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rows)
    }
}

fn keep_nonzero(rows: Vec<HolderRow>) -> Vec<HolderBalance> {
    rows.into_iter()
        .filter(|row| row.balance > 0)
        .map(|row| HolderBalance {
            address: row.address,
            balance: row.balance,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_parse() {
        let json = r#"[
            { "address": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin", "balance": 1500000 },
            { "address": "4Nd1mYvM3rPZ3F1zXqZqXw8hQqkk8FuuXPDKS1S2W9Vx", "balance": 42 }
        ]"#;
        let rows: Vec<HolderRow> = serde_json::from_str(json).expect("parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].balance, 1_500_000);
    }

    #[test]
    fn test_zero_balances_dropped() {
        let rows = vec![
            HolderRow {
                address: "alice".to_string(),
                balance: 100,
            },
            HolderRow {
                address: "empty".to_string(),
                balance: 0,
            },
        ];
        let holders = keep_nonzero(rows);
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].address, "alice");
    }

    #[test]
    fn test_duplicates_pass_through() {
        // Aggregation is the accrual fold's job, not the client's.
        let rows = vec![
            HolderRow {
                address: "alice".to_string(),
                balance: 60,
            },
            HolderRow {
                address: "alice".to_string(),
                balance: 40,
            },
        ];
        assert_eq!(keep_nonzero(rows).len(), 2);
    }

    #[test]
    fn test_malformed_rows_rejected() {
        let json = r#"[{ "address": "x" }]"#;
        assert!(serde_json::from_str::<Vec<HolderRow>>(json).is_err());
        let json = r#"{ "holders": [] }"#;
        assert!(serde_json::from_str::<Vec<HolderRow>>(json).is_err());
    }
}
