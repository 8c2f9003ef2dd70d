//! Cursor-bounded signature scan.
//!
//! One pass walks signature pages newest-to-oldest, stopping at the first
//! page containing the recorded cursor signature. Everything strictly newer
//! than the cursor is fetched in detail and measured. The pass never
//! advances any state itself; it returns an [`IngestBatch`] for the caller
//! to record and the cursor to advance to, in one transaction.
//!
//! Cursor rules:
//!
//! - No cursor (first run): exactly one page establishes the baseline.
//! - Cursor found mid-page: only the entries above it are returned.
//! - History exhausted without finding the cursor (provider pruned it):
//!   `cursor_found = false`, the walked history is dropped (counting it
//!   could double-count transactions recorded before the prune), and the
//!   caller resumes from the new head. The undercount is deliberate and
//!   observable.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidemark_types::Lamports;
use tracing::{debug, info, warn};

use crate::{IngestError, Result};

/// One entry from a `getSignaturesForAddress` page, newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    /// Transaction signature (base58).
    pub signature: String,
    /// Slot the transaction landed in.
    pub slot: u64,
    /// Whether the transaction failed (`err` non-null in the listing).
    pub failed: bool,
    /// Block time if the provider reports one.
    pub block_time: Option<i64>,
}

/// A successfully measured swap transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapObservation {
    /// Transaction signature.
    pub signature: String,
    /// Slot the transaction landed in.
    pub slot: u64,
    /// Measured volume in lamports.
    pub volume_lamports: Lamports,
}

/// Everything one ingest pass produces.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IngestBatch {
    /// Measured swaps, newest first.
    pub swaps: Vec<SwapObservation>,
    /// Chain head signature to advance the cursor to; `None` when the
    /// provider returned no history at all.
    pub new_cursor: Option<String>,
    /// False when the recorded cursor was not found in available history.
    pub cursor_found: bool,
    /// Sum of swap volumes in this batch.
    pub total_volume: Lamports,
    /// Signature pages walked during the scan.
    pub pages_scanned: u32,
}

/// Scan bounds and pacing.
#[derive(Clone, Copy, Debug)]
pub struct ScanLimits {
    /// Signatures per page request.
    pub page_size: usize,
    /// Page depth beyond which the scan logs an operational anomaly.
    pub page_ceiling: u32,
    /// Fixed delay between transaction detail fetches, in milliseconds.
    pub tx_fetch_delay_ms: u64,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            page_size: 1000,
            page_ceiling: 50,
            tx_fetch_delay_ms: 200,
        }
    }
}

/// Chain access needed by a scan.
///
/// Implementors provide the actual RPC I/O; tests substitute an in-memory
/// chain.
pub trait SignatureSource {
    /// Fetch one signature page for `address`, optionally strictly older
    /// than `before`, newest first.
    fn signatures_page(
        &self,
        address: &str,
        before: Option<&str>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<SignatureInfo>>> + Send;

    /// Fetch one transaction and measure its volume.
    ///
    /// `Ok(None)` means the transaction is unavailable or unparsable and
    /// should be skipped; transport failure is an `Err` and aborts the
    /// pass.
    fn transaction_volume(
        &self,
        signature: &str,
    ) -> impl std::future::Future<Output = Result<Option<Lamports>>> + Send;
}

/// Cursor-driven ingestor over a [`SignatureSource`].
#[derive(Debug)]
pub struct Ingestor<S> {
    source: S,
    address: String,
    limits: ScanLimits,
}

impl<S: SignatureSource> Ingestor<S> {
    /// Create an ingestor watching one address (the token mint).
    pub fn new(source: S, address: impl Into<String>, limits: ScanLimits) -> Self {
        Self {
            source,
            address: address.into(),
            limits,
        }
    }

    /// Run one ingest pass from the recorded cursor.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Http`] / [`IngestError::Rpc`] when a page or
    ///   detail fetch fails after retries; the pass aborts and the cursor
    ///   must stay untouched
    /// - [`IngestError::Overflow`] if the batch volume overflows
    pub async fn fetch_new(&self, cursor: Option<&str>) -> Result<IngestBatch> {
        let (collected, new_cursor, cursor_found, pages_scanned) = self.scan(cursor).await?;

        let mut swaps = Vec::new();
        let mut total_volume: Lamports = 0;
        let mut first_detail = true;
        for entry in &collected {
            if entry.failed {
                // Failed transactions contribute zero volume.
                continue;
            }
            if !first_detail && self.limits.tx_fetch_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.limits.tx_fetch_delay_ms)).await;
            }
            first_detail = false;

            match self.source.transaction_volume(&entry.signature).await? {
                Some(volume) if volume > 0 => {
                    total_volume = total_volume
                        .checked_add(volume)
                        .ok_or(IngestError::Overflow)?;
                    swaps.push(SwapObservation {
                        signature: entry.signature.clone(),
                        slot: entry.slot,
                        volume_lamports: volume,
                    });
                }
                Some(_) => {}
                None => {
                    debug!(
                        signature = %entry.signature,
                        "ingest: transaction unavailable or unparsable, skipped"
                    );
                }
            }
        }

        info!(
            swaps = swaps.len(),
            total_volume,
            pages_scanned,
            cursor_found,
            "ingest: pass complete"
        );

        Ok(IngestBatch {
            swaps,
            new_cursor,
            cursor_found,
            total_volume,
            pages_scanned,
        })
    }

    /// Walk pages until the cursor (or history) is exhausted.
    ///
    /// Returns `(strictly newer entries, head signature, cursor_found,
    /// pages scanned)`.
    async fn scan(
        &self,
        cursor: Option<&str>,
    ) -> Result<(Vec<SignatureInfo>, Option<String>, bool, u32)> {
        let mut collected: Vec<SignatureInfo> = Vec::new();
        let mut new_cursor: Option<String> = None;
        let mut cursor_found = cursor.is_none();
        let mut pages_scanned: u32 = 0;
        let mut before: Option<String> = None;
        let mut ceiling_warned = false;

        loop {
            let page = self
                .source
                .signatures_page(&self.address, before.as_deref(), self.limits.page_size)
                .await?;
            let Some(first) = page.first() else {
                break; // history exhausted
            };
            pages_scanned += 1;
            if pages_scanned > self.limits.page_ceiling && !ceiling_warned {
                warn!(
                    pages = pages_scanned,
                    ceiling = self.limits.page_ceiling,
                    "ingest: scan depth beyond page ceiling, continuing"
                );
                ceiling_warned = true;
            }

            if new_cursor.is_none() {
                new_cursor = Some(first.signature.clone());
            }

            let mut found_in_page = false;
            for entry in &page {
                if cursor == Some(entry.signature.as_str()) {
                    cursor_found = true;
                    found_in_page = true;
                    break;
                }
                collected.push(entry.clone());
            }
            if found_in_page || cursor.is_none() {
                // Cursor met, or first-run baseline is the single head page.
                break;
            }
            before = page.last().map(|entry| entry.signature.clone());
        }

        if !cursor_found {
            warn!(
                cursor = ?cursor,
                walked = collected.len(),
                "ingest: cursor not found in available history, resuming from head"
            );
            // Walked history may overlap what was already counted before
            // the provider pruned; dropping it keeps the ledger an
            // undercount rather than a double count.
            collected.clear();
        }

        Ok((collected, new_cursor, cursor_found, pages_scanned))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    struct FakeChain {
        /// Full signature history, newest first.
        sigs: Vec<SignatureInfo>,
        /// Volume per signature; missing or `None` = unparsable.
        volumes: HashMap<String, Option<Lamports>>,
        /// Detail fetches observed, in order.
        detail_calls: Mutex<Vec<String>>,
        /// Signature whose detail fetch fails with a transport error.
        fail_detail_for: Option<String>,
    }

    impl FakeChain {
        fn new(entries: &[(&str, u64, bool, Option<u64>)]) -> Self {
            let mut volumes = HashMap::new();
            let sigs = entries
                .iter()
                .enumerate()
                .map(|(i, (sig, slot, failed, volume))| {
                    volumes.insert(sig.to_string(), *volume);
                    SignatureInfo {
                        signature: sig.to_string(),
                        slot: *slot,
                        failed: *failed,
                        block_time: Some(1_700_000_000 - i as i64),
                    }
                })
                .collect();
            Self {
                sigs,
                volumes,
                detail_calls: Mutex::new(Vec::new()),
                fail_detail_for: None,
            }
        }

        fn detail_calls(&self) -> Vec<String> {
            self.detail_calls.lock().expect("lock").clone()
        }
    }

    impl SignatureSource for &FakeChain {
        async fn signatures_page(
            &self,
            _address: &str,
            before: Option<&str>,
            limit: usize,
        ) -> Result<Vec<SignatureInfo>> {
            let start = match before {
                None => 0,
                Some(b) => self
                    .sigs
                    .iter()
                    .position(|s| s.signature == b)
                    .map(|i| i + 1)
                    .unwrap_or(self.sigs.len()),
            };
            Ok(self.sigs.iter().skip(start).take(limit).cloned().collect())
        }

        async fn transaction_volume(&self, signature: &str) -> Result<Option<Lamports>> {
            self.detail_calls
                .lock()
                .expect("lock")
                .push(signature.to_string());
            if self.fail_detail_for.as_deref() == Some(signature) {
                return Err(IngestError::Rpc("detail fetch failed".to_string()));
            }
            Ok(self.volumes.get(signature).copied().flatten())
        }
    }

    fn limits(page_size: usize) -> ScanLimits {
        ScanLimits {
            page_size,
            page_ceiling: 50,
            tx_fetch_delay_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_first_run_is_single_page_baseline() {
        let chain = FakeChain::new(&[
            ("sig-a", 100, false, Some(500)),
            ("sig-b", 99, false, Some(300)),
            ("sig-c", 98, false, Some(200)),
            ("sig-d", 97, false, Some(100)),
        ]);
        let ingestor = Ingestor::new(&chain, "Mint111", limits(2));

        let batch = ingestor.fetch_new(None).await.expect("batch");

        assert_eq!(batch.pages_scanned, 1, "first run must not backfill");
        assert_eq!(batch.new_cursor.as_deref(), Some("sig-a"));
        assert!(batch.cursor_found);
        assert_eq!(batch.swaps.len(), 2);
        assert_eq!(batch.total_volume, 800);
    }

    #[tokio::test]
    async fn test_incremental_pass_collects_strictly_newer() {
        let chain = FakeChain::new(&[
            ("sig-a", 100, false, Some(500)),
            ("sig-b", 99, false, Some(300)),
            ("sig-c", 98, false, Some(200)),
            ("sig-d", 97, false, Some(100)),
        ]);
        let ingestor = Ingestor::new(&chain, "Mint111", limits(2));

        let batch = ingestor.fetch_new(Some("sig-c")).await.expect("batch");

        assert!(batch.cursor_found);
        assert_eq!(batch.new_cursor.as_deref(), Some("sig-a"));
        let sigs: Vec<&str> = batch.swaps.iter().map(|s| s.signature.as_str()).collect();
        assert_eq!(sigs, vec!["sig-a", "sig-b"], "cursor itself is excluded");
        assert_eq!(batch.total_volume, 800);
        assert_eq!(batch.pages_scanned, 2);
    }

    #[tokio::test]
    async fn test_no_new_activity_is_empty_and_idempotent() {
        let chain = FakeChain::new(&[
            ("sig-a", 100, false, Some(500)),
            ("sig-b", 99, false, Some(300)),
        ]);
        let ingestor = Ingestor::new(&chain, "Mint111", limits(10));

        let batch = ingestor.fetch_new(Some("sig-a")).await.expect("batch");

        assert!(batch.cursor_found);
        assert!(batch.swaps.is_empty());
        assert_eq!(batch.total_volume, 0);
        // Cursor re-advances to itself: a no-op for the caller.
        assert_eq!(batch.new_cursor.as_deref(), Some("sig-a"));
        assert!(chain.detail_calls().is_empty(), "nothing should be fetched");
    }

    #[tokio::test]
    async fn test_pruned_cursor_resumes_from_head_with_gap() {
        let chain = FakeChain::new(&[
            ("sig-a", 100, false, Some(500)),
            ("sig-b", 99, false, Some(300)),
        ]);
        let ingestor = Ingestor::new(&chain, "Mint111", limits(1));

        let batch = ingestor
            .fetch_new(Some("sig-long-gone"))
            .await
            .expect("batch");

        assert!(!batch.cursor_found);
        assert_eq!(batch.new_cursor.as_deref(), Some("sig-a"));
        assert!(
            batch.swaps.is_empty(),
            "walked history is dropped, not double counted"
        );
        assert_eq!(batch.total_volume, 0);
        assert!(batch.pages_scanned >= 2, "history was fully walked");
    }

    #[tokio::test]
    async fn test_failed_transactions_skip_detail_fetch() {
        let chain = FakeChain::new(&[
            ("sig-ok", 100, false, Some(500)),
            ("sig-failed", 99, true, Some(9_999)),
            ("sig-old", 98, false, Some(100)),
        ]);
        let ingestor = Ingestor::new(&chain, "Mint111", limits(10));

        let batch = ingestor.fetch_new(Some("sig-old")).await.expect("batch");

        assert_eq!(batch.swaps.len(), 1);
        assert_eq!(batch.total_volume, 500);
        assert!(
            !chain.detail_calls().contains(&"sig-failed".to_string()),
            "failed tx must not be fetched"
        );
    }

    #[tokio::test]
    async fn test_unparsable_transaction_skipped() {
        let chain = FakeChain::new(&[
            ("sig-a", 100, false, Some(500)),
            ("sig-weird", 99, false, None),
            ("sig-old", 98, false, Some(100)),
        ]);
        let ingestor = Ingestor::new(&chain, "Mint111", limits(10));

        let batch = ingestor.fetch_new(Some("sig-old")).await.expect("batch");

        let sigs: Vec<&str> = batch.swaps.iter().map(|s| s.signature.as_str()).collect();
        assert_eq!(sigs, vec!["sig-a"]);
        assert_eq!(batch.total_volume, 500);
    }

    #[tokio::test]
    async fn test_zero_volume_transaction_is_not_a_swap() {
        let chain = FakeChain::new(&[
            ("sig-a", 100, false, Some(0)),
            ("sig-old", 98, false, Some(100)),
        ]);
        let ingestor = Ingestor::new(&chain, "Mint111", limits(10));

        let batch = ingestor.fetch_new(Some("sig-old")).await.expect("batch");

        assert!(batch.swaps.is_empty());
        assert_eq!(batch.total_volume, 0);
    }

    #[tokio::test]
    async fn test_detail_transport_error_aborts_pass() {
        let mut chain = FakeChain::new(&[
            ("sig-a", 100, false, Some(500)),
            ("sig-b", 99, false, Some(300)),
            ("sig-old", 98, false, Some(100)),
        ]);
        chain.fail_detail_for = Some("sig-b".to_string());
        let ingestor = Ingestor::new(&chain, "Mint111", limits(10));

        let result = ingestor.fetch_new(Some("sig-old")).await;
        assert!(matches!(result, Err(IngestError::Rpc(_))));
    }

    #[tokio::test]
    async fn test_empty_chain_first_run() {
        let chain = FakeChain::new(&[]);
        let ingestor = Ingestor::new(&chain, "Mint111", limits(10));

        let batch = ingestor.fetch_new(None).await.expect("batch");

        assert!(batch.swaps.is_empty());
        assert_eq!(batch.new_cursor, None);
        assert!(batch.cursor_found);
        assert_eq!(batch.pages_scanned, 0);
    }

    #[tokio::test]
    async fn test_empty_chain_with_cursor_reports_gap() {
        let chain = FakeChain::new(&[]);
        let ingestor = Ingestor::new(&chain, "Mint111", limits(10));

        let batch = ingestor.fetch_new(Some("sig-gone")).await.expect("batch");

        assert!(!batch.cursor_found);
        assert_eq!(batch.new_cursor, None);
        assert!(batch.swaps.is_empty());
    }

    #[tokio::test]
    async fn test_deep_scan_crosses_page_ceiling() {
        // 6 entries, 1-entry pages, ceiling of 2: the scan warns but keeps
        // walking until it finds the cursor.
        let chain = FakeChain::new(&[
            ("sig-1", 105, false, Some(10)),
            ("sig-2", 104, false, Some(10)),
            ("sig-3", 103, false, Some(10)),
            ("sig-4", 102, false, Some(10)),
            ("sig-5", 101, false, Some(10)),
            ("sig-6", 100, false, Some(10)),
        ]);
        let ingestor = Ingestor::new(
            &chain,
            "Mint111",
            ScanLimits {
                page_size: 1,
                page_ceiling: 2,
                tx_fetch_delay_ms: 0,
            },
        );

        let batch = ingestor.fetch_new(Some("sig-6")).await.expect("batch");

        assert!(batch.cursor_found);
        assert_eq!(batch.swaps.len(), 5);
        assert_eq!(batch.pages_scanned, 6);
    }
}
