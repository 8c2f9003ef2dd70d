//! Integration test: Cursor-driven swap ingestion into the ledger.
//!
//! Exercises the scan -> record -> advance pipeline against an in-memory
//! chain:
//! 1. First run establishes a baseline from the head page
//! 2. Later runs count only history strictly newer than the cursor
//! 3. Volume turns into pool revenue at the configured fee rate
//! 4. A pruned cursor records a history gap and resumes from the head
//! 5. An empty provider clears the cursor for a fresh baseline
//!
//! This test uses only the library crates (tidemark-ingest, tidemark-db,
//! tidemark-ledger) without a running daemon process.

use std::collections::HashMap;

use tidemark_db::queries::ingest;
use tidemark_ingest::{IngestBatch, Ingestor, ScanLimits, SignatureInfo, SignatureSource};
use tidemark_ledger::LedgerState;

/// Base timestamp for test scenarios.
const BASE_TIME: u64 = 1_700_000_000;

/// Fee rate applied to observed volume: 100 bps = 1%.
const FEE_BPS: u64 = 100;

/// The watched mint address.
const MINT: &str = "TideMarkMint1111111111111111111111111111111";

/// In-memory chain history, newest first.
struct FakeChain {
    sigs: Vec<SignatureInfo>,
    /// Volume per signature; `None` marks an unparsable transaction.
    volumes: HashMap<String, Option<u64>>,
}

impl FakeChain {
    /// Build a chain from (signature, failed, volume) tuples, newest first.
    fn new(entries: &[(&str, bool, Option<u64>)]) -> Self {
        let mut volumes = HashMap::new();
        let top_slot = entries.len() as u64;
        let sigs = entries
            .iter()
            .enumerate()
            .map(|(i, (sig, failed, volume))| {
                volumes.insert((*sig).to_string(), *volume);
                SignatureInfo {
                    signature: (*sig).to_string(),
                    slot: top_slot - i as u64,
                    failed: *failed,
                    block_time: Some((BASE_TIME - i as u64) as i64),
                }
            })
            .collect();
        Self { sigs, volumes }
    }
}

impl SignatureSource for &FakeChain {
    async fn signatures_page(
        &self,
        _address: &str,
        before: Option<&str>,
        limit: usize,
    ) -> tidemark_ingest::Result<Vec<SignatureInfo>> {
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

    async fn transaction_volume(
        &self,
        signature: &str,
    ) -> tidemark_ingest::Result<Option<u64>> {
        Ok(self.volumes.get(signature).copied().flatten())
    }
}

/// Scan limits with pacing disabled for tests.
fn limits() -> ScanLimits {
    ScanLimits {
        page_size: 10,
        page_ceiling: 5,
        tx_fetch_delay_ms: 0,
    }
}

/// Run one full pass: scan from the stored cursor, then record the batch.
async fn run_pass(
    conn: &rusqlite::Connection,
    chain: &FakeChain,
    now: u64,
) -> (IngestBatch, LedgerState, u64) {
    let cursor = ingest::cursor(conn).expect("read cursor");
    let ingestor = Ingestor::new(chain, MINT, limits());
    let batch = ingestor
        .fetch_new(cursor.last_signature.as_deref())
        .await
        .expect("scan should succeed");
    let (ledger, fee) =
        ingest::advance_cursor(conn, &batch, FEE_BPS, now).expect("record batch");
    (batch, ledger, fee)
}

#[tokio::test]
#[ignore]
async fn cursor_lifecycle_counts_each_swap_exactly_once() {
    let conn = tidemark_db::open_memory().expect("open DB");

    // =========================================================
    // Pass 1: no cursor, the head page becomes the baseline
    // =========================================================
    let chain = FakeChain::new(&[
        ("sig-c", false, Some(2_000_000)),
        ("sig-b", true, Some(9_999_999)), // failed: never fetched
        ("sig-a", false, Some(1_000_000)),
    ]);

    let (batch, ledger, fee) = run_pass(&conn, &chain, BASE_TIME).await;
    assert!(batch.cursor_found);
    assert_eq!(batch.swaps.len(), 2, "failed transactions are not swaps");
    assert_eq!(batch.total_volume, 3_000_000);
    assert_eq!(batch.new_cursor.as_deref(), Some("sig-c"));
    assert_eq!(fee, 30_000, "1% of volume enters the pool");
    assert_eq!(ledger.pool_lamports, 30_000);
    assert_eq!(ledger.cumulative_volume, 3_000_000);

    let cursor = ingest::cursor(&conn).expect("cursor");
    assert_eq!(cursor.last_signature.as_deref(), Some("sig-c"));
    assert_eq!(cursor.history_gaps, 0);

    // =========================================================
    // Pass 2: the chain grew; only the new entries count
    // =========================================================
    let chain = FakeChain::new(&[
        ("sig-e", false, Some(500_000)),
        ("sig-d", false, Some(0)), // measured at zero volume
        ("sig-c", false, Some(2_000_000)),
        ("sig-b", true, Some(9_999_999)),
        ("sig-a", false, Some(1_000_000)),
    ]);

    let (batch, ledger, fee) = run_pass(&conn, &chain, BASE_TIME + 60).await;
    assert!(batch.cursor_found);
    assert_eq!(batch.swaps.len(), 1, "zero-volume entries are not swaps");
    assert_eq!(batch.swaps[0].signature, "sig-e");
    assert_eq!(batch.total_volume, 500_000);
    assert_eq!(fee, 5_000);
    assert_eq!(
        ledger.cumulative_volume, 3_500_000,
        "sig-c must not be counted twice"
    );
    assert_eq!(ledger.pool_lamports, 35_000);

    // =========================================================
    // Pass 3: nothing new; the pass is a no-op
    // =========================================================
    let (batch, ledger, fee) = run_pass(&conn, &chain, BASE_TIME + 120).await;
    assert!(batch.cursor_found);
    assert!(batch.swaps.is_empty());
    assert_eq!(batch.total_volume, 0);
    assert_eq!(fee, 0);
    assert_eq!(ledger.cumulative_volume, 3_500_000);
    assert_eq!(ledger.pool_lamports, 35_000);

    let cursor = ingest::cursor(&conn).expect("cursor");
    assert_eq!(cursor.last_signature.as_deref(), Some("sig-e"));
    assert_eq!(cursor.last_processed_at, Some(BASE_TIME + 120));
}

#[tokio::test]
#[ignore]
async fn unadvanced_cursor_makes_a_crashed_pass_harmless() {
    let conn = tidemark_db::open_memory().expect("open DB");

    let chain = FakeChain::new(&[("sig-a", false, Some(1_000_000))]);
    run_pass(&conn, &chain, BASE_TIME).await;

    let chain = FakeChain::new(&[
        ("sig-b", false, Some(400_000)),
        ("sig-a", false, Some(1_000_000)),
    ]);

    // Simulate a crash after scanning but before recording: the batch is
    // computed and dropped, the cursor untouched.
    let cursor = ingest::cursor(&conn).expect("cursor");
    let ingestor = Ingestor::new(&chain, MINT, limits());
    let lost = ingestor
        .fetch_new(cursor.last_signature.as_deref())
        .await
        .expect("scan");
    assert_eq!(lost.total_volume, 400_000);
    drop(lost);

    // The retry re-scans the same window and records it exactly once.
    let (batch, ledger, _fee) = run_pass(&conn, &chain, BASE_TIME + 60).await;
    assert_eq!(batch.total_volume, 400_000);
    assert_eq!(
        ledger.cumulative_volume,
        1_400_000,
        "reprocessing after a crash must not double count"
    );
}

#[tokio::test]
#[ignore]
async fn pruned_history_records_gap_and_rebaselines() {
    let conn = tidemark_db::open_memory().expect("open DB");

    // Baseline on a chain that will be pruned away.
    let chain = FakeChain::new(&[("sig-c", false, Some(2_000_000))]);
    let (_, ledger, _) = run_pass(&conn, &chain, BASE_TIME).await;
    assert_eq!(ledger.cumulative_volume, 2_000_000);

    // =========================================================
    // The provider pruned sig-c; only newer history remains
    // =========================================================
    let chain = FakeChain::new(&[
        ("sig-g", false, Some(700_000)),
        ("sig-f", false, Some(900_000)),
    ]);

    let (batch, ledger, fee) = run_pass(&conn, &chain, BASE_TIME + 60).await;
    assert!(!batch.cursor_found, "cursor is gone from history");
    assert!(
        batch.swaps.is_empty(),
        "walked history is dropped, never guessed at"
    );
    assert_eq!(fee, 0);
    assert_eq!(
        ledger.cumulative_volume, 2_000_000,
        "the gap is an undercount, not a double count"
    );

    let cursor = ingest::cursor(&conn).expect("cursor");
    assert_eq!(cursor.history_gaps, 1, "the gap is observable");
    assert_eq!(
        cursor.last_signature.as_deref(),
        Some("sig-g"),
        "ingestion resumes from the new head"
    );

    // =========================================================
    // Ingestion continues normally from the re-baselined cursor
    // =========================================================
    let chain = FakeChain::new(&[
        ("sig-h", false, Some(100_000)),
        ("sig-g", false, Some(700_000)),
        ("sig-f", false, Some(900_000)),
    ]);

    let (batch, ledger, _fee) = run_pass(&conn, &chain, BASE_TIME + 120).await;
    assert!(batch.cursor_found);
    assert_eq!(batch.total_volume, 100_000);
    assert_eq!(ledger.cumulative_volume, 2_100_000);

    let cursor = ingest::cursor(&conn).expect("cursor");
    assert_eq!(cursor.history_gaps, 1, "no further gap recorded");
}

#[tokio::test]
#[ignore]
async fn empty_provider_clears_cursor_for_a_fresh_baseline() {
    let conn = tidemark_db::open_memory().expect("open DB");

    let chain = FakeChain::new(&[("sig-a", false, Some(1_000_000))]);
    run_pass(&conn, &chain, BASE_TIME).await;

    // =========================================================
    // The provider answers with no history at all
    // =========================================================
    let chain = FakeChain::new(&[]);
    let (batch, ledger, _fee) = run_pass(&conn, &chain, BASE_TIME + 60).await;
    assert!(!batch.cursor_found);
    assert!(batch.new_cursor.is_none());
    assert_eq!(ledger.cumulative_volume, 1_000_000);

    let cursor = ingest::cursor(&conn).expect("cursor");
    assert!(
        cursor.last_signature.is_none(),
        "an empty provider clears the cursor"
    );
    assert_eq!(cursor.history_gaps, 1);

    // =========================================================
    // The next pass is a first run again: one page, new baseline
    // =========================================================
    let chain = FakeChain::new(&[("sig-x", false, Some(250_000))]);
    let (batch, ledger, fee) = run_pass(&conn, &chain, BASE_TIME + 120).await;
    assert!(batch.cursor_found, "a fresh baseline has no cursor to miss");
    assert_eq!(batch.total_volume, 250_000);
    assert_eq!(fee, 2_500);
    assert_eq!(ledger.cumulative_volume, 1_250_000);

    let cursor = ingest::cursor(&conn).expect("cursor");
    assert_eq!(cursor.last_signature.as_deref(), Some("sig-x"));
}

#[tokio::test]
#[ignore]
async fn dust_volume_counts_without_minting_fees() {
    let conn = tidemark_db::open_memory().expect("open DB");

    // 50 lamports at 100 bps floors to a zero fee.
    let chain = FakeChain::new(&[("sig-dust", false, Some(50))]);
    let (batch, ledger, fee) = run_pass(&conn, &chain, BASE_TIME).await;

    assert_eq!(batch.total_volume, 50);
    assert_eq!(fee, 0, "sub-lamport fees round down to nothing");
    assert_eq!(ledger.pool_lamports, 0);
    assert_eq!(ledger.cumulative_volume, 50, "volume still counts");
    assert_eq!(ledger.cumulative_trading_fees, 0);

    // The cursor still advances; dust is not retried.
    let cursor = ingest::cursor(&conn).expect("cursor");
    assert_eq!(cursor.last_signature.as_deref(), Some("sig-dust"));
}
