//! Configuration file management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tidemark_ingest::ScanLimits;
use tidemark_payout::EligibilityPolicy;

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Chain RPC settings.
    #[serde(default)]
    pub chain: ChainConfig,
    /// Balance indexer settings.
    #[serde(default)]
    pub indexer: IndexerConfig,
    /// Price oracle settings.
    #[serde(default)]
    pub oracle: OracleConfig,
    /// Accrual cycle settings.
    #[serde(default)]
    pub accrual: AccrualConfig,
    /// Distribution settings.
    #[serde(default)]
    pub distribution: DistributionConfig,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Chain RPC configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the chain provider.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Token mint address whose swap activity is ingested.
    #[serde(default)]
    pub token_mint: String,
    /// Signatures per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Maximum pages walked in one pass.
    #[serde(default = "default_page_ceiling")]
    pub page_ceiling: u32,
    /// Delay between transaction detail fetches.
    #[serde(default = "default_tx_fetch_delay_ms")]
    pub tx_fetch_delay_ms: u64,
    /// Seconds between scheduled ingest passes.
    #[serde(default = "default_ingest_interval")]
    pub ingest_interval_secs: u64,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Retry budget per upstream call.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
}

/// Balance indexer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Base URL of the holder-balance API.
    #[serde(default = "default_indexer_url")]
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Retry budget per upstream call.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
}

/// Price oracle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Base URL of the spot price API.
    #[serde(default = "default_oracle_url")]
    pub base_url: String,
    /// Asset identifier on the price API.
    #[serde(default = "default_coin_id")]
    pub coin_id: String,
    /// Quote currency.
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,
    /// Seconds between price refreshes.
    #[serde(default = "default_oracle_refresh")]
    pub refresh_interval_secs: u64,
    /// Oldest price accepted for a distribution run.
    #[serde(default = "default_payout_staleness")]
    pub max_payout_staleness_secs: u64,
    /// Per-request timeout.
    #[serde(default = "default_oracle_timeout")]
    pub request_timeout_secs: u64,
    /// Retry budget per upstream call.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
}

/// Accrual cycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualConfig {
    /// Cycle length in seconds.
    #[serde(default = "default_cycle_secs")]
    pub cycle_secs: u64,
    /// Snapshot cycles kept before pruning (1008 = one week at 10 min).
    #[serde(default = "default_snapshot_retention")]
    pub snapshot_retention_cycles: u64,
}

/// Distribution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Trading fee captured from observed volume, in basis points.
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u64,
    /// Minimum current balance (base units) for plan inclusion.
    #[serde(default)]
    pub min_balance: u64,
    /// Whale tier floor in basis points of supply.
    #[serde(default = "default_tier_whale")]
    pub tier_whale_bps: u64,
    /// Dolphin tier floor in basis points of supply.
    #[serde(default = "default_tier_dolphin")]
    pub tier_dolphin_bps: u64,
    /// Fish tier floor in basis points of supply.
    #[serde(default = "default_tier_fish")]
    pub tier_fish_bps: u64,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

fn default_page_size() -> usize {
    1000
}

fn default_page_ceiling() -> u32 {
    50
}

fn default_tx_fetch_delay_ms() -> u64 {
    200
}

fn default_ingest_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> usize {
    3
}

fn default_indexer_url() -> String {
    "http://127.0.0.1:8365".to_string()
}

fn default_oracle_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_coin_id() -> String {
    "solana".to_string()
}

fn default_vs_currency() -> String {
    "usd".to_string()
}

fn default_oracle_refresh() -> u64 {
    60
}

fn default_payout_staleness() -> u64 {
    300
}

fn default_oracle_timeout() -> u64 {
    10
}

fn default_cycle_secs() -> u64 {
    tidemark_types::DEFAULT_CYCLE_SECS
}

fn default_snapshot_retention() -> u64 {
    1008
}

fn default_fee_bps() -> u64 {
    100
}

fn default_tier_whale() -> u64 {
    100
}

fn default_tier_dolphin() -> u64 {
    10
}

fn default_tier_fish() -> u64 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            token_mint: String::new(),
            page_size: default_page_size(),
            page_ceiling: default_page_ceiling(),
            tx_fetch_delay_ms: default_tx_fetch_delay_ms(),
            ingest_interval_secs: default_ingest_interval(),
            request_timeout_secs: default_request_timeout(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_url: default_indexer_url(),
            request_timeout_secs: default_request_timeout(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_oracle_url(),
            coin_id: default_coin_id(),
            vs_currency: default_vs_currency(),
            refresh_interval_secs: default_oracle_refresh(),
            max_payout_staleness_secs: default_payout_staleness(),
            request_timeout_secs: default_oracle_timeout(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            cycle_secs: default_cycle_secs(),
            snapshot_retention_cycles: default_snapshot_retention(),
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            fee_bps: default_fee_bps(),
            min_balance: 0,
            tier_whale_bps: default_tier_whale(),
            tier_dolphin_bps: default_tier_dolphin(),
            tier_fish_bps: default_tier_fish(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ChainConfig {
    /// Scan limits derived from this section.
    pub fn scan_limits(&self) -> ScanLimits {
        ScanLimits {
            page_size: self.page_size,
            page_ceiling: self.page_ceiling,
            tx_fetch_delay_ms: self.tx_fetch_delay_ms,
        }
    }
}

impl DistributionConfig {
    /// Eligibility thresholds derived from this section.
    pub fn eligibility_policy(&self) -> EligibilityPolicy {
        EligibilityPolicy {
            min_balance: self.min_balance,
            tier_whale_bps: self.tier_whale_bps,
            tier_dolphin_bps: self.tier_dolphin_bps,
            tier_fish_bps: self.tier_fish_bps,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        // Check env var override first
        if let Ok(dir) = std::env::var("TIDEMARK_DATA_DIR") {
            return PathBuf::from(dir).join("config.toml");
        }
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("TIDEMARK_DATA_DIR") {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Tidemark")
        }
        #[cfg(target_os = "linux")]
        {
            dirs_fallback(".tidemark")
        }
        #[cfg(target_os = "windows")]
        {
            dirs_fallback("Tidemark")
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            dirs_fallback(".tidemark")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/tidemark"))
}
