//! tidemark-daemon: the revenue accumulation and distribution daemon.
//!
//! Single OS process running a Tokio async runtime. Three scheduled tasks
//! (swap ingest, balance snapshot, price refresh) share one SQLite database
//! behind a mutex; operators talk to the daemon via JSON-RPC over a Unix
//! socket.

mod commands;
mod config;
mod events;
mod rpc;
mod tasks;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use tidemark_ingest::{Ingestor, RpcChainClient};
use tidemark_oracle::{PriceCache, PriceClient};
use tidemark_payout::StubExecutor;
use tidemark_snapshot::IndexerClient;

use crate::config::DaemonConfig;
use crate::events::EventBus;
use crate::rpc::RpcServer;
use crate::tasks::TaskGuards;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection.
    pub db: Arc<tokio::sync::Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
    /// Last-known-good price cache.
    pub price_cache: Arc<PriceCache>,
    /// Spot price fetcher.
    pub price_client: PriceClient,
    /// Cursor-bounded swap ingestor.
    pub ingestor: Ingestor<RpcChainClient>,
    /// Holder-balance indexer client.
    pub indexer: IndexerClient,
    /// Payout execution seam.
    pub executor: StubExecutor,
    /// Single-flight guards for the tasks.
    pub guards: TaskGuards,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config (tracing needs the log level from it)
    let config = DaemonConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("tidemark={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!("Tidemark daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database
    let db_path = data_dir.join("tidemark.db");
    let conn = tidemark_db::open(&db_path)?;
    let db = Arc::new(tokio::sync::Mutex::new(conn));

    // 3. Event bus and shutdown channel
    let event_bus = EventBus::new(1000);
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    // 4. Upstream clients
    let chain = RpcChainClient::new(
        &config.chain.rpc_url,
        config.chain.request_timeout_secs,
        config.chain.retry_attempts,
    )?;
    let ingestor = Ingestor::new(
        chain,
        config.chain.token_mint.clone(),
        config.chain.scan_limits(),
    );
    let indexer = IndexerClient::new(
        &config.indexer.base_url,
        config.indexer.request_timeout_secs,
        config.indexer.retry_attempts,
    )?;
    let price_client = PriceClient::new(
        &config.oracle.base_url,
        &config.oracle.coin_id,
        &config.oracle.vs_currency,
        config.oracle.request_timeout_secs,
        config.oracle.retry_attempts,
    )?;

    // 5. Build daemon state
    let state = Arc::new(DaemonState {
        db,
        config,
        event_bus,
        price_cache: Arc::new(PriceCache::new()),
        price_client,
        ingestor,
        indexer,
        executor: StubExecutor,
        guards: TaskGuards::default(),
        shutdown_tx: shutdown_tx.clone(),
    });

    // 6. Spawn scheduled tasks
    tokio::spawn(tasks::ingest_loop(state.clone()));
    tokio::spawn(tasks::snapshot_loop(state.clone()));
    tokio::spawn(tasks::oracle_loop(state.clone()));

    // 7. Event log task
    {
        let mut rx = state.event_bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        info!(
                            category = events::categorize_event(&event.event_type),
                            event = %event.event_type,
                            "event"
                        );
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "event log fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    // 8. Start IPC server
    let socket_path = data_dir.join("tidemark.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    state.event_bus.emit(events::Event::now(
        "DaemonStarted",
        serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }),
    ));

    // 9. Run until shutdown
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    info!("Daemon shutting down gracefully");

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
