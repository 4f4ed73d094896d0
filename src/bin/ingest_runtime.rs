//! Production ingestion runtime.
//!
//! Loads configuration from the environment (a `.env` file is honored),
//! opens the SQLite challenge store, and runs the ingestion scheduler
//! until SIGINT. Configuration errors are fatal; everything after
//! startup is logged and survived.

use fitflow::pipeline::{
    Fetcher, HttpGateway, IngestConfig, IngestScheduler, Projector, SqliteChallengeStore,
};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = match IngestConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Refusing to start: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("🚀 Starting fitflow ingestion");
    log::info!("   Contract:       {}", config.contract_address);
    log::info!("   Gateway:        {}", config.gateway_api_url);
    log::info!("   Batch size:     {}", config.tx_fetch_size);
    log::info!("   Poll interval:  {}ms", config.poll_interval_ms);
    log::info!("   Database:       {}", config.db_path);

    let store = match SqliteChallengeStore::open(&config.db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("Failed to open challenge store: {}", e);
            std::process::exit(1);
        }
    };

    let gateway = match HttpGateway::new(&config.gateway_api_url) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            log::error!("Failed to build gateway client: {}", e);
            std::process::exit(1);
        }
    };

    let fetcher = Fetcher::new(gateway, &config.contract_address, config.tx_fetch_size);
    let projector = Projector::new(store);
    let scheduler = Arc::new(IngestScheduler::new(
        fetcher,
        projector,
        config.poll_interval_ms,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut scheduler_task = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => log::info!("SIGINT received, shutting down"),
                Err(e) => log::error!("Failed to listen for shutdown signal: {}", e),
            }
            // Stop future timer fires; an in-flight cycle finishes on
            // its own.
            let _ = shutdown_tx.send(true);
            if let Err(e) = scheduler_task.await {
                log::error!("Scheduler task ended abnormally: {}", e);
            }
        }
        result = &mut scheduler_task => {
            // One-shot mode: the scheduler returns after its single cycle
            if let Err(e) = result {
                log::error!("Scheduler task ended abnormally: {}", e);
            }
        }
    }

    log::info!("✅ fitflow stopped");
}
