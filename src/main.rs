mod api;
mod commands;
mod config;
mod engine;
mod error;
mod fetcher;
mod notify;
mod scheduler;
mod service;
mod store;
mod types;

#[cfg(test)]
mod testutil;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::routes::router;
use crate::config::Config;
use crate::engine::{is_long_interval, AlertEngine};
use crate::error::Result;
use crate::fetcher::HttpFetcher;
use crate::notify::AnyNotifier;
use crate::scheduler::Scheduler;
use crate::service::AlertService;
use crate::store::Store;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    info!(
        "Starting oil price monitor: policy={} threshold=${:.2} interval={}m backend={:?} subject={}",
        cfg.policy, cfg.default_threshold, cfg.default_interval_minutes, cfg.backend, cfg.subject,
    );
    if cfg.user_id.is_none() {
        warn!("DISCORD_USER_ID not set; alerts will not mention anyone");
    }

    // --- Collaborators ---
    let store = Store::open(&cfg).await?;
    let fetcher = HttpFetcher::new(cfg.api_url.clone())?;
    let notifier = AnyNotifier::from_config(&cfg)?;

    let service = Arc::new(AlertService::new(
        AlertEngine::new(cfg.policy),
        fetcher,
        store,
        notifier,
        cfg.subject.clone(),
        cfg.cycle_updates,
        cfg.default_interval_minutes,
    ));

    // A persisted interval from an earlier `$interval` wins over the env default.
    let minutes = service.sync_interval().await?;
    if is_long_interval(minutes) {
        warn!("Check interval is {minutes} minutes; price changes may be missed");
    }

    // --- Monitoring loop ---
    let scheduler = Scheduler::new(Arc::clone(&service));
    tokio::spawn(async move { scheduler.run().await });

    // --- HTTP API server ---
    let app = router(service);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
