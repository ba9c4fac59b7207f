//! Clinical Data Dictionary service (cdd-service) - Main entry point
//!
//! Startup order: configuration, logging, metadata source, persistent
//! backup store, initial cache population, refresh scheduler, HTTP server.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use cdd_common::config::{resolve_config_path, ServiceConfig};
use cdd_service::cache::{CacheSettings, PersistentStore, RefreshableCache};
use cdd_service::notify::AlertNotifier;
use cdd_service::scheduler::RefreshScheduler;
use cdd_service::{build_router, source, AppState};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for cdd-service
#[derive(Parser, Debug)]
#[command(name = "cdd-service")]
#[command(about = "Clinical Data Dictionary metadata service")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "CDD_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides the config file)
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = ServiceConfig::load(&config_path).context("Failed to load configuration")?;
    config.apply_env_overrides();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }

    init_tracing(&config)?;

    // Build identification first, before any network delays
    info!(
        "Starting Clinical Data Dictionary service (cdd-service) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Configuration: {}", config_path.display());

    config.validate().context("Invalid configuration")?;

    let source = source::from_config(&config.source).context("Failed to create metadata source")?;
    info!("Metadata source: {}", source.name());

    let settings = CacheSettings {
        max_age: config.cache.max_age(),
        failure_threshold: config.cache.failure_threshold,
    };
    let mut cache = RefreshableCache::new(source, settings);

    if let Some(store) = PersistentStore::from_config(&config.cache).await {
        cache = cache.with_persistent_store(store);
    }
    let cache = Arc::new(cache);

    // Initial population; the scheduler keeps retrying on failure
    match cache.refresh(false).await {
        Ok(outcome) => info!(?outcome, "Initial clinical attribute cache population"),
        Err(e) => error!("Initial clinical attribute cache population failed: {}", e),
    }

    let state = AppState::new(cache.clone(), config.overrides.reset_priority_policies.clone());

    let notifier = Arc::new(
        AlertNotifier::new(config.alerts.webhook_url.clone(), config.source.request_timeout())
            .context("Failed to create alert notifier")?,
    );
    let scheduler = Arc::new(RefreshScheduler::new(
        cache,
        state.distances.clone(),
        notifier,
        config.cache.refresh_interval(),
    ));
    let scheduler_handle = scheduler.spawn();

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("cdd-service listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler_handle.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over `[logging].level`
fn init_tracing(config: &ServiceConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
