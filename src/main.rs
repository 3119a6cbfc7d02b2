use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pitbox::config::Config;
use pitbox::engine::Engine;
use pitbox::seed::Seed;
use pitbox::store::{MemoryStore, WalStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::parse();
    pitbox::observability::init(&config.bind, config.metrics_port)?;

    let seed = match &config.seed_file {
        Some(path) => Seed::load(path)?,
        None => Seed::default(),
    };
    let station_count = seed.stations.len();

    let engine = match config.wal_path() {
        Some(wal_path) => {
            if let Some(dir) = &config.data_dir {
                std::fs::create_dir_all(dir)?;
            }
            let store = Arc::new(WalStore::open(&wal_path, config.compact_threshold).await?);
            let seeded = store.seed_if_empty(seed.stations).await?;
            if seeded > 0 {
                info!(stations = seeded, "seeded empty store");
            }
            Engine::from_store(store, seed.catalog)
        }
        None => {
            let store = Arc::new(MemoryStore::with_stations(seed.stations));
            info!(stations = station_count, "using in-memory store");
            Engine::from_store(store, seed.catalog)
        }
    };

    let app = pitbox::http::router(Arc::new(engine), config.max_connections);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("pitbox listening on {addr}");
    info!(
        "  data_dir: {}",
        config
            .data_dir
            .as_ref()
            .map_or("none (in-memory)".to_string(), |d| d.display().to_string())
    );
    info!("  max_connections: {}", config.max_connections);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://{}:{p}/metrics", config.bind))
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("pitbox stopped");
    Ok(())
}

/// Resolve on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received, draining requests");
}
