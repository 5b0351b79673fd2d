use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use debridge_core::{
    load_config, validate_config, AvailabilityResolver, CacheBackend, CacheStore, CinemetaClient,
    Config, DebridRegistry, FanoutCoordinator, HttpTorrentInfoResolver, InfoEnricher,
    JackettGateway, MemoryCacheStore, ResolverSettings, SlowIndexerTracker, SqliteCacheStore,
    StreamResolver,
};

use debridge_server::api::create_router;
use debridge_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("DEBRIDGE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Public URL: {}", config.server.public_url);
    info!("Cache backend: {:?}", config.cache.backend);

    let resolver = Arc::new(build_resolver(&config)?);
    let purge = resolver.spawn_purge(Duration::from_secs(config.cache.purge_interval_secs));
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&resolver)));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    purge.abort();
    info!("Server shut down");
    Ok(())
}

/// Wire the resolution pipeline from configuration.
fn build_resolver(config: &Config) -> Result<StreamResolver> {
    let cache: Arc<dyn CacheStore> = match config.cache.backend {
        CacheBackend::Memory => {
            info!("Using in-memory cache");
            Arc::new(MemoryCacheStore::new())
        }
        CacheBackend::Sqlite => {
            info!("Using SQLite cache at {:?}", config.cache.path);
            Arc::new(
                SqliteCacheStore::new(&config.cache.path)
                    .context("Failed to open SQLite cache")?,
            )
        }
    };

    info!(
        "Initializing Jackett gateway at {} ({} indexers)",
        config.jackett.url,
        config.jackett.indexers.len()
    );
    let gateway = JackettGateway::new(config.jackett.clone())
        .context("Failed to create Jackett gateway")?;
    let tracker = Arc::new(SlowIndexerTracker::new(&config.slow_indexer));
    let fanout = FanoutCoordinator::new(Arc::new(gateway), tracker);

    let metadata =
        CinemetaClient::new(&config.metadata).context("Failed to create Cinemeta client")?;

    let infos = HttpTorrentInfoResolver::new(
        Arc::clone(&cache),
        Duration::from_secs(config.cache.torrent_infos_ttl_secs),
    )
    .context("Failed to create torrent info resolver")?;
    let enricher = InfoEnricher::new(
        Arc::new(infos),
        config.resolver.info_concurrency,
        Duration::from_secs(config.resolver.info_timeout_cap_secs),
    );

    let availability = AvailabilityResolver::new(
        Duration::from_secs(config.resolver.status_cache_ttl_secs),
        config.resolver.check_batch_size,
    );

    Ok(StreamResolver::new(
        ResolverSettings::from_config(config),
        Arc::new(metadata),
        fanout,
        enricher,
        availability,
        Arc::new(DebridRegistry::new()),
        cache,
    ))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
