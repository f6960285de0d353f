//! cobham-api - Music streaming backend
//!
//! Serves the catalog (songs, albums, artists), playlists, favorites, the
//! player queue and subscription payments over a JSON REST API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cobham_common::config::{Config, ConfigOverrides, IdentityBackend, StorageBackend};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cobham_api::identity::{IdentityProvider, StaticIdentity, SupabaseIdentity};
use cobham_api::payments::{PaymentRegistry, PaypalProvider};
use cobham_api::storage::{LocalStore, MediaStorage, ObjectStore, SupabaseStore};
use cobham_api::{build_router, tasks, AppState};

/// Command-line arguments for cobham-api
#[derive(Parser, Debug)]
#[command(name = "cobham-api")]
#[command(about = "Music streaming backend API")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "COBHAM_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Folder holding the database and local media
    #[arg(short, long)]
    root_folder: Option<PathBuf>,
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.logging.level)));

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

fn identity_provider(config: &Config) -> Result<Arc<dyn IdentityProvider>> {
    match config.auth.provider {
        IdentityBackend::Static => {
            info!(tokens = config.auth.tokens.len(), "Using static token authentication");
            Ok(Arc::new(StaticIdentity::from_config(&config.auth.tokens)))
        }
        IdentityBackend::Supabase => {
            let url = config.supabase.url.as_deref().unwrap_or_default();
            let key = config.supabase.anon_key.as_deref().unwrap_or_default();
            Ok(Arc::new(SupabaseIdentity::new(url, key)?))
        }
    }
}

/// Object store plus the folder to serve under `/media` for local storage
fn media_storage(config: &Config) -> Result<(MediaStorage, Option<PathBuf>)> {
    let (store, media_dir): (Arc<dyn ObjectStore>, Option<PathBuf>) = match config.storage.backend {
        StorageBackend::Local => {
            let dir = config.root_folder.join("media");
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create media folder {}", dir.display()))?;
            info!("Local media folder: {}", dir.display());
            (
                Arc::new(LocalStore::new(dir.clone(), &config.media_base_url())),
                Some(dir),
            )
        }
        StorageBackend::Supabase => {
            let url = config.supabase.url.as_deref().unwrap_or_default();
            let key = config.supabase.service_role_key.as_deref().unwrap_or_default();
            (Arc::new(SupabaseStore::new(url, key)?), None)
        }
    };

    let storage = MediaStorage::new(
        store,
        config.storage.audio_bucket.clone(),
        config.storage.artwork_bucket.clone(),
        Duration::from_secs(config.storage.signed_url_ttl_secs),
    );
    Ok((storage, media_dir))
}

fn payment_registry(config: &Config) -> Result<PaymentRegistry> {
    let mut registry = PaymentRegistry::new();
    if config.paypal.is_configured() {
        registry = registry.with_provider(Arc::new(PaypalProvider::from_config(&config.paypal)?));
        info!(mode = ?config.paypal.mode, "PayPal payments enabled");
    } else {
        warn!("PayPal credentials not configured; payment routes will reject requests");
    }
    info!(providers = ?registry.names(), "Payment providers registered");
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(ConfigOverrides {
        config_path: args.config,
        port: args.port,
        database_path: args.database,
        root_folder: args.root_folder,
    })
    .context("Failed to load configuration")?;

    init_tracing(&config)?;

    info!(
        "Starting Cobham API (cobham-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", config.root_folder.display());
    info!("Database: {}", config.database_path.display());

    let pool = cobham_common::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let identity = identity_provider(&config)?;
    let (storage, media_dir) = media_storage(&config)?;
    let payments = payment_registry(&config)?;

    let mut state = AppState::new(pool.clone(), identity, storage, payments);
    if let Some(dir) = media_dir {
        state = state.with_media_dir(dir);
    }

    let shutdown = CancellationToken::new();
    let sweeper = tasks::spawn_subscription_sweeper(
        pool,
        state.response_cache.clone(),
        state.profiles.clone(),
        Duration::from_secs(config.subscriptions.sweep_interval_secs),
        shutdown.clone(),
    );

    let app = build_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;
    info!("Listening on http://{}", address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            warn!("Subscription sweeper ended abnormally: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
