//! labeler-server - Image pair labeling service
//!
//! Serves a random query image with a page of candidates from a local image
//! folder, and stores the user's positive/negative decisions in SQLite.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use labeler_common::config::{ConfigOverrides, ServiceConfig, TomlConfig};
use labeler_common::db::init_database;
use labeler_server::db::LabelStore;
use labeler_server::services::{Authenticator, BatchSet, ImageIndex, UploadStore};
use labeler_server::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for labeler-server
#[derive(Parser, Debug)]
#[command(name = "labeler-server")]
#[command(about = "Image pair labeling service")]
#[command(version)]
struct Args {
    /// TOML config file (values below override it)
    #[arg(short, long, env = "LABELER_CONFIG")]
    config: Option<PathBuf>,

    /// Folder scanned for images
    #[arg(short, long, env = "IMAGE_ROOT")]
    image_root: Option<PathBuf>,

    /// SQLite database file holding the label collection
    #[arg(short, long, env = "LABELER_DATABASE")]
    database: Option<PathBuf>,

    /// Label collection (table) name
    #[arg(long, env = "LABELER_COLLECTION")]
    collection: Option<String>,

    /// Address to bind
    #[arg(long, env = "LABELER_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "LABELER_PORT")]
    port: Option<u16>,

    /// Candidates per session
    #[arg(long, env = "PAGE_SIZE")]
    page_size: Option<usize>,

    /// Allowed CORS origins, comma separated ("*" for any)
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Option<Vec<String>>,

    /// Login user name
    #[arg(long, env = "LABELER_USERNAME")]
    username: Option<String>,

    /// Login password (unset disables auth)
    #[arg(long, env = "LABELER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// JWT signing secret, at least 32 characters (random if unset)
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "LABELER_TOKEN_TTL")]
    token_ttl: Option<u64>,

    /// Directory receiving uploaded ZIP archives
    #[arg(long, env = "UPLOAD_ROOT")]
    upload_root: Option<PathBuf>,

    /// TOML file listing predefined batches
    #[arg(long, env = "LABELER_BATCHES")]
    batches: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            image_root: self.image_root.clone(),
            database: self.database.clone(),
            collection: self.collection.clone(),
            host: self.host.clone(),
            port: self.port,
            page_size: self.page_size,
            cors_origins: self.cors_origins.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            jwt_secret: self.jwt_secret.clone(),
            token_ttl_secs: self.token_ttl,
            upload_root: self.upload_root.clone(),
            batches: self.batches.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "labeler_server=info,labeler_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any startup delay
    info!(
        "Starting labeler-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let file = match &args.config {
        Some(path) => {
            info!("Config file: {}", path.display());
            Some(TomlConfig::load(path)?)
        }
        None => None,
    };
    let config = ServiceConfig::resolve(args.overrides(), file)?;

    info!("Image root: {}", config.image_root.display());
    info!("Database: {} (collection {})", config.database_path.display(), config.collection);
    info!("Page size: {}", config.page_size);
    info!("Upload root: {}", config.upload_root.display());
    let auth = match &config.auth {
        Some(auth_config) => {
            info!("API authentication enabled for user '{}'", auth_config.username);
            Some(Authenticator::new(auth_config))
        }
        None => {
            info!("API authentication disabled (no password configured)");
            None
        }
    };

    // Unreadable batches file is fatal
    let batches = match &config.batches_path {
        Some(path) => BatchSet::load(path).map_err(|e| {
            error!("{}", e);
            e
        })?,
        None => BatchSet::empty(),
    };

    // Unreadable image root is fatal
    let root = config.image_root.clone();
    let index = tokio::task::spawn_blocking(move || ImageIndex::open(root))
        .await
        .context("Image scan task failed")?
        .map_err(|e| {
            error!("{}", e);
            e
        })?;

    // Unusable database is fatal
    let pool = init_database(&config.database_path, &config.collection)
        .await
        .map_err(|e| {
            error!("{}", e);
            e
        })?;
    info!("✓ Connected to label store");

    let store = LabelStore::new(pool, config.collection.clone());
    let state = AppState::new(Arc::new(index), store, config.page_size)
        .with_auth(auth)
        .with_batches(batches)
        .with_uploads(UploadStore::new(config.upload_root.clone()))
        .with_cors(config.cors.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind to {}:{}", config.host, config.port))?;
    let addr = listener.local_addr().context("Failed to read bound address")?;
    info!("labeler-server listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
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
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
