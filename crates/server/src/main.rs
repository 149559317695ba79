//! Templar server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use std::sync::Arc;
use templar_core::config::{AppConfig, LogConfig};
use templar_server::{AppState, JobQueue, create_router};
use templar_storage::ObjectStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Path of the SQLite catalog, relative to the working directory.
const METADATA_DB_PATH: &str = "templar.db";

/// Templar - versioned template object service
#[derive(Parser, Debug)]
#[command(name = "templard")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "TEMPLAR_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

fn init_tracing(config: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("{},tower_http=info", config.level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_file(config.add_source)
                    .with_line_number(config.add_source),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_file(config.add_source)
                    .with_line_number(config.add_source),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration: optional TOML file, overridden by TEMPLAR_
    // environment variables (TEMPLAR_OBJECTSTORE__CACHE__MAX_SIZE=...).
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        figment = figment.merge(Toml::file(&args.config));
    }
    let config: AppConfig = figment
        .merge(Env::prefixed("TEMPLAR_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    init_tracing(&config.log);
    tracing::info!(
        app = %config.app.name,
        env = %config.env,
        "Templar v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Object store: local cache + remote primary, LRU-bounded, key-locked.
    let store = templar_storage::from_config(&config.objectstore)
        .await
        .context("failed to initialize object store")?;
    store
        .health_check()
        .await
        .context("object store health check failed")?;
    tracing::info!("object store initialized");

    // Metadata catalog.
    let metadata: Arc<dyn templar_metadata::MetadataStore> = Arc::new(
        templar_metadata::SqliteStore::new(METADATA_DB_PATH)
            .await
            .context("failed to initialize metadata store")?,
    );
    tracing::info!(path = METADATA_DB_PATH, "metadata store initialized");

    // Background job worker.
    let (jobs, _worker_handle) = JobQueue::new(config.app.job_buffer, metadata.clone());
    tracing::info!(buffer = config.app.job_buffer, "job worker spawned");

    let bind = config.app.bind.clone();
    let state = AppState::new(config, store, metadata, jobs);
    let app = create_router(state);

    let addr: SocketAddr = bind.parse().context("invalid bind address")?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
