//! Cloud Drive Server
//!
//! Main entry point that wires all crates together and runs the
//! background scheduler until shutdown.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt};

use drive_core::config::AppConfig;
use drive_core::traits::ObjectStorage;
use drive_database::{DatabasePool, DriveStore, MemoryDriveStore, PgDriveStore};
use drive_service::DriveServices;
use drive_worker::{BinSweepJob, CronScheduler};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {:#}", e);
        std::process::exit(1);
    }
}

/// Load `config/default.toml`, the `DRIVE_ENV` overlay, and `DRIVE__*` variables
fn load_configuration() -> anyhow::Result<AppConfig> {
    let env = std::env::var("DRIVE_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env).with_context(|| format!("loading configuration for '{env}'"))
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting Cloud Drive v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Store ────────────────────────────────────────────
    let (store, database): (Arc<dyn DriveStore>, Option<DatabasePool>) =
        if config.database.url == "memory" {
            tracing::warn!("Using the in-memory store, nothing will be persisted");
            (Arc::new(MemoryDriveStore::new()), None)
        } else {
            tracing::info!("Connecting to database...");
            let pool = DatabasePool::connect(&config.database)
                .await
                .context("database connection failed")?;
            if !pool.health_check().await? {
                anyhow::bail!("database health check failed");
            }
            pool.prepare(&config.database)
                .await
                .context("database migration failed")?;
            tracing::info!("Database ready");
            (Arc::new(PgDriveStore::new(pool.pool().clone())), Some(pool))
        };

    // ── Step 2: Object storage ───────────────────────────────────
    tracing::info!("Initializing object storage (provider: {})...", config.storage.provider);
    let storage: Arc<dyn ObjectStorage> = drive_storage::connect(&config.storage)
        .await
        .context("object storage init failed")?;
    tracing::info!(provider = storage.provider_type(), "Object storage ready");

    // ── Step 3: Services ─────────────────────────────────────────
    let services = DriveServices::new(store, storage, &config).context("service init failed")?;
    tracing::info!(
        quota_bytes = config.drive.quota_bytes,
        retention_hours = config.drive.bin_retention_hours,
        "Drive services ready"
    );

    // ── Step 4: Scheduler ────────────────────────────────────────
    let mut scheduler = CronScheduler::new().await?;
    scheduler
        .register(Arc::new(BinSweepJob::new(
            services.bin.clone(),
            config.drive.sweep_cron.clone(),
        )))
        .await?;
    scheduler.start().await?;

    // ── Step 5: Wait for shutdown ────────────────────────────────
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    scheduler.shutdown().await?;
    if let Some(database) = database {
        database.close().await;
    }
    tracing::info!("Cloud Drive stopped");
    Ok(())
}
