use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::{routing::get, Extension, Json, Router};
use cron::Schedule;
use mongodb::{options::ClientOptions, Client as MongoClient};
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, EnvFilter};

mod config;
mod models;
mod source;
mod storage;
mod sync;

use crate::config::Config;
use crate::models::MigrationOutcome;
use crate::source::FabricClient;
use crate::storage::MongoCatalogStore;
use crate::sync::SyncEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load this crate's .env regardless of current working directory, and override any pre-set envs
    let _ = dotenvy::from_filename_override(concat!(env!("CARGO_MANIFEST_DIR"), "/.env"));
    // Initialize logging
    let filter = EnvFilter::from_default_env().add_directive("info".parse().unwrap());
    fmt()
        .with_env_filter(filter)
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(true)
        .init();

    let cfg = Config::from_env();
    tracing::info!(
        database = %cfg.database_name,
        scheduler_enabled = cfg.enable_scheduler,
        download_concurrency = cfg.download_concurrency(),
        "Loaded configuration"
    );

    // Initialize MongoDB
    let client_options = ClientOptions::parse(&cfg.mongodb_uri).await?;
    let mongo_client = MongoClient::with_options(client_options)?;
    let db = mongo_client.database(&cfg.database_name);

    let store = Arc::new(MongoCatalogStore::with_db(db));
    let fabric = Arc::new(FabricClient::new(&cfg));
    let engine = SyncEngine::new(fabric, store, cfg.clone());

    // Initialize and start scheduler
    let scheduler = JobScheduler::new().await?;
    if cfg.enable_scheduler {
        start_sync_scheduler(scheduler.clone(), engine.clone(), &cfg).await?;
        scheduler.start().await?;
        tracing::info!("Sync scheduler started");
    }

    // Build web application
    let app = Router::new()
        .route("/migration", get(migration_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(engine));

    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.port).parse()?;
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                tracing::error!(port = cfg.port, "Port is already in use. Another catalog-sync-service might be running. Try changing PORT env var or stop the other process.");
            }
            return Err(e.into());
        }
    };
    tracing::info!(port = cfg.port, "Catalog sync service listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn migration_handler(Extension(engine): Extension<SyncEngine>) -> Json<MigrationOutcome> {
    Json(engine.run_pass().await)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn start_sync_scheduler(
    scheduler: JobScheduler,
    engine: SyncEngine,
    cfg: &Config,
) -> anyhow::Result<()> {
    if let Ok(schedule) = Schedule::from_str(&cfg.sync_schedule) {
        if let Some(next) = schedule.upcoming(chrono::Utc).next() {
            tracing::info!(schedule = %cfg.sync_schedule, next_run = %next, "Scheduling migration passes");
        }
    }

    let sync_job = Job::new_async(cfg.sync_schedule.as_str(), move |_uuid, _l| {
        let engine = engine.clone();
        Box::pin(async move {
            let outcome = engine.run_pass().await;
            if !outcome.success {
                tracing::error!(error = ?outcome.error, "Scheduled migration pass failed");
            }
        })
    })?;
    scheduler.add(sync_job).await?;

    Ok(())
}
