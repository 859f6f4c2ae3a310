use anyhow::{Context, Result};
use domain::services::{FeatureFlagService, FlagStore, InMemoryFlagStore};
use domain::SystemClock;
use feature_flags_api::{
    app::{self, AppState},
    config::{Config, StorageBackend},
    jobs::{JobScheduler, PoolMetricsJob, RateLimiterPruneJob},
    middleware::{init_logging, init_metrics},
};
use persistence::repositories::FeatureFlagRepository;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const JOB_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;
    init_logging(&config.logging);
    init_metrics();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = config.storage.backend.as_str(),
        "Starting feature flag service"
    );

    let mut scheduler = JobScheduler::new();

    let store: Arc<dyn FlagStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = persistence::db::create_pool(&(&config.database).into())
                .await
                .context("Failed to connect to database")?;

            info!("Running database migrations");
            persistence::db::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;

            scheduler.register(PoolMetricsJob::new(pool.clone()));
            Arc::new(FeatureFlagRepository::new(pool))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory flag storage; flags are lost on restart");
            Arc::new(InMemoryFlagStore::new())
        }
    };

    let service = Arc::new(FeatureFlagService::new(store, Arc::new(SystemClock)));
    let addr = config.socket_addr().context("Invalid server address")?;

    let state = AppState::new(config, service);
    if let Some(limiter) = &state.rate_limiter {
        scheduler.register(RateLimiterPruneJob::new(Arc::clone(limiter)));
    }
    scheduler.start();

    let app = app::router(state);

    info!(%addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(JOB_SHUTDOWN_TIMEOUT).await;
    info!("Server stopped");

    Ok(())
}
