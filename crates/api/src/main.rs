//! AquaTrack assimilation server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aquatrack_api::{AppState, build_router};
use aquatrack_config::AppConfig;
use aquatrack_engine::{AssimilationSettings, Recomputer, Scheduler};
use aquatrack_storage::{
    DailyStateRepository, MasterDataRepository, ObservationRepository, create_pool, run_migrations,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting AquaTrack assimilation server...");

    let config = AppConfig::from_env()?;
    tracing::info!("Binding to {}", config.bind_address);

    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let master = MasterDataRepository::new(pool.clone());
    let observations = ObservationRepository::new(pool.clone());
    let states = DailyStateRepository::new(pool.clone());

    let recomputer = Arc::new(Recomputer::new(
        master.clone(),
        observations,
        states.clone(),
        AssimilationSettings::from_config(&config),
    ));

    let cancel = CancellationToken::new();
    let scheduler = Arc::new(Scheduler::new(
        recomputer.clone(),
        config.max_concurrent_recomputes,
        Duration::from_secs(config.job_deadline_secs),
        cancel.clone(),
    ));

    let state = Arc::new(AppState {
        pool,
        master,
        states,
        recomputer,
        scheduler,
        config: config.clone(),
        start_time: Instant::now(),
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("Server listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    cancel.cancel();
    tracing::info!("Shutdown complete");

    Ok(())
}
