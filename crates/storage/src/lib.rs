//! Storage layer for the AquaTrack assimilation core.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod daily_state;
pub mod error;
pub mod master_data;
pub mod observations;

pub use daily_state::{DailyStateRepository, PersistStats};
pub use error::StorageError;
pub use master_data::MasterDataRepository;
pub use observations::ObservationRepository;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool, StorageError> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(StorageError::Connection)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(StorageError::Migration)
}

/// Check database connectivity.
pub async fn check_connection(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(StorageError::Query)?;
    Ok(())
}
