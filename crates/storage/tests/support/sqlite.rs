use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations_sqlite");
static COUNTER: AtomicU64 = AtomicU64::new(1);

pub struct SqliteTestDb {
    pub pool: SqlitePool,
    pub db_path: PathBuf,
    keep_db: bool,
}

impl Drop for SqliteTestDb {
    fn drop(&mut self) {
        if self.keep_db {
            return;
        }

        let _ = std::fs::remove_file(&self.db_path);
    }
}

pub async fn setup_test_db() -> Result<SqliteTestDb, sqlx::Error> {
    let keep_db = std::env::var("TEST_KEEP_DB").ok().as_deref() == Some("1");
    let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
    let db_path = std::env::temp_dir().join(format!(
        "aquatrack-storage-sqlite-test-{}-{}.db",
        std::process::id(),
        unique
    ));

    if db_path.exists() {
        let _ = std::fs::remove_file(&db_path);
    }

    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;

    Ok(SqliteTestDb {
        pool,
        db_path,
        keep_db,
    })
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Protocol(format!("sqlite migration failed: {e}")))
}

pub async fn seed_common_fixtures(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO containers (name, freshwater) VALUES (?1, ?2)")
        .bind("Tank 1")
        .bind(1_i64)
        .execute(pool)
        .await?;

    sqlx::query("INSERT INTO tgc_models (name, tgc_value) VALUES (?1, ?2)")
        .bind("Freshwater TGC")
        .bind(2.75_f64)
        .execute(pool)
        .await?;

    sqlx::query("INSERT INTO mortality_models (name, rate_percent, frequency) VALUES (?1, ?2, ?3)")
        .bind("Baseline")
        .bind(0.05_f64)
        .bind("daily")
        .execute(pool)
        .await?;

    sqlx::query(
        "INSERT INTO projections (name, tgc_model_id, mortality_model_id) VALUES (?1, 1, 1)",
    )
    .bind("baseline")
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO batches (batch_number, species, start_date, lifecycle_stage, pinned_projection_id) VALUES (?1, ?2, ?3, ?4, 1)",
    )
    .bind("B-001")
    .bind("Atlantic Salmon")
    .bind("2024-01-01")
    .bind("Parr")
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO assignments (batch_id, container_id, lifecycle_stage, assignment_date, population_count, avg_weight_g) VALUES (1, 1, ?1, ?2, ?3, ?4)",
    )
    .bind("Parr")
    .bind("2024-01-01")
    .bind(10_000_i64)
    .bind(50.0_f64)
    .execute(pool)
    .await?;

    Ok(())
}
