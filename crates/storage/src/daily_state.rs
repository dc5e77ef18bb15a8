//! Daily-state repository: the only writer of reconstructed rows.

use chrono::{NaiveDate, Utc};
use sqlx::types::Json as SqlJson;
use sqlx::{Acquire, PgPool};
use std::collections::HashSet;

use aquatrack_domain::{
    AnchorType, DailyState, DayError, FieldConfidence, FieldSources,
};

use crate::StorageError;

#[derive(Clone)]
pub struct DailyStateRepository {
    pool: PgPool,
}

/// Counters from one transactional window write.
#[derive(Debug, Default)]
pub struct PersistStats {
    pub created: u64,
    pub updated: u64,
    pub errors: Vec<DayError>,
}

#[derive(sqlx::FromRow)]
struct DailyStateRow {
    assignment_id: i64,
    date: NaiveDate,
    day_number: i32,
    avg_weight_g: f64,
    population: i64,
    biomass_kg: f64,
    temp_c: Option<f64>,
    mortality_count: i64,
    feed_kg: f64,
    observed_fcr: Option<f64>,
    anchor_type: Option<String>,
    lifecycle_stage: String,
    sources: SqlJson<FieldSources>,
    confidence_scores: SqlJson<FieldConfidence>,
}

fn parse_anchor_type(raw: Option<&str>) -> Option<AnchorType> {
    match raw {
        Some("growth_sample") => Some(AnchorType::GrowthSample),
        Some("transfer") => Some(AnchorType::Transfer),
        Some("vaccination") => Some(AnchorType::Vaccination),
        _ => None,
    }
}

impl From<DailyStateRow> for DailyState {
    fn from(row: DailyStateRow) -> Self {
        DailyState {
            assignment_id: row.assignment_id,
            date: row.date,
            day_number: row.day_number,
            avg_weight_g: row.avg_weight_g,
            population: row.population,
            biomass_kg: row.biomass_kg,
            temp_c: row.temp_c,
            mortality_count: row.mortality_count,
            feed_kg: row.feed_kg,
            observed_fcr: row.observed_fcr,
            anchor_type: parse_anchor_type(row.anchor_type.as_deref()),
            lifecycle_stage: row.lifecycle_stage,
            sources: row.sources.0,
            confidence_scores: row.confidence_scores.0,
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    assignment_id, date, day_number, avg_weight_g, population, biomass_kg,
    temp_c, mortality_count, feed_kg, observed_fcr, anchor_type,
    lifecycle_stage, sources, confidence_scores
"#;

impl DailyStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recent stored state strictly before `date`, if any.
    pub async fn latest_before(
        &self,
        assignment_id: i64,
        date: NaiveDate,
    ) -> Result<Option<DailyState>, StorageError> {
        let row = sqlx::query_as::<_, DailyStateRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM daily_states
            WHERE assignment_id = $1 AND date < $2
            ORDER BY date DESC
            LIMIT 1
            "#
        ))
        .bind(assignment_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(row.map(DailyState::from))
    }

    /// Stored rows for an assignment in `[start, end]`, ordered by date.
    pub async fn list_range(
        &self,
        assignment_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyState>, StorageError> {
        let rows = sqlx::query_as::<_, DailyStateRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM daily_states
            WHERE assignment_id = $1 AND date BETWEEN $2 AND $3
            ORDER BY date
            "#
        ))
        .bind(assignment_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(DailyState::from).collect())
    }

    /// Upsert a window of rows for one assignment inside a single
    /// transaction, in calendar order.
    ///
    /// Each row writes under a savepoint so one bad day is recorded and
    /// skipped without aborting the rest of the window. An outside reader
    /// observes either the whole new window or the prior state.
    pub async fn upsert_window(&self, rows: &[DailyState]) -> Result<PersistStats, StorageError> {
        let mut stats = PersistStats::default();
        let Some(first) = rows.first() else {
            return Ok(stats);
        };

        let mut tx = self.pool.begin().await.map_err(StorageError::Query)?;

        let existing: Vec<(NaiveDate,)> = sqlx::query_as(
            "SELECT date FROM daily_states WHERE assignment_id = $1 AND date BETWEEN $2 AND $3",
        )
        .bind(first.assignment_id)
        .bind(first.date)
        .bind(rows.last().map(|r| r.date).unwrap_or(first.date))
        .fetch_all(&mut *tx)
        .await
        .map_err(StorageError::Query)?;
        let existing: HashSet<NaiveDate> = existing.into_iter().map(|(d,)| d).collect();

        let now = Utc::now();
        for row in rows {
            let mut savepoint = tx.begin().await.map_err(StorageError::Query)?;
            let result = sqlx::query(
                r#"
                INSERT INTO daily_states (
                    assignment_id, date, day_number, avg_weight_g, population,
                    biomass_kg, temp_c, mortality_count, feed_kg, observed_fcr,
                    anchor_type, lifecycle_stage, sources, confidence_scores,
                    created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)
                ON CONFLICT (assignment_id, date) DO UPDATE SET
                    day_number = EXCLUDED.day_number,
                    avg_weight_g = EXCLUDED.avg_weight_g,
                    population = EXCLUDED.population,
                    biomass_kg = EXCLUDED.biomass_kg,
                    temp_c = EXCLUDED.temp_c,
                    mortality_count = EXCLUDED.mortality_count,
                    feed_kg = EXCLUDED.feed_kg,
                    observed_fcr = EXCLUDED.observed_fcr,
                    anchor_type = EXCLUDED.anchor_type,
                    lifecycle_stage = EXCLUDED.lifecycle_stage,
                    sources = EXCLUDED.sources,
                    confidence_scores = EXCLUDED.confidence_scores,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(row.assignment_id)
            .bind(row.date)
            .bind(row.day_number)
            .bind(row.avg_weight_g)
            .bind(row.population)
            .bind(row.biomass_kg)
            .bind(row.temp_c)
            .bind(row.mortality_count)
            .bind(row.feed_kg)
            .bind(row.observed_fcr)
            .bind(row.anchor_type.map(AnchorType::as_str))
            .bind(&row.lifecycle_stage)
            .bind(SqlJson(&row.sources))
            .bind(SqlJson(&row.confidence_scores))
            .bind(now)
            .execute(&mut *savepoint)
            .await;

            match result {
                Ok(_) => {
                    savepoint.commit().await.map_err(StorageError::Query)?;
                    if existing.contains(&row.date) {
                        stats.updated += 1;
                    } else {
                        stats.created += 1;
                    }
                }
                Err(err) => {
                    // Savepoint rolls back on drop; the window continues.
                    drop(savepoint);
                    tracing::warn!(
                        assignment_id = row.assignment_id,
                        date = %row.date,
                        error = %err,
                        "daily state upsert failed"
                    );
                    stats.errors.push(DayError {
                        date: row.date,
                        message: err.to_string(),
                    });
                }
            }
        }

        tx.commit().await.map_err(StorageError::Query)?;
        Ok(stats)
    }
}
