//! Window observation loader: everything the day loop reads, fetched once
//! per (assignment, window).

use chrono::{Duration, NaiveDate};
use sqlx::PgPool;

use aquatrack_domain::{
    FeedingEvent, GrowthSample, MortalityEvent, SelectionMethod, TemperatureReading, TransferIn,
    TransferOut, TreatmentWeighing, WindowObservations,
};

use crate::StorageError;

/// Days of temperature context loaded either side of the window for the
/// interpolation ladder.
const TEMP_MARGIN_DAYS: i64 = 7;

#[derive(Clone)]
pub struct ObservationRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct TemperatureRow {
    date: NaiveDate,
    value_c: f64,
}

#[derive(sqlx::FromRow)]
struct SampleRow {
    id: i64,
    assignment_id: i64,
    sample_date: NaiveDate,
    avg_weight_g: Option<f64>,
    sample_size: Option<i32>,
}

#[derive(sqlx::FromRow)]
struct TransferOutRow {
    id: i64,
    actual_execution_date: NaiveDate,
    measured_avg_weight_g: Option<f64>,
    selection_method: Option<String>,
}

#[derive(sqlx::FromRow)]
struct TransferInRow {
    id: i64,
    actual_execution_date: NaiveDate,
    transferred_count: i64,
    measured_avg_weight_g: Option<f64>,
    source_assignment_id: Option<i64>,
    source_latest_state_weight_g: Option<f64>,
    source_avg_weight_g: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct TreatmentRow {
    id: i64,
    date: NaiveDate,
    mean_observed_weight_g: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct MortalityRow {
    id: i64,
    event_date: NaiveDate,
    count: i64,
}

#[derive(sqlx::FromRow)]
struct FeedingRow {
    id: i64,
    feeding_date: NaiveDate,
    amount_kg: f64,
}

impl ObservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn load_window(
        &self,
        assignment_id: i64,
        container_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<WindowObservations, StorageError> {
        let temperatures = self.daily_temperatures(container_id, start, end).await?;
        let growth_samples = self.growth_samples(assignment_id, start, end).await?;
        let transfers_out = self.transfers_out(assignment_id, start, end).await?;
        let transfers_in = self.transfers_in(assignment_id).await?;
        let treatments = self.treatment_weighings(assignment_id, start, end).await?;
        let mortality_events = self.mortality_events(assignment_id, start, end).await?;
        let feeding_events = self.feeding_events(container_id, start, end).await?;

        Ok(WindowObservations {
            temperatures,
            growth_samples,
            transfers_out,
            transfers_in,
            treatments,
            mortality_events,
            feeding_events,
        })
    }

    /// Daily mean water temperature per date, widened by the interpolation
    /// margin on both sides.
    async fn daily_temperatures(
        &self,
        container_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TemperatureReading>, StorageError> {
        let rows = sqlx::query_as::<_, TemperatureRow>(
            r#"
            SELECT reading_time::date AS date, AVG(value)::double precision AS value_c
            FROM environmental_readings
            WHERE container_id = $1
              AND parameter = 'temperature'
              AND reading_time::date BETWEEN $2 AND $3
            GROUP BY reading_time::date
            ORDER BY reading_time::date
            "#,
        )
        .bind(container_id)
        .bind(start - Duration::days(TEMP_MARGIN_DAYS))
        .bind(end + Duration::days(TEMP_MARGIN_DAYS))
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| TemperatureReading {
                date: row.date,
                value_c: row.value_c,
            })
            .collect())
    }

    async fn growth_samples(
        &self,
        assignment_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<GrowthSample>, StorageError> {
        let rows = sqlx::query_as::<_, SampleRow>(
            r#"
            SELECT id, assignment_id, sample_date, avg_weight_g, sample_size
            FROM growth_samples
            WHERE assignment_id = $1 AND sample_date BETWEEN $2 AND $3
            ORDER BY sample_date, id
            "#,
        )
        .bind(assignment_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| GrowthSample {
                id: row.id,
                assignment_id: row.assignment_id,
                sample_date: row.sample_date,
                avg_weight_g: row.avg_weight_g,
                sample_size: row.sample_size,
            })
            .collect())
    }

    /// Completed transfers out of the assignment inside the window.
    async fn transfers_out(
        &self,
        assignment_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TransferOut>, StorageError> {
        let rows = sqlx::query_as::<_, TransferOutRow>(
            r#"
            SELECT id, actual_execution_date, measured_avg_weight_g, selection_method
            FROM transfer_actions
            WHERE source_assignment_id = $1
              AND status = 'COMPLETED'
              AND actual_execution_date BETWEEN $2 AND $3
            ORDER BY actual_execution_date, id
            "#,
        )
        .bind(assignment_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| TransferOut {
                id: row.id,
                execution_date: row.actual_execution_date,
                measured_avg_weight_g: row.measured_avg_weight_g,
                selection_method: SelectionMethod::parse(row.selection_method.as_deref()),
            })
            .collect())
    }

    /// All completed transfers into the assignment, with the source-side
    /// weight fallbacks resolved here so the bootstrap ladder stays pure.
    async fn transfers_in(&self, assignment_id: i64) -> Result<Vec<TransferIn>, StorageError> {
        let rows = sqlx::query_as::<_, TransferInRow>(
            r#"
            SELECT t.id, t.actual_execution_date, t.transferred_count,
                   t.measured_avg_weight_g, t.source_assignment_id,
                   ls.avg_weight_g AS source_latest_state_weight_g,
                   sa.avg_weight_g AS source_avg_weight_g
            FROM transfer_actions t
            LEFT JOIN assignments sa ON sa.id = t.source_assignment_id
            LEFT JOIN LATERAL (
                SELECT avg_weight_g
                FROM daily_states ds
                WHERE ds.assignment_id = t.source_assignment_id
                ORDER BY ds.date DESC
                LIMIT 1
            ) ls ON TRUE
            WHERE t.dest_assignment_id = $1 AND t.status = 'COMPLETED'
            ORDER BY t.actual_execution_date, t.id
            "#,
        )
        .bind(assignment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| TransferIn {
                id: row.id,
                execution_date: row.actual_execution_date,
                transferred_count: row.transferred_count,
                measured_avg_weight_g: row.measured_avg_weight_g,
                source_assignment_id: row.source_assignment_id,
                source_latest_state_weight_g: row.source_latest_state_weight_g,
                source_avg_weight_g: row.source_avg_weight_g,
            })
            .collect())
    }

    /// Treatments that included a weighing, with the mean of their recorded
    /// individual fish weights. Treatments without observations return NULL
    /// and contribute no anchor.
    async fn treatment_weighings(
        &self,
        assignment_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TreatmentWeighing>, StorageError> {
        let rows = sqlx::query_as::<_, TreatmentRow>(
            r#"
            SELECT t.id, t.treatment_date::date AS date,
                   AVG(o.weight_g)::double precision AS mean_observed_weight_g
            FROM treatments t
            LEFT JOIN fish_observations o ON o.treatment_id = t.id AND o.weight_g IS NOT NULL
            WHERE t.assignment_id = $1
              AND t.includes_weighing
              AND t.treatment_date::date BETWEEN $2 AND $3
            GROUP BY t.id, t.treatment_date::date
            ORDER BY date, t.id
            "#,
        )
        .bind(assignment_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| TreatmentWeighing {
                id: row.id,
                date: row.date,
                mean_observed_weight_g: row.mean_observed_weight_g,
            })
            .collect())
    }

    async fn mortality_events(
        &self,
        assignment_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MortalityEvent>, StorageError> {
        let rows = sqlx::query_as::<_, MortalityRow>(
            r#"
            SELECT id, event_date, count
            FROM mortality_events
            WHERE assignment_id = $1 AND event_date BETWEEN $2 AND $3
            ORDER BY event_date, id
            "#,
        )
        .bind(assignment_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| MortalityEvent {
                id: row.id,
                event_date: row.event_date,
                count: row.count,
            })
            .collect())
    }

    async fn feeding_events(
        &self,
        container_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FeedingEvent>, StorageError> {
        let rows = sqlx::query_as::<_, FeedingRow>(
            r#"
            SELECT id, feeding_date, amount_kg
            FROM feeding_events
            WHERE container_id = $1 AND feeding_date BETWEEN $2 AND $3
            ORDER BY feeding_date, id
            "#,
        )
        .bind(container_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| FeedingEvent {
                id: row.id,
                feeding_date: row.feeding_date,
                amount_kg: row.amount_kg,
            })
            .collect())
    }
}
