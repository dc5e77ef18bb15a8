//! Master-data repository: batches, assignments, stages, pinned projection
//! and the models it reaches.

use chrono::NaiveDate;
use sqlx::PgPool;
use std::collections::{BTreeMap, HashMap};

use aquatrack_domain::{
    Assignment, AssignmentContext, Batch, Container, LifecycleStage, MortalityModel, Projection,
    RateFrequency, StageConstraint, TgcModel, normalize_stage,
};

use crate::StorageError;

#[derive(Clone)]
pub struct MasterDataRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct BatchRow {
    id: i64,
    batch_number: String,
    species: String,
    start_date: NaiveDate,
    lifecycle_stage: String,
    pinned_projection_id: Option<i64>,
    status: String,
}

impl From<BatchRow> for Batch {
    fn from(row: BatchRow) -> Self {
        Batch {
            id: row.id,
            batch_number: row.batch_number,
            species: row.species,
            start_date: row.start_date,
            lifecycle_stage: row.lifecycle_stage,
            pinned_projection_id: row.pinned_projection_id,
            status: row.status,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: i64,
    batch_id: i64,
    container_id: i64,
    lifecycle_stage: String,
    assignment_date: NaiveDate,
    departure_date: Option<NaiveDate>,
    population_count: i64,
    avg_weight_g: Option<f64>,
    is_active: bool,
    last_weighing_date: Option<NaiveDate>,
}

impl From<AssignmentRow> for Assignment {
    fn from(row: AssignmentRow) -> Self {
        Assignment {
            id: row.id,
            batch_id: row.batch_id,
            container_id: row.container_id,
            lifecycle_stage: row.lifecycle_stage,
            assignment_date: row.assignment_date,
            departure_date: row.departure_date,
            population_count: row.population_count,
            avg_weight_g: row.avg_weight_g,
            is_active: row.is_active,
            last_weighing_date: row.last_weighing_date,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ContainerRow {
    id: i64,
    name: String,
    freshwater: bool,
}

#[derive(sqlx::FromRow)]
struct StageRow {
    id: i64,
    species: String,
    name: String,
    stage_order: i32,
    expected_weight_min_g: Option<f64>,
    expected_weight_max_g: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct ProjectionRow {
    id: i64,
    name: String,
    initial_weight_g: Option<f64>,
    tgc_model_id: i64,
    mortality_model_id: i64,
    constraint_set_id: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct TgcModelRow {
    id: i64,
    name: String,
    tgc_value: f64,
    exponent_n: f64,
    exponent_m: f64,
}

#[derive(sqlx::FromRow)]
struct ProfileEntryRow {
    day_number: i32,
    temperature_c: f64,
}

#[derive(sqlx::FromRow)]
struct StageValueRow {
    lifecycle_stage: String,
    value: f64,
}

#[derive(sqlx::FromRow)]
struct MortalityModelRow {
    id: i64,
    name: String,
    rate_percent: f64,
    frequency: String,
}

#[derive(sqlx::FromRow)]
struct ConstraintRow {
    lifecycle_stage: String,
    min_weight_g: Option<f64>,
    max_weight_g: Option<f64>,
    max_freshwater_weight_g: Option<f64>,
    min_temperature_c: Option<f64>,
    max_temperature_c: Option<f64>,
}

impl MasterDataRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_batch(&self, batch_id: i64) -> Result<Option<Batch>, StorageError> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, batch_number, species, start_date, lifecycle_stage,
                   pinned_projection_id, status
            FROM batches
            WHERE id = $1
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(row.map(Batch::from))
    }

    pub async fn find_assignment(
        &self,
        assignment_id: i64,
    ) -> Result<Option<Assignment>, StorageError> {
        let row = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, batch_id, container_id, lifecycle_stage, assignment_date,
                   departure_date, population_count, avg_weight_g, is_active,
                   last_weighing_date
            FROM assignments
            WHERE id = $1
            "#,
        )
        .bind(assignment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(row.map(Assignment::from))
    }

    /// Assignments of a batch whose residency overlaps `[start, end]`.
    pub async fn overlapping_assignments(
        &self,
        batch_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Assignment>, StorageError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, batch_id, container_id, lifecycle_stage, assignment_date,
                   departure_date, population_count, avg_weight_g, is_active,
                   last_weighing_date
            FROM assignments
            WHERE batch_id = $1
              AND assignment_date <= $2
              AND (departure_date IS NULL OR departure_date >= $3)
            ORDER BY assignment_date, id
            "#,
        )
        .bind(batch_id)
        .bind(end)
        .bind(start)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(Assignment::from).collect())
    }

    pub async fn assignments_by_ids(
        &self,
        batch_id: i64,
        ids: &[i64],
    ) -> Result<Vec<Assignment>, StorageError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, batch_id, container_id, lifecycle_stage, assignment_date,
                   departure_date, population_count, avg_weight_g, is_active,
                   last_weighing_date
            FROM assignments
            WHERE batch_id = $1 AND id = ANY($2)
            ORDER BY assignment_date, id
            "#,
        )
        .bind(batch_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(Assignment::from).collect())
    }

    /// Set `last_weighing_date` on every active assignment of a batch.
    /// Returns the number of assignments touched.
    pub async fn touch_last_weighing(
        &self,
        batch_id: i64,
        date: NaiveDate,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE assignments
            SET last_weighing_date = $2
            WHERE batch_id = $1 AND is_active
            "#,
        )
        .bind(batch_id)
        .bind(date)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(result.rows_affected())
    }

    pub async fn projection_exists(&self, projection_id: i64) -> Result<bool, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM projections WHERE id = $1")
            .bind(projection_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Query)?;
        Ok(row.is_some())
    }

    /// Pin a projection to a batch. Returns false when the batch is unknown.
    pub async fn pin_projection(
        &self,
        batch_id: i64,
        projection_id: i64,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE batches SET pinned_projection_id = $2 WHERE id = $1")
            .bind(batch_id)
            .bind(projection_id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Query)?;
        Ok(result.rows_affected() > 0)
    }

    /// Load everything a recompute job needs to know about one assignment.
    ///
    /// Fails with `NotFound` for an unknown assignment and with
    /// `MissingMasterData` when the batch has no pinned projection: the
    /// bootstrap ladder and the growth model both require one.
    pub async fn load_context(
        &self,
        assignment_id: i64,
    ) -> Result<AssignmentContext, StorageError> {
        let assignment = self
            .find_assignment(assignment_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("assignment {assignment_id}")))?;

        let batch = self
            .find_batch(assignment.batch_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("batch {}", assignment.batch_id)))?;

        let container = sqlx::query_as::<_, ContainerRow>(
            "SELECT id, name, freshwater FROM containers WHERE id = $1",
        )
        .bind(assignment.container_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)?
        .ok_or_else(|| StorageError::NotFound(format!("container {}", assignment.container_id)))?;

        let projection_id = batch.pinned_projection_id.ok_or_else(|| {
            StorageError::MissingMasterData(format!(
                "batch {} has no pinned projection; pin one before recomputing",
                batch.batch_number
            ))
        })?;

        let projection = sqlx::query_as::<_, ProjectionRow>(
            r#"
            SELECT id, name, initial_weight_g, tgc_model_id, mortality_model_id,
                   constraint_set_id
            FROM projections
            WHERE id = $1
            "#,
        )
        .bind(projection_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)?
        .ok_or_else(|| StorageError::NotFound(format!("projection {projection_id}")))?;

        let stages = self.load_stages(&batch.species).await?;
        let tgc = self.load_tgc_model(projection.tgc_model_id).await?;
        let mortality = self
            .load_mortality_model(projection.mortality_model_id)
            .await?;
        let constraints = match projection.constraint_set_id {
            Some(set_id) => self.load_constraints(set_id).await?,
            None => Vec::new(),
        };

        Ok(AssignmentContext {
            batch,
            assignment,
            container: Container {
                id: container.id,
                name: container.name,
                freshwater: container.freshwater,
            },
            stages,
            projection: Projection {
                id: projection.id,
                name: projection.name,
                initial_weight_g: projection.initial_weight_g,
            },
            tgc,
            mortality,
            constraints,
        })
    }

    async fn load_stages(&self, species: &str) -> Result<Vec<LifecycleStage>, StorageError> {
        let rows = sqlx::query_as::<_, StageRow>(
            r#"
            SELECT id, species, name, stage_order, expected_weight_min_g,
                   expected_weight_max_g
            FROM lifecycle_stages
            WHERE species = $1
            ORDER BY stage_order
            "#,
        )
        .bind(species)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| LifecycleStage {
                id: row.id,
                species: row.species,
                name: row.name,
                stage_order: row.stage_order,
                expected_weight_min_g: row.expected_weight_min_g,
                expected_weight_max_g: row.expected_weight_max_g,
            })
            .collect())
    }

    async fn load_tgc_model(&self, model_id: i64) -> Result<TgcModel, StorageError> {
        let model = sqlx::query_as::<_, TgcModelRow>(
            "SELECT id, name, tgc_value, exponent_n, exponent_m FROM tgc_models WHERE id = $1",
        )
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)?
        .ok_or_else(|| StorageError::NotFound(format!("tgc model {model_id}")))?;

        let profile_rows = sqlx::query_as::<_, ProfileEntryRow>(
            r#"
            SELECT day_number, temperature_c
            FROM tgc_profile_entries
            WHERE tgc_model_id = $1
            ORDER BY day_number
            "#,
        )
        .bind(model_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        let override_rows = sqlx::query_as::<_, StageValueRow>(
            r#"
            SELECT lifecycle_stage, tgc_value AS value
            FROM tgc_stage_overrides
            WHERE tgc_model_id = $1
            "#,
        )
        .bind(model_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        let temperature_profile: BTreeMap<i32, f64> = profile_rows
            .into_iter()
            .map(|row| (row.day_number, row.temperature_c))
            .collect();
        let stage_overrides: HashMap<String, f64> = override_rows
            .into_iter()
            .map(|row| (normalize_stage(&row.lifecycle_stage), row.value))
            .collect();

        Ok(TgcModel {
            id: model.id,
            name: model.name,
            tgc_value: model.tgc_value,
            exponent_n: model.exponent_n,
            exponent_m: model.exponent_m,
            stage_overrides,
            temperature_profile,
        })
    }

    async fn load_mortality_model(&self, model_id: i64) -> Result<MortalityModel, StorageError> {
        let model = sqlx::query_as::<_, MortalityModelRow>(
            "SELECT id, name, rate_percent, frequency FROM mortality_models WHERE id = $1",
        )
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)?
        .ok_or_else(|| StorageError::NotFound(format!("mortality model {model_id}")))?;

        let override_rows = sqlx::query_as::<_, StageValueRow>(
            r#"
            SELECT lifecycle_stage, rate_percent AS value
            FROM mortality_stage_overrides
            WHERE mortality_model_id = $1
            "#,
        )
        .bind(model_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        let frequency = match model.frequency.as_str() {
            "weekly" => RateFrequency::Weekly,
            _ => RateFrequency::Daily,
        };
        let stage_overrides: HashMap<String, f64> = override_rows
            .into_iter()
            .map(|row| (normalize_stage(&row.lifecycle_stage), row.value))
            .collect();

        Ok(MortalityModel {
            id: model.id,
            name: model.name,
            rate_percent: model.rate_percent,
            frequency,
            stage_overrides,
        })
    }

    async fn load_constraints(&self, set_id: i64) -> Result<Vec<StageConstraint>, StorageError> {
        let rows = sqlx::query_as::<_, ConstraintRow>(
            r#"
            SELECT lifecycle_stage, min_weight_g, max_weight_g,
                   max_freshwater_weight_g, min_temperature_c, max_temperature_c
            FROM stage_constraints
            WHERE constraint_set_id = $1
            "#,
        )
        .bind(set_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| StageConstraint {
                lifecycle_stage: row.lifecycle_stage,
                min_weight_g: row.min_weight_g,
                max_weight_g: row.max_weight_g,
                max_freshwater_weight_g: row.max_freshwater_weight_g,
                min_temperature_c: row.min_temperature_c,
                max_temperature_c: row.max_temperature_c,
            })
            .collect())
    }
}
