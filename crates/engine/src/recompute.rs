//! Range recomputer and batch orchestrator: validate the window, load
//! context and observations, run the day loop, upsert transactionally.

use chrono::{Duration, NaiveDate, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use aquatrack_domain::{
    Anchor, Assignment, AssignmentContext, AssignmentResult, Batch, BatchRecomputeOutcome,
    DailyState, DayError, RecomputeOutcome, WindowObservations,
};
use aquatrack_storage::{
    DailyStateRepository, MasterDataRepository, ObservationRepository,
};

use crate::anchors::detect_anchors;
use crate::bootstrap::{BootstrapState, bootstrap_state};
use crate::daily_step::compute_day;
use crate::error::EngineError;
use crate::settings::AssimilationSettings;

/// The running (weight, population, biomass, stage) carried day to day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayState {
    pub weight_g: f64,
    pub population: i64,
    pub biomass_kg: f64,
    pub stage: String,
}

impl From<&DailyState> for DayState {
    fn from(row: &DailyState) -> Self {
        DayState {
            weight_g: row.avg_weight_g,
            population: row.population,
            biomass_kg: row.biomass_kg,
            stage: row.lifecycle_stage.clone(),
        }
    }
}

/// A validated, clamped recompute window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPlan {
    /// Nothing to compute: the clamped window is empty.
    Skipped,
    Range { start: NaiveDate, end: NaiveDate },
}

/// Validate and clamp a requested window against batch and assignment
/// boundaries.
///
/// Inverted input dates are a validation error. The start clamps up to the
/// batch start and the assignment date; the end clamps below the departure
/// date (the departure day belongs to the next assignment: computing it
/// here would double-count biomass). An empty result after clamping is a
/// skip, not an error.
pub fn plan_window(
    batch: &Batch,
    assignment: &Assignment,
    start: NaiveDate,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<WindowPlan, EngineError> {
    let end = end.unwrap_or(today);
    if start > end {
        return Err(EngineError::Validation(format!(
            "start_date ({start}) must be on or before end_date ({end})"
        )));
    }

    let start = start.max(batch.start_date).max(assignment.assignment_date);
    if start > end {
        return Ok(WindowPlan::Skipped);
    }

    let end = match assignment.departure_date {
        Some(departure) if end >= departure => {
            let adjusted = departure - Duration::days(1);
            if start > adjusted {
                return Ok(WindowPlan::Skipped);
            }
            adjusted
        }
        _ => end,
    };

    Ok(WindowPlan::Range { start, end })
}

/// Where the window's initial state came from.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialState {
    /// The most recent stored row before the window start.
    Stored(DayState),
    /// No earlier row exists: the bootstrap ladder supplied day zero, and
    /// the window's first day records that weight under its provenance.
    Bootstrap(BootstrapState),
}

/// Run the day loop over a clamped window, starting from `initial`.
///
/// Pure: the caller has already loaded context and observations. A failed
/// day is recorded and skipped; the loop carries the last good state so one
/// bad day does not abort the rest.
pub fn compute_window(
    ctx: &AssignmentContext,
    data: &WindowObservations,
    settings: &AssimilationSettings,
    start: NaiveDate,
    end: NaiveDate,
    initial: InitialState,
) -> (Vec<DailyState>, Vec<DayError>, BTreeMap<NaiveDate, Anchor>) {
    let anchors = detect_anchors(data, settings, start, end);

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    let (mut prev, mut bootstrap_weight) = match initial {
        InitialState::Stored(state) => (state, None),
        InitialState::Bootstrap(boot) => (
            boot.state,
            Some((boot.weight_source, boot.weight_confidence)),
        ),
    };

    let mut date = start;
    while date <= end {
        match compute_day(ctx, data, settings, date, &prev, &anchors, bootstrap_weight.take()) {
            Ok(state) => {
                prev = DayState::from(&state);
                rows.push(state);
            }
            Err(err) => {
                tracing::error!(
                    assignment_id = ctx.assignment.id,
                    date = %err.date,
                    error = %err.message,
                    "day computation failed"
                );
                errors.push(err);
            }
        }
        date += Duration::days(1);
    }

    (rows, errors, anchors)
}

/// Async recompute service over the storage repositories.
///
/// Holds the per-assignment mutex table: two jobs touching the same
/// assignment serialize here, while different assignments of one batch run
/// in parallel.
pub struct Recomputer {
    master: MasterDataRepository,
    observations: ObservationRepository,
    states: DailyStateRepository,
    settings: AssimilationSettings,
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl Recomputer {
    pub fn new(
        master: MasterDataRepository,
        observations: ObservationRepository,
        states: DailyStateRepository,
        settings: AssimilationSettings,
    ) -> Self {
        Self {
            master,
            observations,
            states,
            settings,
            locks: DashMap::new(),
        }
    }

    pub fn master(&self) -> &MasterDataRepository {
        &self.master
    }

    pub fn states(&self) -> &DailyStateRepository {
        &self.states
    }

    fn assignment_lock(&self, assignment_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry(assignment_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Recompute one assignment over `[start, end ?? today]`.
    ///
    /// Idempotent: the same window upserts byte-identical rows on a re-run.
    pub async fn recompute_assignment(
        &self,
        assignment_id: i64,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<RecomputeOutcome, EngineError> {
        let lock = self.assignment_lock(assignment_id);
        let _guard = lock.lock().await;

        let ctx = self.master.load_context(assignment_id).await?;
        let today = Utc::now().date_naive();

        let WindowPlan::Range { start, end } =
            plan_window(&ctx.batch, &ctx.assignment, start, end, today)?
        else {
            tracing::info!(
                assignment_id,
                "window empty after clamping; skipping recompute"
            );
            return Ok(RecomputeOutcome::skipped());
        };

        tracing::info!(
            assignment_id,
            batch = %ctx.batch.batch_number,
            container = %ctx.container.name,
            start = %start,
            end = %end,
            "recomputing daily states"
        );

        let data = self
            .observations
            .load_window(assignment_id, ctx.container.id, start, end)
            .await?;

        let initial = match self.states.latest_before(assignment_id, start).await? {
            Some(row) => InitialState::Stored(DayState::from(&row)),
            None => InitialState::Bootstrap(bootstrap_state(&ctx, &data)),
        };

        let (rows, mut errors, anchors) =
            compute_window(&ctx, &data, &self.settings, start, end, initial);

        let persisted = self.states.upsert_window(&rows).await?;
        errors.extend(persisted.errors);

        tracing::info!(
            assignment_id,
            rows_created = persisted.created,
            rows_updated = persisted.updated,
            anchors_found = anchors.len(),
            errors = errors.len(),
            "recompute complete"
        );

        Ok(RecomputeOutcome {
            rows_created: persisted.created,
            rows_updated: persisted.updated,
            anchors_found: anchors.len() as u64,
            errors,
            skipped: false,
        })
    }

    /// Recompute every selected assignment of a batch, continuing past
    /// per-assignment failures.
    pub async fn recompute_batch(
        &self,
        batch_id: i64,
        start: NaiveDate,
        end: Option<NaiveDate>,
        assignment_ids: Option<&[i64]>,
    ) -> Result<BatchRecomputeOutcome, EngineError> {
        let batch = self
            .master
            .find_batch(batch_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("batch {batch_id}")))?;

        let today = Utc::now().date_naive();
        let assignments = match assignment_ids {
            Some(ids) => self.master.assignments_by_ids(batch_id, ids).await?,
            None => {
                self.master
                    .overlapping_assignments(batch_id, start, end.unwrap_or(today))
                    .await?
            }
        };

        let mut outcome = BatchRecomputeOutcome {
            batch_id,
            ..Default::default()
        };

        for assignment in &assignments {
            match self.recompute_assignment(assignment.id, start, end).await {
                Ok(result) => {
                    if !result.skipped {
                        outcome.assignments_processed += 1;
                        outcome.total_rows_created += result.rows_created;
                        outcome.total_rows_updated += result.rows_updated;
                        outcome.total_errors += result.errors.len() as u64;
                    }
                    outcome.assignment_results.push(AssignmentResult {
                        assignment_id: assignment.id,
                        result: Some(result),
                        error: None,
                    });
                }
                Err(err) => {
                    tracing::error!(
                        assignment_id = assignment.id,
                        error = %err,
                        "assignment recompute failed"
                    );
                    outcome.total_errors += 1;
                    outcome.assignment_results.push(AssignmentResult {
                        assignment_id: assignment.id,
                        result: None,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        tracing::info!(
            batch = %batch.batch_number,
            assignments_processed = outcome.assignments_processed,
            rows_created = outcome.total_rows_created,
            rows_updated = outcome.total_rows_updated,
            "batch recompute complete"
        );

        Ok(outcome)
    }
}
