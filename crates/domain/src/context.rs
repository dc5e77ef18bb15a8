//! Loaded aggregates the engine computes over.
//!
//! Master data is read once per job and passed by reference; the window
//! observations carry everything a day loop can touch, so the per-day step
//! never reaches back into storage.

use chrono::NaiveDate;

use crate::models::{
    Assignment, Batch, Container, FeedingEvent, GrowthSample, LifecycleStage, MortalityEvent,
    MortalityModel, Projection, StageConstraint, TemperatureReading, TgcModel, TransferIn,
    TransferOut, TreatmentWeighing, normalize_stage,
};

/// Read-only master data for one (assignment, job). Cached for the lifetime
/// of the job; admin changes to master data are followed by an explicit
/// recompute, so coherency is not required.
#[derive(Debug, Clone)]
pub struct AssignmentContext {
    pub batch: Batch,
    pub assignment: Assignment,
    pub container: Container,
    /// Stages of the batch's species, ordered by `stage_order`.
    pub stages: Vec<LifecycleStage>,
    pub projection: Projection,
    pub tgc: TgcModel,
    pub mortality: MortalityModel,
    pub constraints: Vec<StageConstraint>,
}

impl AssignmentContext {
    /// 1-based day number relative to the batch start.
    pub fn day_number(&self, date: NaiveDate) -> i32 {
        (date - self.batch.start_date).num_days() as i32 + 1
    }

    pub fn stage_by_name(&self, name: &str) -> Option<&LifecycleStage> {
        let wanted = normalize_stage(name);
        self.stages
            .iter()
            .find(|stage| normalize_stage(&stage.name) == wanted)
    }

    /// The next stage by order within the species, if any.
    pub fn next_stage(&self, current: &str) -> Option<&LifecycleStage> {
        let current = self.stage_by_name(current)?;
        self.stages
            .iter()
            .filter(|stage| stage.stage_order > current.stage_order)
            .min_by_key(|stage| stage.stage_order)
    }

    pub fn constraint_for(&self, stage: &str) -> Option<&StageConstraint> {
        let wanted = normalize_stage(stage);
        self.constraints
            .iter()
            .find(|c| normalize_stage(&c.lifecycle_stage) == wanted)
    }
}

/// Observations loaded for one recompute window.
///
/// Temperatures cover seven days either side of the window for the
/// interpolation ladder; transfers-in are loaded for the whole assignment
/// life because bootstrap inspects them regardless of window.
#[derive(Debug, Clone, Default)]
pub struct WindowObservations {
    pub temperatures: Vec<TemperatureReading>,
    pub growth_samples: Vec<GrowthSample>,
    pub transfers_out: Vec<TransferOut>,
    pub transfers_in: Vec<TransferIn>,
    pub treatments: Vec<TreatmentWeighing>,
    pub mortality_events: Vec<MortalityEvent>,
    pub feeding_events: Vec<FeedingEvent>,
}
