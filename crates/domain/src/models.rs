//! Master-data entities and observation rows consumed by the engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A cohort of fish tracked through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub batch_number: String,
    pub species: String,
    pub start_date: NaiveDate,
    pub lifecycle_stage: String,
    pub pinned_projection_id: Option<i64>,
    pub status: String,
}

/// A physical holding unit. `freshwater` is true for hall-located units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: i64,
    pub name: String,
    pub freshwater: bool,
}

/// Residency of a batch in a container over a date range.
///
/// `assignment_date` is inclusive; `departure_date` is exclusive: ownership
/// transfers to the next assignment on the departure day itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub batch_id: i64,
    pub container_id: i64,
    pub lifecycle_stage: String,
    pub assignment_date: NaiveDate,
    pub departure_date: Option<NaiveDate>,
    pub population_count: i64,
    pub avg_weight_g: Option<f64>,
    pub is_active: bool,
    pub last_weighing_date: Option<NaiveDate>,
}

/// An ordered biological phase for a species.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleStage {
    pub id: i64,
    pub species: String,
    pub name: String,
    pub stage_order: i32,
    pub expected_weight_min_g: Option<f64>,
    pub expected_weight_max_g: Option<f64>,
}

/// Per-stage bounds from the constraint set on the batch's projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConstraint {
    pub lifecycle_stage: String,
    pub min_weight_g: Option<f64>,
    pub max_weight_g: Option<f64>,
    pub max_freshwater_weight_g: Option<f64>,
    pub min_temperature_c: Option<f64>,
    pub max_temperature_c: Option<f64>,
}

/// The projection pinned to a batch; reaches the TGC/mortality models and
/// the constraint set used by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projection {
    pub id: i64,
    pub name: String,
    pub initial_weight_g: Option<f64>,
}

/// Thermal-growth model. The exponents are carried for round-trip fidelity
/// with imported models; the canonical cube-root path ignores them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TgcModel {
    pub id: i64,
    pub name: String,
    /// Base TGC, per 1000 degree-days.
    pub tgc_value: f64,
    pub exponent_n: f64,
    pub exponent_m: f64,
    /// Per-stage TGC overrides keyed by normalized stage name.
    pub stage_overrides: HashMap<String, f64>,
    /// Last-resort temperature source: day_number -> °C.
    pub temperature_profile: BTreeMap<i32, f64>,
}

/// How often a mortality rate applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateFrequency {
    Daily,
    Weekly,
}

/// Baseline mortality model with optional per-stage overrides.
///
/// Rates are stored as percentages (e.g. 0.05 means 0.05 %/day).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MortalityModel {
    pub id: i64,
    pub name: String,
    pub rate_percent: f64,
    pub frequency: RateFrequency,
    /// Per-stage daily rate overrides (percent), keyed by normalized stage name.
    pub stage_overrides: HashMap<String, f64>,
}

impl MortalityModel {
    /// Daily mortality rate as a fraction for the given normalized stage name.
    ///
    /// Weekly base rates compound down to a daily equivalent.
    pub fn daily_rate(&self, stage: Option<&str>) -> f64 {
        if let Some(stage) = stage {
            if let Some(rate) = self.stage_overrides.get(stage) {
                return rate / 100.0;
            }
        }
        let base = self.rate_percent / 100.0;
        match self.frequency {
            RateFrequency::Daily => base,
            RateFrequency::Weekly => 1.0 - (1.0 - base).powf(1.0 / 7.0),
        }
    }
}

/// How operators picked the fish whose weight a transfer records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionMethod {
    #[default]
    Average,
    Largest,
    Smallest,
}

impl SelectionMethod {
    /// Parse the stored text form; anything unrecognized reads as Average.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("LARGEST") => Self::Largest,
            Some("SMALLEST") => Self::Smallest,
            _ => Self::Average,
        }
    }
}

/// Daily mean water temperature for a container (°C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub date: NaiveDate,
    pub value_c: f64,
}

/// A weighing of a sample of fish from an assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthSample {
    pub id: i64,
    pub assignment_id: i64,
    pub sample_date: NaiveDate,
    pub avg_weight_g: Option<f64>,
    pub sample_size: Option<i32>,
}

/// A completed transfer out of an assignment (this assignment is the source).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOut {
    pub id: i64,
    pub execution_date: NaiveDate,
    pub measured_avg_weight_g: Option<f64>,
    pub selection_method: SelectionMethod,
}

/// A completed transfer into an assignment (this assignment is the destination).
///
/// The source-side weight fields are resolved by the loader so the bootstrap
/// ladder never reaches back into storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferIn {
    pub id: i64,
    pub execution_date: NaiveDate,
    pub transferred_count: i64,
    pub measured_avg_weight_g: Option<f64>,
    pub source_assignment_id: Option<i64>,
    pub source_latest_state_weight_g: Option<f64>,
    pub source_avg_weight_g: Option<f64>,
}

/// A treatment that included a weighing, with the mean of its individual
/// fish observations (grams) when any were recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentWeighing {
    pub id: i64,
    pub date: NaiveDate,
    pub mean_observed_weight_g: Option<f64>,
}

/// Recorded deaths for an assignment on a date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MortalityEvent {
    pub id: i64,
    pub event_date: NaiveDate,
    pub count: i64,
}

/// Feed delivered to a container on a date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedingEvent {
    pub id: i64,
    pub feeding_date: NaiveDate,
    pub amount_kg: f64,
}

/// Normalize a stage name for lookups: lowercase, separators collapsed to `_`.
pub fn normalize_stage(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}
