//! The per-day reconstructed snapshot and its provenance tags.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::anchors::AnchorType;

/// Where a day's weight value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    Measured,
    TgcComputed,
    Unchanged,
}

/// Where a day's temperature came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempSource {
    Measured,
    Interpolated,
    NearestBefore,
    NearestAfter,
    Profile,
    None,
}

/// Where a day's mortality count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MortalitySource {
    Actual,
    Model,
}

/// Where a day's feed amount came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    Actual,
    None,
}

/// Where a day's FCR came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FcrSource {
    Observed,
    Model,
}

/// Provenance tags for the five derived fields of a daily state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<WeightSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<TempSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mortality: Option<MortalitySource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<FeedSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcr: Option<FcrSource>,
}

/// Confidence in [0,1] for each tagged field. Keys mirror [`FieldSources`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mortality: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcr: Option<f64>,
}

/// One reconstructed day for one assignment. Stored rows are unique per
/// (assignment_id, date) and only ever written by the range recomputer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyState {
    pub assignment_id: i64,
    pub date: NaiveDate,
    pub day_number: i32,
    pub avg_weight_g: f64,
    pub population: i64,
    pub biomass_kg: f64,
    pub temp_c: Option<f64>,
    pub mortality_count: i64,
    pub feed_kg: f64,
    pub observed_fcr: Option<f64>,
    pub anchor_type: Option<AnchorType>,
    pub lifecycle_stage: String,
    pub sources: FieldSources,
    pub confidence_scores: FieldConfidence,
}

/// Round to two decimals (weights, biomass, temperatures, feed).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to three decimals (FCR).
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
