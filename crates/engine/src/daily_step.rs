//! The per-day step: compose the resolvers into one day's new state.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use aquatrack_domain::{
    Anchor, AssignmentContext, DailyState, DayError, FcrSource, FieldConfidence, FieldSources,
    WeightSource, WindowObservations, round2, round3,
};

use crate::feed::resolve_feed;
use crate::growth::{daily_growth, transition_stage};
use crate::mortality::resolve_mortality;
use crate::placements::resolve_placements;
use crate::recompute::DayState;
use crate::settings::AssimilationSettings;
use crate::temperature::resolve_temperature;

/// Weight confidence when growth is TGC-computed never exceeds this.
const TGC_WEIGHT_CONFIDENCE_CAP: f64 = 0.8;
/// Weight confidence when neither anchor nor temperature is available.
const CARRY_FORWARD_CONFIDENCE: f64 = 0.3;

/// Compute one day's [`DailyState`] from the previous day's state.
///
/// Pure: everything it reads was loaded up front. Anchors overwrite the
/// computed weight; otherwise TGC growth applies when a temperature is
/// available and the weight carries forward when it is not.
///
/// `bootstrap_weight` is set on the first day of a bootstrapped window: the
/// day records the initial weight under the given provenance instead of
/// growing it. An anchor on the same date still wins.
pub fn compute_day(
    ctx: &AssignmentContext,
    data: &WindowObservations,
    settings: &AssimilationSettings,
    date: NaiveDate,
    prev: &DayState,
    anchors: &BTreeMap<NaiveDate, Anchor>,
    bootstrap_weight: Option<(WeightSource, f64)>,
) -> Result<DailyState, DayError> {
    if !prev.weight_g.is_finite() || prev.weight_g <= 0.0 {
        return Err(DayError {
            date,
            message: format!("previous weight {} is not usable", prev.weight_g),
        });
    }

    let mut sources = FieldSources::default();
    let mut confidence = FieldConfidence::default();
    let day_number = ctx.day_number(date);

    let anchor = anchors.get(&date);
    let measured_weight = anchor.map(|anchor| {
        sources.weight = Some(WeightSource::Measured);
        confidence.weight = Some(anchor.confidence);
        anchor.weight_g
    });

    let temp = resolve_temperature(data, &ctx.tgc, date, day_number);
    sources.temp = Some(temp.source);
    confidence.temp = Some(temp.confidence);

    let mortality = resolve_mortality(data, &ctx.mortality, date, prev.population, &prev.stage);
    sources.mortality = Some(mortality.source);
    confidence.mortality = Some(mortality.confidence);

    let feed = resolve_feed(data, date);
    sources.feed = Some(feed.source);
    confidence.feed = Some(feed.confidence);

    let placements = resolve_placements(data, date);

    let new_population = (prev.population + placements - mortality.count).max(0);

    let new_weight = match (measured_weight, bootstrap_weight) {
        (Some(weight), _) => weight,
        (None, Some((source, source_confidence))) => {
            sources.weight = Some(source);
            confidence.weight = Some(source_confidence);
            prev.weight_g
        }
        (None, None) => match temp.temp_c {
            Some(temp_c) => {
                sources.weight = Some(WeightSource::TgcComputed);
                confidence.weight = Some(temp.confidence.min(TGC_WEIGHT_CONFIDENCE_CAP));
                daily_growth(settings, &ctx.tgc, &prev.stage, prev.weight_g, temp_c)
            }
            None => {
                sources.weight = Some(WeightSource::Unchanged);
                confidence.weight = Some(CARRY_FORWARD_CONFIDENCE);
                prev.weight_g
            }
        },
    };

    let rounded_weight = round2(new_weight);
    let new_biomass = round2(new_population as f64 * rounded_weight / 1000.0);

    let biomass_gain = new_biomass - prev.biomass_kg;
    let mut observed_fcr = None;
    if feed.feed_kg > 0.0 && biomass_gain > settings.fcr_gain_floor_kg {
        let fcr = feed.feed_kg / biomass_gain;
        if fcr > settings.fcr_cap {
            tracing::warn!(
                date = %date,
                fcr,
                feed_kg = feed.feed_kg,
                gain_kg = biomass_gain,
                "unusually high FCR capped"
            );
        }
        observed_fcr = Some(round3(fcr.min(settings.fcr_cap)));
        sources.fcr = Some(FcrSource::Observed);
        confidence.fcr = Some(1.0);
    } else if biomass_gain > settings.fcr_gain_floor_kg {
        // No recorded feed: flag the gap for the model-FCR join downstream.
        sources.fcr = Some(FcrSource::Model);
        confidence.fcr = Some(0.4);
    }

    let new_stage = transition_stage(ctx, new_weight, &prev.stage);

    Ok(DailyState {
        assignment_id: ctx.assignment.id,
        date,
        day_number,
        avg_weight_g: rounded_weight,
        population: new_population,
        biomass_kg: new_biomass,
        temp_c: temp.temp_c.map(round2),
        mortality_count: mortality.count,
        feed_kg: round2(feed.feed_kg),
        observed_fcr,
        anchor_type: anchor.map(|anchor| anchor.anchor_type),
        lifecycle_stage: new_stage,
        sources,
        confidence_scores: confidence,
    })
}
