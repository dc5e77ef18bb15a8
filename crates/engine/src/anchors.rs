//! Anchor detector: fold candidate observations into one anchor per date.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use aquatrack_domain::{Anchor, AnchorType, SelectionMethod, WindowObservations};

use crate::settings::AssimilationSettings;

/// Collect candidate anchors in `[start, end]` and keep, per date, the one
/// with the lowest priority number. Ties keep the earlier candidate.
pub fn detect_anchors(
    data: &WindowObservations,
    settings: &AssimilationSettings,
    start: NaiveDate,
    end: NaiveDate,
) -> BTreeMap<NaiveDate, Anchor> {
    let mut anchors: BTreeMap<NaiveDate, Anchor> = BTreeMap::new();

    let mut offer = |candidate: Anchor| {
        match anchors.get(&candidate.date) {
            Some(existing) if existing.priority() <= candidate.priority() => {}
            _ => {
                anchors.insert(candidate.date, candidate);
            }
        }
    };

    for sample in &data.growth_samples {
        if sample.sample_date < start || sample.sample_date > end {
            continue;
        }
        let Some(weight) = sample.avg_weight_g.filter(|w| *w > 0.0) else {
            continue;
        };
        offer(Anchor {
            anchor_type: AnchorType::GrowthSample,
            date: sample.sample_date,
            weight_g: weight,
            confidence: 1.0,
            source_id: sample.id,
        });
    }

    for transfer in &data.transfers_out {
        if transfer.execution_date < start || transfer.execution_date > end {
            continue;
        }
        let Some(measured) = transfer.measured_avg_weight_g.filter(|w| *w > 0.0) else {
            continue;
        };
        offer(Anchor {
            anchor_type: AnchorType::Transfer,
            date: transfer.execution_date,
            weight_g: adjust_for_selection_bias(measured, transfer.selection_method, settings),
            confidence: 0.95,
            source_id: transfer.id,
        });
    }

    for treatment in &data.treatments {
        if treatment.date < start || treatment.date > end {
            continue;
        }
        let Some(mean_weight) = treatment.mean_observed_weight_g.filter(|w| *w > 0.0) else {
            continue;
        };
        offer(Anchor {
            anchor_type: AnchorType::Vaccination,
            date: treatment.date,
            weight_g: mean_weight,
            confidence: 0.90,
            source_id: treatment.id,
        });
    }

    anchors
}

/// Correct a transfer's measured weight for operator selection bias.
///
/// Picking the largest fish skews the measurement above the population
/// average; picking the smallest skews it below.
pub fn adjust_for_selection_bias(
    measured_weight: f64,
    selection_method: SelectionMethod,
    settings: &AssimilationSettings,
) -> f64 {
    match selection_method {
        SelectionMethod::Largest => measured_weight * settings.bias_largest,
        SelectionMethod::Smallest => measured_weight * settings.bias_smallest,
        SelectionMethod::Average => measured_weight,
    }
}
