//! Mortality resolver: recorded events, else the model rate.

use chrono::NaiveDate;

use aquatrack_domain::{MortalityModel, MortalitySource, WindowObservations, normalize_stage};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MortalityResolution {
    pub count: i64,
    pub source: MortalitySource,
    pub confidence: f64,
}

/// Summed recorded deaths for the day, or the model's expected count
/// (`round(population × daily_rate)`) when nothing was recorded.
pub fn resolve_mortality(
    data: &WindowObservations,
    model: &MortalityModel,
    date: NaiveDate,
    current_population: i64,
    current_stage: &str,
) -> MortalityResolution {
    let actual: i64 = data
        .mortality_events
        .iter()
        .filter(|event| event.event_date == date)
        .map(|event| event.count)
        .sum();

    if actual > 0 {
        return MortalityResolution {
            count: actual,
            source: MortalitySource::Actual,
            confidence: 1.0,
        };
    }

    let daily_rate = model.daily_rate(Some(&normalize_stage(current_stage)));
    let expected = (current_population as f64 * daily_rate).round() as i64;
    MortalityResolution {
        count: expected.max(0),
        source: MortalitySource::Model,
        confidence: 0.4,
    }
}
