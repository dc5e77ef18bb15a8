//! Temperature resolver: measured, interpolated, nearest, profile, none.

use chrono::NaiveDate;

use aquatrack_domain::{TempSource, TgcModel, WindowObservations};

/// How far a reading may sit from the target date and still be usable.
const LOOKAROUND_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempResolution {
    pub temp_c: Option<f64>,
    pub source: TempSource,
    pub confidence: f64,
}

/// Resolve water temperature for one day, first match wins:
/// measured mean, interpolation between flanking readings, nearest reading
/// within seven days, the model's temperature profile, nothing.
pub fn resolve_temperature(
    data: &WindowObservations,
    tgc: &TgcModel,
    date: NaiveDate,
    day_number: i32,
) -> TempResolution {
    if let Some(reading) = data.temperatures.iter().find(|r| r.date == date) {
        return TempResolution {
            temp_c: Some(reading.value_c),
            source: TempSource::Measured,
            confidence: 1.0,
        };
    }

    let before = data
        .temperatures
        .iter()
        .filter(|r| r.date < date && (date - r.date).num_days() <= LOOKAROUND_DAYS)
        .max_by_key(|r| r.date);
    let after = data
        .temperatures
        .iter()
        .filter(|r| r.date > date && (r.date - date).num_days() <= LOOKAROUND_DAYS)
        .min_by_key(|r| r.date);

    match (before, after) {
        (Some(before), Some(after)) => {
            let span_days = (after.date - before.date).num_days();
            let from_before = (date - before.date).num_days();
            let interpolated = before.value_c
                + (after.value_c - before.value_c) * from_before as f64 / span_days as f64;
            // Confidence degrades with gap size.
            let confidence = (0.9 - span_days as f64 / 30.0).max(0.4);
            TempResolution {
                temp_c: Some(interpolated),
                source: TempSource::Interpolated,
                confidence,
            }
        }
        (Some(before), None) => TempResolution {
            temp_c: Some(before.value_c),
            source: TempSource::NearestBefore,
            confidence: 0.6,
        },
        (None, Some(after)) => TempResolution {
            temp_c: Some(after.value_c),
            source: TempSource::NearestAfter,
            confidence: 0.6,
        },
        (None, None) => match tgc.temperature_profile.get(&day_number) {
            Some(profile_temp) => TempResolution {
                temp_c: Some(*profile_temp),
                source: TempSource::Profile,
                confidence: 0.5,
            },
            None => TempResolution {
                temp_c: None,
                source: TempSource::None,
                confidence: 0.0,
            },
        },
    }
}
