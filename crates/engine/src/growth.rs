//! Thermal growth model: cube-root TGC step, stage caps, stage transitions.

use aquatrack_domain::{AssignmentContext, TgcModel, normalize_stage};

use crate::settings::AssimilationSettings;

/// Stages reared in freshwater; they grow against the freshwater reference
/// temperature regardless of the container reading.
const FRESHWATER_STAGES: [&str; 7] = [
    "egg",
    "alevin",
    "egg&alevin",
    "egg_alevin",
    "fry",
    "parr",
    "smolt",
];

pub fn is_freshwater_stage(stage: &str) -> bool {
    let normalized = normalize_stage(stage);
    FRESHWATER_STAGES.contains(&normalized.as_str())
}

/// Temperature the growth step actually uses for a stage.
pub fn effective_temperature(
    settings: &AssimilationSettings,
    stage: &str,
    resolved_temp_c: f64,
) -> f64 {
    if is_freshwater_stage(stage) {
        settings.freshwater_temp_c
    } else {
        resolved_temp_c
    }
}

/// One day of cube-root TGC growth, capped by the stage safety limit.
///
/// `new_weight = (w^(1/3) + tgc/1000 × effective_temp)^3`. The model's
/// temperature and weight exponents are intentionally unused here.
pub fn daily_growth(
    settings: &AssimilationSettings,
    tgc: &TgcModel,
    stage: &str,
    current_weight_g: f64,
    temp_c: f64,
) -> f64 {
    let normalized = normalize_stage(stage);
    let tgc_value = tgc
        .stage_overrides
        .get(&normalized)
        .copied()
        .unwrap_or(tgc.tgc_value);
    let dtgc = tgc_value / 1000.0;
    let effective_temp = effective_temperature(settings, stage, temp_c);

    let grown = (current_weight_g.cbrt() + dtgc * effective_temp).powi(3);
    match settings.stage_caps.cap_for(&normalized) {
        Some(cap) => grown.min(cap),
        None => grown,
    }
}

/// Decide the stage that labels the new day.
///
/// The transition threshold is the constraint set's `max_weight_g` for the
/// current stage, falling back to the stage's expected maximum. Crossing it
/// advances to the next stage by order within the species.
pub fn transition_stage(ctx: &AssignmentContext, new_weight_g: f64, current_stage: &str) -> String {
    let max_weight = ctx
        .constraint_for(current_stage)
        .and_then(|c| c.max_weight_g)
        .or_else(|| {
            ctx.stage_by_name(current_stage)
                .and_then(|stage| stage.expected_weight_max_g)
        });

    if let Some(max_weight) = max_weight {
        if new_weight_g >= max_weight {
            if let Some(next) = ctx.next_stage(current_stage) {
                tracing::info!(
                    from = current_stage,
                    to = %next.name,
                    weight_g = new_weight_g,
                    threshold_g = max_weight,
                    "stage transition"
                );
                return next.name.clone();
            }
        }
    }

    current_stage.to_string()
}
