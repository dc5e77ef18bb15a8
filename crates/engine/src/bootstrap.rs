//! Bootstrap resolver: day-0 state for an assignment with no prior history.

use aquatrack_domain::{AssignmentContext, WeightSource, WindowObservations};

use crate::recompute::DayState;

/// The bootstrapped day-0 state plus the provenance of its weight: the
/// first day of a bootstrapped window records this weight as-is instead of
/// growing it, so the tag survives onto the stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapState {
    pub state: DayState,
    pub weight_source: WeightSource,
    pub weight_confidence: f64,
}

/// Produce the initial (weight, population, biomass, stage) for the first
/// day of a window with no earlier stored state.
///
/// The weight ladder is an ordered list of resolvers; the first hit wins:
/// 1. a completed transfer in: measured weight, else the source
///    assignment's latest stored state, else the source's own weight
///    (transfers outrank the assignment's `avg_weight_g` because the event
///    pipeline may pre-populate the destination with a stage minimum),
/// 2. the assignment's own weight, unless it is a transfer destination,
/// 3. the constraint set's minimum for the stage,
/// 4. the projection's initial weight,
/// 5. the stage's expected minimum,
/// 6. 1.0 g.
///
/// Only a transfer's measured weight counts as measured; every other rung
/// is an estimate and tags as unchanged.
pub fn bootstrap_state(ctx: &AssignmentContext, data: &WindowObservations) -> BootstrapState {
    let assignment = &ctx.assignment;
    let stage = assignment.lifecycle_stage.clone();
    let transfer_in = data.transfers_in.first();

    let measured = transfer_in
        .and_then(|t| t.measured_avg_weight_g)
        .filter(|w| *w > 0.0);

    let (weight_g, weight_source, weight_confidence) = match measured {
        Some(weight) => (weight, WeightSource::Measured, 0.95),
        None => {
            let ladder: Vec<Box<dyn Fn() -> Option<f64> + '_>> = vec![
                Box::new(|| transfer_in.and_then(|t| t.source_latest_state_weight_g)),
                Box::new(|| transfer_in.and_then(|t| t.source_avg_weight_g)),
                Box::new(|| {
                    if transfer_in.is_some() {
                        None
                    } else {
                        assignment.avg_weight_g
                    }
                }),
                Box::new(|| ctx.constraint_for(&stage).and_then(|c| c.min_weight_g)),
                Box::new(|| ctx.projection.initial_weight_g),
                Box::new(|| {
                    ctx.stage_by_name(&stage)
                        .and_then(|s| s.expected_weight_min_g)
                }),
            ];
            let weight = ladder
                .iter()
                .find_map(|resolve| resolve().filter(|w| *w > 0.0))
                .unwrap_or(1.0);
            (weight, WeightSource::Unchanged, 0.3)
        }
    };

    // A transfer destination whose fish arrive on the assignment date starts
    // at zero; the day-0 placement adds them without double-counting.
    let placed_on_assignment_date = data
        .transfers_in
        .iter()
        .any(|t| t.execution_date == assignment.assignment_date);
    let population = if placed_on_assignment_date {
        tracing::info!(
            assignment_id = assignment.id,
            population_count = assignment.population_count,
            "transfer destination on assignment date; bootstrapping population from zero"
        );
        0
    } else {
        assignment.population_count
    };

    BootstrapState {
        state: DayState {
            weight_g,
            population,
            biomass_kg: population as f64 * weight_g / 1000.0,
            stage,
        },
        weight_source,
        weight_confidence,
    }
}
