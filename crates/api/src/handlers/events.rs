//! Event-in hooks: collaborators notify us after creating feeding events
//! and growth samples; we answer with the recompute tasks we enqueued.
//!
//! Creating a feeding event must never fail because of downstream
//! assimilation: recoverable errors here are logged and swallowed.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use validator::Validate;

use aquatrack_domain::{DomainError, FeedingEventCreated, GrowthSampleCreated, TriggerAccepted};
use aquatrack_engine::JobSpec;

use crate::AppState;

/// A feeding event was created for an assignment: recompute the batch over
/// the trailing rolling window.
pub async fn feeding_event_created(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FeedingEventCreated>,
) -> Result<(StatusCode, Json<TriggerAccepted>), DomainError> {
    req.validate()
        .map_err(DomainError::from_validation_errors)?;

    let assignment = match state.master.find_assignment(req.assignment_id).await {
        Ok(Some(assignment)) if assignment.is_active => assignment,
        Ok(_) => {
            tracing::debug!(
                assignment_id = req.assignment_id,
                "feeding trigger for missing or inactive assignment; skipping"
            );
            return Ok((StatusCode::ACCEPTED, Json(TriggerAccepted { task_ids: vec![] })));
        }
        Err(err) => {
            tracing::error!(
                assignment_id = req.assignment_id,
                error = %err,
                "feeding trigger lookup failed; skipping recompute"
            );
            return Ok((StatusCode::ACCEPTED, Json(TriggerAccepted { task_ids: vec![] })));
        }
    };

    let today = Utc::now().date_naive();
    let receipt = state.scheduler.enqueue(JobSpec::rolling(
        assignment.batch_id,
        state.config.recompute_window_days,
        today,
    ));

    tracing::info!(
        assignment_id = req.assignment_id,
        batch_id = assignment.batch_id,
        amount_kg = req.amount_kg,
        task_id = %receipt.task_id,
        "feeding event trigger enqueued recompute"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerAccepted { task_ids: vec![receipt.task_id] }),
    ))
}

/// A growth sample was created: refresh `last_weighing_date` on the batch's
/// active assignments, then recompute the rolling window. The anchor
/// detector re-reads samples from storage, so the enqueue is all the
/// invalidation needed.
pub async fn growth_sample_created(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GrowthSampleCreated>,
) -> Result<(StatusCode, Json<TriggerAccepted>), DomainError> {
    req.validate()
        .map_err(DomainError::from_validation_errors)?;

    match state.master.touch_last_weighing(req.batch_id, req.date).await {
        Ok(touched) => {
            tracing::debug!(
                batch_id = req.batch_id,
                touched,
                date = %req.date,
                "last_weighing_date refreshed"
            );
        }
        Err(err) => {
            tracing::error!(
                batch_id = req.batch_id,
                error = %err,
                "failed to refresh last_weighing_date"
            );
        }
    }

    let today = Utc::now().date_naive();
    let receipt = state.scheduler.enqueue(JobSpec::rolling(
        req.batch_id,
        state.config.recompute_window_days,
        today,
    ));

    tracing::info!(
        batch_id = req.batch_id,
        assignment_id = req.assignment_id,
        avg_weight_g = req.avg_weight_g,
        task_id = %receipt.task_id,
        "growth sample trigger enqueued recompute"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerAccepted { task_ids: vec![receipt.task_id] }),
    ))
}
