//! Admin recompute and projection-pinning handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use validator::Validate;

use aquatrack_domain::{DomainError, PinProjectionRequest, RecomputeAccepted, RecomputeRequest};
use aquatrack_engine::JobSpec;

use crate::AppState;
use crate::middleware::auth::AdminApiKey;

/// Manual recompute trigger (admin endpoint).
///
/// Enqueues one batch-level job and returns immediately with its task id.
pub async fn recompute_batch(
    State(state): State<Arc<AppState>>,
    _admin: AdminApiKey,
    Path(batch_id): Path<i64>,
    Json(req): Json<RecomputeRequest>,
) -> Result<(StatusCode, Json<RecomputeAccepted>), DomainError> {
    req.validate()
        .map_err(DomainError::from_validation_errors)?;
    req.check_window()?;

    let batch = state
        .master
        .find_batch(batch_id)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?
        .ok_or_else(|| DomainError::NotFound(format!("batch {batch_id}")))?;

    let receipt = state.scheduler.enqueue(JobSpec {
        batch_id: batch.id,
        start_date: req.start_date,
        end_date: req.end_date,
        assignment_ids: req.assignment_ids.clone(),
    });

    tracing::info!(
        batch_id,
        batch = %batch.batch_number,
        start = %req.start_date,
        end = ?req.end_date,
        task_id = %receipt.task_id,
        deduplicated = receipt.deduplicated,
        "recompute enqueued"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(RecomputeAccepted {
            batch_id,
            start_date: req.start_date,
            end_date: req.end_date,
            tasks_enqueued: usize::from(!receipt.deduplicated),
            task_ids: vec![receipt.task_id],
        }),
    ))
}

#[derive(Debug, serde::Serialize)]
pub struct PinProjectionResponse {
    pub success: bool,
    pub batch_id: i64,
    pub projection_id: i64,
}

/// Pin a projection to a batch; the engine reads its models through it.
pub async fn pin_projection(
    State(state): State<Arc<AppState>>,
    _admin: AdminApiKey,
    Path(batch_id): Path<i64>,
    Json(req): Json<PinProjectionRequest>,
) -> Result<Json<PinProjectionResponse>, DomainError> {
    let exists = state
        .master
        .projection_exists(req.projection_id)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    if !exists {
        return Err(DomainError::NotFound(format!(
            "projection {}",
            req.projection_id
        )));
    }

    let pinned = state
        .master
        .pin_projection(batch_id, req.projection_id)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    if !pinned {
        return Err(DomainError::NotFound(format!("batch {batch_id}")));
    }

    tracing::info!(batch_id, projection_id = req.projection_id, "projection pinned");

    Ok(Json(PinProjectionResponse {
        success: true,
        batch_id,
        projection_id: req.projection_id,
    }))
}
