//! Read surface for stored daily states.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{NaiveDate, Utc};

use aquatrack_domain::{DailyState, DomainError};

use crate::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct StateRangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Stored rows for one assignment, ordered by date. Defaults to the
/// assignment's whole life up to today.
pub async fn list_daily_states(
    State(state): State<Arc<AppState>>,
    Path(assignment_id): Path<i64>,
    Query(query): Query<StateRangeQuery>,
) -> Result<Json<Vec<DailyState>>, DomainError> {
    let assignment = state
        .master
        .find_assignment(assignment_id)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?
        .ok_or_else(|| DomainError::NotFound(format!("assignment {assignment_id}")))?;

    let start = query.start_date.unwrap_or(assignment.assignment_date);
    let end = query.end_date.unwrap_or_else(|| Utc::now().date_naive());
    if start > end {
        return Err(DomainError::Validation(
            "end_date: must be on or after start_date".to_string(),
        ));
    }

    let rows = state
        .states
        .list_range(assignment_id, start, end)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

    Ok(Json(rows))
}
