//! Recompute job contracts: requests, event-in payloads, outcomes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Admin recompute request for one batch.
///
/// `end_date: None` means today; `assignment_ids: None` means every
/// assignment overlapping the window.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecomputeRequest {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[validate(length(max = 500, message = "at most 500 assignment ids per request"))]
    pub assignment_ids: Option<Vec<i64>>,
}

impl RecomputeRequest {
    /// Window-shape check the validator derive cannot express.
    pub fn check_window(&self) -> Result<(), crate::DomainError> {
        if let Some(end) = self.end_date {
            if self.start_date > end {
                return Err(crate::DomainError::Validation(
                    "end_date: must be on or after start_date".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// `202`-style response listing the enqueued tasks.
#[derive(Debug, Serialize)]
pub struct RecomputeAccepted {
    pub batch_id: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub tasks_enqueued: usize,
    pub task_ids: Vec<Uuid>,
}

/// Event-in: a collaborator created a feeding event.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FeedingEventCreated {
    pub assignment_id: i64,
    pub container_id: i64,
    pub date: NaiveDate,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub amount_kg: f64,
}

/// Event-in: a collaborator created a growth sample.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GrowthSampleCreated {
    pub assignment_id: i64,
    pub batch_id: i64,
    pub date: NaiveDate,
    #[validate(range(min = 0.01, message = "must be positive"))]
    pub avg_weight_g: f64,
}

/// Pin a projection to a batch.
#[derive(Debug, Clone, Deserialize)]
pub struct PinProjectionRequest {
    pub projection_id: i64,
}

/// `202`-style response for event triggers. Empty `task_ids` means the
/// trigger was absorbed (inactive assignment, downstream hiccup).
#[derive(Debug, Serialize)]
pub struct TriggerAccepted {
    pub task_ids: Vec<Uuid>,
}

/// A non-fatal failure inside one iteration of the day loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayError {
    pub date: NaiveDate,
    pub message: String,
}

/// Outcome of one (assignment, window) recompute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecomputeOutcome {
    pub rows_created: u64,
    pub rows_updated: u64,
    pub anchors_found: u64,
    pub errors: Vec<DayError>,
    pub skipped: bool,
}

impl RecomputeOutcome {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Per-assignment entry in a batch outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub assignment_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RecomputeOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated outcome of a batch-level recompute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRecomputeOutcome {
    pub batch_id: i64,
    pub assignments_processed: u64,
    pub total_rows_created: u64,
    pub total_rows_updated: u64,
    pub total_errors: u64,
    pub assignment_results: Vec<AssignmentResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn inverted_window_is_rejected() {
        let req = RecomputeRequest {
            start_date: d("2024-02-01"),
            end_date: Some(d("2024-01-01")),
            assignment_ids: None,
        };
        assert!(req.check_window().is_err());
    }

    #[test]
    fn open_window_is_accepted() {
        let req = RecomputeRequest {
            start_date: d("2024-02-01"),
            end_date: None,
            assignment_ids: None,
        };
        assert!(req.check_window().is_ok());
    }
}
