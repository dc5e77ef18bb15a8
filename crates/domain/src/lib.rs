//! Domain types for the AquaTrack growth assimilation core.

pub mod anchors;
pub mod context;
pub mod errors;
pub mod models;
pub mod recompute;
pub mod state;

use serde::Serialize;

pub use anchors::*;
pub use context::*;
pub use errors::*;
pub use models::*;
pub use recompute::*;
pub use state::*;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub build_sha: String,
    pub uptime_seconds: u64,
}

/// Ready check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub database: String,
}
