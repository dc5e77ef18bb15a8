//! AquaTrack assimilation server library.

pub mod handlers;
pub mod middleware;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use aquatrack_config::AppConfig;
use aquatrack_domain::{HealthResponse, ReadyResponse};
use aquatrack_engine::{Recomputer, Scheduler};
use aquatrack_storage::{DailyStateRepository, MasterDataRepository, check_connection};
use sqlx::PgPool;

use handlers::events::{feeding_event_created, growth_sample_created};
use handlers::recompute::{pin_projection, recompute_batch};
use handlers::states::list_daily_states;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub master: MasterDataRepository,
    pub states: DailyStateRepository,
    pub recomputer: Arc<Recomputer>,
    pub scheduler: Arc<Scheduler>,
    pub config: AppConfig,
    pub start_time: Instant,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/ready", get(ready))
        .route("/v1/batches/{id}/recompute", post(recompute_batch))
        .route("/v1/batches/{id}/pin-projection", post(pin_projection))
        .route("/v1/assignments/{id}/daily-states", get(list_daily_states))
        .route("/v1/events/feeding-created", post(feeding_event_created))
        .route("/v1/events/growth-sample-created", post(growth_sample_created))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build_sha: option_env!("BUILD_SHA").unwrap_or("dev").to_string(),
        uptime_seconds: uptime,
    })
}

/// Readiness check endpoint.
async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    let db_status = match check_connection(&state.pool).await {
        Ok(()) => "connected",
        Err(_) => "disconnected",
    };

    Json(ReadyResponse {
        status: if db_status == "connected" {
            "ok"
        } else {
            "degraded"
        }
        .to_string(),
        database: db_status.to_string(),
    })
}
