#![cfg(feature = "postgres-tests")]

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use aquatrack_api::{AppState, build_router};
use aquatrack_config::AppConfig;
use aquatrack_engine::{AssimilationSettings, Recomputer, Scheduler};
use aquatrack_storage::{DailyStateRepository, MasterDataRepository, ObservationRepository};

const ADMIN_KEY: &str = "test-admin-key";

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".to_string(),
        bind_address: "127.0.0.1:0".to_string(),
        admin_api_key: ADMIN_KEY.to_string(),
        freshwater_temp_c: 12.0,
        recompute_window_days: 30,
        bias_largest: 0.88,
        bias_smallest: 1.12,
        fcr_gain_floor_kg: 1.0,
        max_concurrent_recomputes: 2,
        job_deadline_secs: 30,
    }
}

fn test_state(pool: PgPool) -> Arc<AppState> {
    let config = test_config();
    let master = MasterDataRepository::new(pool.clone());
    let states = DailyStateRepository::new(pool.clone());
    let recomputer = Arc::new(Recomputer::new(
        master.clone(),
        ObservationRepository::new(pool.clone()),
        states.clone(),
        AssimilationSettings::from_config(&config),
    ));
    let scheduler = Arc::new(Scheduler::new(
        recomputer.clone(),
        config.max_concurrent_recomputes,
        Duration::from_secs(config.job_deadline_secs),
        CancellationToken::new(),
    ));

    Arc::new(AppState {
        pool,
        master,
        states,
        recomputer,
        scheduler,
        config,
        start_time: Instant::now(),
    })
}

struct Seed {
    batch_id: i64,
    assignment_id: i64,
}

async fn seed(pool: &PgPool) -> Result<Seed, sqlx::Error> {
    let (container_id,): (i64,) =
        sqlx::query_as("INSERT INTO containers (name, freshwater) VALUES ('Tank 1', TRUE) RETURNING id")
            .fetch_one(pool)
            .await?;
    let (tgc_id,): (i64,) = sqlx::query_as(
        "INSERT INTO tgc_models (name, tgc_value) VALUES ('TGC', 2.75) RETURNING id",
    )
    .fetch_one(pool)
    .await?;
    for day in 1..=60 {
        sqlx::query("INSERT INTO tgc_profile_entries (tgc_model_id, day_number, temperature_c) VALUES ($1, $2, 12.0)")
            .bind(tgc_id)
            .bind(day)
            .execute(pool)
            .await?;
    }
    let (mortality_id,): (i64,) = sqlx::query_as(
        "INSERT INTO mortality_models (name, rate_percent, frequency) VALUES ('zero', 0.0, 'daily') RETURNING id",
    )
    .fetch_one(pool)
    .await?;
    let (projection_id,): (i64,) = sqlx::query_as(
        "INSERT INTO projections (name, tgc_model_id, mortality_model_id) VALUES ('baseline', $1, $2) RETURNING id",
    )
    .bind(tgc_id)
    .bind(mortality_id)
    .fetch_one(pool)
    .await?;
    let (batch_id,): (i64,) = sqlx::query_as(
        "INSERT INTO batches (batch_number, species, start_date, lifecycle_stage, pinned_projection_id)
         VALUES ('B-001', 'Atlantic Salmon', '2024-01-01', 'Parr', $1) RETURNING id",
    )
    .bind(projection_id)
    .fetch_one(pool)
    .await?;
    sqlx::query(
        "INSERT INTO lifecycle_stages (species, name, stage_order) VALUES ('Atlantic Salmon', 'Parr', 3), ('Atlantic Salmon', 'Smolt', 4)",
    )
    .execute(pool)
    .await?;
    let (assignment_id,): (i64,) = sqlx::query_as(
        "INSERT INTO assignments (batch_id, container_id, lifecycle_stage, assignment_date, population_count, avg_weight_g)
         VALUES ($1, $2, 'Parr', '2024-01-01', 10000, 50.0) RETURNING id",
    )
    .bind(batch_id)
    .bind(container_id)
    .fetch_one(pool)
    .await?;

    Ok(Seed {
        batch_id,
        assignment_id,
    })
}

fn post_json(uri: &str, admin_key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = admin_key {
        builder = builder.header("x-admin-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
async fn admin_recompute_auth_and_validation(pool: PgPool) -> Result<(), sqlx::Error> {
    let seed = seed(&pool).await?;
    let state = test_state(pool.clone());
    let app = build_router(state);

    let uri = format!("/v1/batches/{}/recompute", seed.batch_id);
    let window = json!({ "start_date": "2024-01-01", "end_date": "2024-01-10" });

    // Missing key.
    let response = app
        .clone()
        .oneshot(post_json(&uri, None, window.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong key.
    let response = app
        .clone()
        .oneshot(post_json(&uri, Some("wrong"), window.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Inverted window.
    let response = app
        .clone()
        .oneshot(post_json(
            &uri,
            Some(ADMIN_KEY),
            json!({ "start_date": "2024-02-01", "end_date": "2024-01-01" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown batch.
    let response = app
        .clone()
        .oneshot(post_json("/v1/batches/999999/recompute", Some(ADMIN_KEY), window.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn admin_recompute_produces_daily_states(pool: PgPool) -> Result<(), sqlx::Error> {
    let seed = seed(&pool).await?;
    let state = test_state(pool.clone());
    let app = build_router(state.clone());

    let uri = format!("/v1/batches/{}/recompute", seed.batch_id);
    let response = app
        .clone()
        .oneshot(post_json(
            &uri,
            Some(ADMIN_KEY),
            json!({ "start_date": "2024-01-01", "end_date": "2024-01-10" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted = body_json(response).await;
    assert_eq!(accepted["tasks_enqueued"], 1);
    assert_eq!(accepted["task_ids"].as_array().unwrap().len(), 1);

    // The job runs in the background; wait for the window to land.
    let deadline = Instant::now() + Duration::from_secs(10);
    let rows = loop {
        let rows = state
            .states
            .list_range(
                seed.assignment_id,
                "2024-01-01".parse().unwrap(),
                "2024-01-10".parse().unwrap(),
            )
            .await
            .map_err(|e| sqlx::Error::Protocol(format!("list failed: {e}")))?;
        if rows.len() == 10 {
            break rows;
        }
        assert!(Instant::now() < deadline, "recompute did not finish in time");
        tokio::time::sleep(Duration::from_millis(100)).await;
    };

    assert_eq!(rows[0].avg_weight_g, 50.0);
    assert_eq!(rows[0].day_number, 1);
    assert!(rows[9].avg_weight_g > rows[0].avg_weight_g);

    // Read the rows back over the API.
    let request = Request::builder()
        .uri(format!(
            "/v1/assignments/{}/daily-states?start_date=2024-01-01&end_date=2024-01-10",
            seed.assignment_id
        ))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 10);
    assert_eq!(listed[0]["sources"]["temp"], "profile");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn growth_sample_trigger_updates_weighing_date(pool: PgPool) -> Result<(), sqlx::Error> {
    let seed = seed(&pool).await?;
    let state = test_state(pool.clone());
    let app = build_router(state.clone());

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/events/growth-sample-created",
            None,
            json!({
                "assignment_id": seed.assignment_id,
                "batch_id": seed.batch_id,
                "date": "2024-01-08",
                "avg_weight_g": 62.5
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted = body_json(response).await;
    assert_eq!(accepted["task_ids"].as_array().unwrap().len(), 1);

    let assignment = state
        .master
        .find_assignment(seed.assignment_id)
        .await
        .map_err(|e| sqlx::Error::Protocol(format!("find failed: {e}")))?
        .expect("assignment exists");
    assert_eq!(
        assignment.last_weighing_date,
        Some("2024-01-08".parse().unwrap())
    );

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn feeding_trigger_swallows_unknown_assignments(pool: PgPool) -> Result<(), sqlx::Error> {
    seed(&pool).await?;
    let state = test_state(pool.clone());
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/events/feeding-created",
            None,
            json!({
                "assignment_id": 999999,
                "container_id": 1,
                "date": "2024-01-08",
                "amount_kg": 120.0
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted = body_json(response).await;
    assert!(accepted["task_ids"].as_array().unwrap().is_empty());

    // A malformed payload is still a client error.
    let response = app
        .oneshot(post_json(
            "/v1/events/feeding-created",
            None,
            json!({
                "assignment_id": 1,
                "container_id": 1,
                "date": "2024-01-08",
                "amount_kg": -5.0
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn pin_projection_validates_references(pool: PgPool) -> Result<(), sqlx::Error> {
    let seed = seed(&pool).await?;
    let state = test_state(pool.clone());
    let app = build_router(state);

    let uri = format!("/v1/batches/{}/pin-projection", seed.batch_id);
    let response = app
        .clone()
        .oneshot(post_json(&uri, Some(ADMIN_KEY), json!({ "projection_id": 424242 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(post_json(&uri, Some(ADMIN_KEY), json!({ "projection_id": 1 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}
