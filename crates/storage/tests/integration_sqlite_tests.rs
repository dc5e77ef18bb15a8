#[path = "support/sqlite.rs"]
mod test_support_sqlite;

use sqlx::Row;

use test_support_sqlite::{seed_common_fixtures, setup_test_db};

#[tokio::test]
async fn happy_path_crud_for_assignment_and_daily_state() -> Result<(), Box<dyn std::error::Error>>
{
    let db = setup_test_db().await?;
    seed_common_fixtures(&db.pool).await?;

    sqlx::query(
        "INSERT INTO daily_states (assignment_id, date, day_number, avg_weight_g, population, biomass_kg, lifecycle_stage, sources, confidence_scores)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(1_i64)
    .bind("2024-01-01")
    .bind(1_i64)
    .bind(50.0_f64)
    .bind(10_000_i64)
    .bind(500.0_f64)
    .bind("Parr")
    .bind(r#"{"weight":"unchanged","temp":"profile"}"#)
    .bind(r#"{"weight":0.3,"temp":0.5}"#)
    .execute(&db.pool)
    .await?;

    let row = sqlx::query(
        "SELECT day_number, avg_weight_g, population FROM daily_states WHERE assignment_id = ?1 AND date = ?2",
    )
    .bind(1_i64)
    .bind("2024-01-01")
    .fetch_one(&db.pool)
    .await?;

    assert_eq!(row.try_get::<i64, _>("day_number")?, 1);
    assert_eq!(row.try_get::<f64, _>("avg_weight_g")?, 50.0);
    assert_eq!(row.try_get::<i64, _>("population")?, 10_000);

    sqlx::query("UPDATE assignments SET last_weighing_date = ?1 WHERE id = 1")
        .bind("2024-01-05")
        .execute(&db.pool)
        .await?;

    let count = sqlx::query("SELECT COUNT(*) AS c FROM assignments WHERE last_weighing_date IS NOT NULL")
        .fetch_one(&db.pool)
        .await?
        .try_get::<i64, _>("c")?;
    assert_eq!(count, 1);

    Ok(())
}

#[tokio::test]
async fn constraints_enforce_unique_day_and_valid_anchor() -> Result<(), Box<dyn std::error::Error>>
{
    let db = setup_test_db().await?;
    seed_common_fixtures(&db.pool).await?;

    let insert = "INSERT INTO daily_states (assignment_id, date, day_number, avg_weight_g, population, biomass_kg, lifecycle_stage)
                  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

    sqlx::query(insert)
        .bind(1_i64)
        .bind("2024-01-01")
        .bind(1_i64)
        .bind(50.0_f64)
        .bind(10_000_i64)
        .bind(500.0_f64)
        .bind("Parr")
        .execute(&db.pool)
        .await?;

    // Duplicate (assignment, date) is rejected.
    let duplicate = sqlx::query(insert)
        .bind(1_i64)
        .bind("2024-01-01")
        .bind(1_i64)
        .bind(51.0_f64)
        .bind(10_000_i64)
        .bind(510.0_f64)
        .bind("Parr")
        .execute(&db.pool)
        .await;
    assert!(duplicate.is_err(), "unique (assignment_id, date) not enforced");

    // Unknown anchor types are rejected.
    let bad_anchor = sqlx::query(
        "INSERT INTO daily_states (assignment_id, date, day_number, avg_weight_g, population, biomass_kg, lifecycle_stage, anchor_type)
         VALUES (1, '2024-01-02', 2, 50.0, 10000, 500.0, 'Parr', 'weighbridge')",
    )
    .execute(&db.pool)
    .await;
    assert!(bad_anchor.is_err(), "anchor_type check not enforced");

    // Zero weight violates the positivity check.
    let bad_weight = sqlx::query(insert)
        .bind(1_i64)
        .bind("2024-01-03")
        .bind(3_i64)
        .bind(0.0_f64)
        .bind(10_000_i64)
        .bind(0.0_f64)
        .bind("Parr")
        .execute(&db.pool)
        .await;
    assert!(bad_weight.is_err(), "avg_weight_g positivity not enforced");

    Ok(())
}

#[tokio::test]
async fn transfer_status_and_selection_method_checks() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup_test_db().await?;
    seed_common_fixtures(&db.pool).await?;

    sqlx::query(
        "INSERT INTO transfer_actions (source_assignment_id, actual_execution_date, status, selection_method, measured_avg_weight_g, transferred_count)
         VALUES (1, '2024-02-01', 'COMPLETED', 'LARGEST', 100.0, 500)",
    )
    .execute(&db.pool)
    .await?;

    let bad_status = sqlx::query(
        "INSERT INTO transfer_actions (source_assignment_id, actual_execution_date, status, transferred_count)
         VALUES (1, '2024-02-01', 'DONE', 500)",
    )
    .execute(&db.pool)
    .await;
    assert!(bad_status.is_err(), "status check not enforced");

    let bad_method = sqlx::query(
        "INSERT INTO transfer_actions (source_assignment_id, actual_execution_date, status, selection_method, transferred_count)
         VALUES (1, '2024-02-01', 'COMPLETED', 'BIGGEST', 500)",
    )
    .execute(&db.pool)
    .await;
    assert!(bad_method.is_err(), "selection_method check not enforced");

    Ok(())
}
