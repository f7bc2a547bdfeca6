//! Local database initialization tests

use retiscan_common::db::{init_database, init_memory_database};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("retiscan.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("retiscan.db");

    let first = init_database(&db_path).await.unwrap();
    first.close().await;

    let second = init_database(&db_path).await;
    assert!(second.is_ok(), "Failed to open existing database: {:?}", second.err());
}

#[tokio::test]
async fn test_tables_created() {
    let pool = init_memory_database().await.unwrap();

    let tables: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();
    let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();

    assert!(names.contains(&"predictions"));
    assert!(names.contains(&"users"));
    assert!(names.contains(&"sessions"));
}

#[tokio::test]
async fn test_prediction_class_constrained() {
    let pool = init_memory_database().await.unwrap();

    let result = sqlx::query(
        "INSERT INTO predictions (id, user_id, created_at, prediction_class, confidence_scores, image_url, gradcam_url, ai_explanation)
         VALUES ('p1', 'u1', '2024-06-14T14:30:00Z', 5, '{}', '', '', '')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "class 5 must violate the CHECK constraint");
}
