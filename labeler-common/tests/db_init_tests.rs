//! Tests for database initialization
//!
//! - Database file is created on first run
//! - Reopening an existing database succeeds
//! - The label collection and its (query_image, ts) index exist

use labeler_common::db::init::{init_database, ping};
use labeler_common::Error;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("labels.db");

    let pool = init_database(&db_path, "labels").await;

    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("labels.db");

    let pool1 = init_database(&db_path, "labels").await;
    assert!(pool1.is_ok());
    drop(pool1);

    let pool2 = init_database(&db_path, "labels").await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_collection_and_index_created() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("labels.db"), "decisions")
        .await
        .unwrap();

    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'decisions'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(tables, 1);

    let index: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_decisions_query_ts'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(index, 1);

    assert!(ping(&pool).await);
}

#[tokio::test]
async fn test_query_ts_key_is_unique() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("labels.db"), "labels")
        .await
        .unwrap();

    let insert = "INSERT INTO labels (id, query_image, positives, negatives, ts) VALUES (?, 'a.jpg', '[]', '[]', 1000)";
    sqlx::query(insert).bind("first").execute(&pool).await.unwrap();

    let err = sqlx::query(insert).bind("second").execute(&pool).await.unwrap_err();
    let err = Error::from(err);
    assert!(matches!(err, Error::Database(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_invalid_collection_name_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = init_database(&dir.path().join("labels.db"), "bad name")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_ping_fails_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("labels.db"), "labels")
        .await
        .unwrap();

    pool.close().await;
    assert!(!ping(&pool).await);
}
