//! Database initialization
//!
//! Opens (creating if needed) the SQLite database that holds the label
//! collection and makes sure the collection table and its lookup index exist.
//! Failures here happen at startup and are reported as configuration errors.

use crate::config::is_valid_collection_name;
use crate::{Error, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create the label collection if needed
pub async fn init_database(db_path: &Path, collection: &str) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!(
                    "Cannot create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&db_url)
        .await
        .map_err(|e| {
            Error::Config(format!("Cannot open database {}: {}", db_path.display(), e))
        })?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL mode
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_label_collection(&pool, collection).await?;

    Ok(pool)
}

/// Create the label collection table and its unique (query_image, ts) index
///
/// Idempotent. Positives and negatives are stored as JSON arrays.
pub async fn create_label_collection(pool: &SqlitePool, collection: &str) -> Result<()> {
    if !is_valid_collection_name(collection) {
        return Err(Error::Config(format!(
            "Invalid collection name '{}'",
            collection
        )));
    }

    let create_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {collection} (
            id TEXT PRIMARY KEY,
            query_image TEXT NOT NULL,
            positives TEXT NOT NULL DEFAULT '[]',
            negatives TEXT NOT NULL DEFAULT '[]',
            ts INTEGER NOT NULL
        )
        "#
    );
    sqlx::query(&create_table).execute(pool).await?;

    // (query_image, ts) is the lookup key of a stored decision
    let create_index = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_{collection}_query_ts ON {collection} (query_image, ts)"
    );
    sqlx::query(&create_index).execute(pool).await?;

    info!("Label collection ready: {}", collection);

    Ok(())
}

/// Round-trip a trivial query to check the store is reachable
pub async fn ping(pool: &SqlitePool) -> bool {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await
        .is_ok()
}
