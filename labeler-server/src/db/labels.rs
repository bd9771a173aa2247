//! Label store gateway
//!
//! Insert-only access to the label collection. Every save creates a new
//! immutable record; nothing here updates or deletes. Lookups go through the
//! (query_image, ts) index.

use chrono::{DateTime, TimeZone, Utc};
use labeler_common::models::{ImageStat, LabelDecision, LabelRecord};
use labeler_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// Gateway to the label collection
#[derive(Debug, Clone)]
pub struct LabelStore {
    pool: SqlitePool,
    collection: String,
}

impl LabelStore {
    /// Wrap a pool whose collection table already exists
    /// (see `labeler_common::db::init_database`)
    pub fn new(pool: SqlitePool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert one decision with a server-assigned id and timestamp
    ///
    /// The timestamp is the current millisecond, bumped past the newest
    /// existing record for the same query image, so `(query_image, ts)`
    /// identifies exactly one record. Computing and inserting happen in one
    /// statement.
    pub async fn save(&self, decision: &LabelDecision) -> Result<LabelRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now().timestamp_millis();

        let positives = encode_ids(decision.positives())?;
        let negatives = encode_ids(decision.negatives())?;

        let sql = format!(
            "INSERT INTO {table} (id, query_image, positives, negatives, ts)
             SELECT ?1, ?2, ?3, ?4, MAX(?5, COALESCE(MAX(ts) + 1, ?5))
             FROM {table} WHERE query_image = ?2
             RETURNING ts",
            table = self.collection
        );
        let ts: i64 = sqlx::query_scalar(&sql)
            .bind(id.to_string())
            .bind(decision.query_image())
            .bind(&positives)
            .bind(&negatives)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        if ts != now {
            debug!("Timestamp for {} bumped by {} ms", decision.query_image(), ts - now);
        }
        debug!(
            "Saved labels for {}: {} positive, {} negative",
            decision.query_image(),
            decision.positives().len(),
            decision.negatives().len()
        );

        Ok(LabelRecord {
            id,
            query_image: decision.query_image().to_string(),
            positives: decision.positives().to_vec(),
            negatives: decision.negatives().to_vec(),
            timestamp: millis_to_datetime(ts)?,
        })
    }

    /// Record saved for `query_image` at exactly `timestamp`
    pub async fn find(
        &self,
        query_image: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<LabelRecord>> {
        let sql = format!(
            "SELECT id, query_image, positives, negatives, ts FROM {}
             WHERE query_image = ? AND ts = ?",
            self.collection
        );
        let row = sqlx::query(&sql)
            .bind(query_image)
            .bind(timestamp.timestamp_millis())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Newest-first history for `query_image`
    pub async fn recent(&self, query_image: &str, limit: u32) -> Result<Vec<LabelRecord>> {
        let sql = format!(
            "SELECT id, query_image, positives, negatives, ts FROM {}
             WHERE query_image = ?
             ORDER BY ts DESC, rowid DESC LIMIT ?",
            self.collection
        );
        let rows = sqlx::query(&sql)
            .bind(query_image)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Record by id
    pub async fn get(&self, id: Uuid) -> Result<Option<LabelRecord>> {
        let sql = format!(
            "SELECT id, query_image, positives, negatives, ts FROM {} WHERE id = ?",
            self.collection
        );
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Positive/negative tallies for `images`
    ///
    /// Only the newest decision per query image counts. Each (query,
    /// candidate) pair counts once for the candidate and once for the query
    /// (a single time when the candidate is the query itself). Images with no
    /// labels report zeros. Filtering and counting run inside SQLite; only
    /// decisions touching a requested image are read.
    pub async fn image_stats(&self, images: &[String]) -> Result<BTreeMap<String, ImageStat>> {
        let mut stats: BTreeMap<String, ImageStat> = images
            .iter()
            .map(|img| (img.clone(), ImageStat::default()))
            .collect();
        if stats.is_empty() {
            return Ok(stats);
        }

        let sql = format!(
            "WITH wanted(img) AS (SELECT value FROM json_each(?1)),
             latest AS (
                 SELECT l.query_image, l.positives, l.negatives FROM {table} AS l
                 WHERE l.ts = (SELECT MAX(m.ts) FROM {table} AS m WHERE m.query_image = l.query_image)
                   AND (l.query_image IN (SELECT img FROM wanted)
                        OR EXISTS (SELECT 1 FROM json_each(l.positives) AS p
                                   WHERE p.value IN (SELECT img FROM wanted))
                        OR EXISTS (SELECT 1 FROM json_each(l.negatives) AS n
                                   WHERE n.value IN (SELECT img FROM wanted)))
             ),
             pairs(query_image, candidate, positive) AS (
                 SELECT latest.query_image, p.value, 1 FROM latest, json_each(latest.positives) AS p
                 UNION ALL
                 SELECT latest.query_image, n.value, 0 FROM latest, json_each(latest.negatives) AS n
             ),
             touched(img, positive) AS (
                 SELECT candidate, positive FROM pairs
                 UNION ALL
                 SELECT query_image, positive FROM pairs WHERE candidate <> query_image
             )
             SELECT img, SUM(positive) AS positive_count, SUM(1 - positive) AS negative_count
             FROM touched
             WHERE img IN (SELECT img FROM wanted)
             GROUP BY img",
            table = self.collection
        );

        let wanted = encode_ids(&stats.keys().cloned().collect::<Vec<_>>())?;
        let rows = sqlx::query(&sql).bind(wanted).fetch_all(&self.pool).await?;

        for row in &rows {
            let img: String = row.try_get("img")?;
            let positive: i64 = row.try_get("positive_count")?;
            let negative: i64 = row.try_get("negative_count")?;
            if let Some(stat) = stats.get_mut(&img) {
                stat.positive_count = u64::try_from(positive).unwrap_or(0);
                stat.negative_count = u64::try_from(negative).unwrap_or(0);
            }
        }

        Ok(stats)
    }
}

/// Stored `ts` (Unix milliseconds) to a UTC timestamp
fn millis_to_datetime(ts: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ts)
        .single()
        .ok_or_else(|| Error::Internal(format!("Invalid timestamp: {}", ts)))
}

fn encode_ids(ids: &[String]) -> Result<String> {
    serde_json::to_string(ids)
        .map_err(|e| Error::Internal(format!("Failed to serialize ids: {}", e)))
}

fn decode_ids(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|e| Error::Internal(format!("Failed to deserialize ids: {}", e)))
}

fn record_from_row(row: &SqliteRow) -> Result<LabelRecord> {
    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Invalid record id {}: {}", id, e)))?;

    let timestamp = millis_to_datetime(row.try_get("ts")?)?;

    Ok(LabelRecord {
        id,
        query_image: row.try_get("query_image")?,
        positives: decode_ids(&row.try_get::<String, _>("positives")?)?,
        negatives: decode_ids(&row.try_get::<String, _>("negatives")?)?,
        timestamp,
    })
}
