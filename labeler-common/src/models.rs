//! Shared API request/response types and the label data model
//!
//! JSON field names are camelCase on the wire (`queryImage`, `positiveCount`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::{Error, Result};

/// URL prefix under which image bytes are served
pub const IMAGE_URL_PREFIX: &str = "/images/";

/// Normalize an image identifier received from a client
///
/// Accepts either a bare relative path (`cats/a.jpg`) or the served URL form
/// (`/images/cats/a.jpg`) and returns the relative path.
pub fn normalize_image_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix(IMAGE_URL_PREFIX).unwrap_or(trimmed);
    stripped.trim_start_matches('/').to_string()
}

// ========================================
// Session
// ========================================

/// One labeling session: a query image and a page of candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub query_image: String,
    pub candidates: Vec<String>,
}

// ========================================
// Label decisions
// ========================================

/// Body of `POST /api/labels/save`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveLabelsRequest {
    #[serde(default)]
    pub query_image: Option<String>,
    #[serde(default)]
    pub positives: Vec<String>,
    #[serde(default)]
    pub negatives: Vec<String>,
}

/// A validated labeling decision, not yet stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDecision {
    query_image: String,
    positives: Vec<String>,
    negatives: Vec<String>,
}

impl LabelDecision {
    /// Validate and normalize a raw decision
    ///
    /// The query id must be non-empty and no id may be both positive and
    /// negative. Each list is deduplicated keeping first-occurrence order.
    pub fn new(query_image: &str, positives: &[String], negatives: &[String]) -> Result<Self> {
        let query_image = normalize_image_id(query_image);
        if query_image.is_empty() {
            return Err(Error::Validation("queryImage is required".to_string()));
        }

        let positives = dedup_ids(positives);
        let negatives = dedup_ids(negatives);

        let positive_set: HashSet<&str> = positives.iter().map(String::as_str).collect();
        let mut overlap: Vec<&str> = negatives
            .iter()
            .map(String::as_str)
            .filter(|id| positive_set.contains(id))
            .collect();

        if !overlap.is_empty() {
            overlap.sort_unstable();
            return Err(Error::Validation(format!(
                "images marked both positive and negative: {}",
                overlap.join(", ")
            )));
        }

        Ok(Self {
            query_image,
            positives,
            negatives,
        })
    }

    pub fn query_image(&self) -> &str {
        &self.query_image
    }

    pub fn positives(&self) -> &[String] {
        &self.positives
    }

    pub fn negatives(&self) -> &[String] {
        &self.negatives
    }
}

impl TryFrom<SaveLabelsRequest> for LabelDecision {
    type Error = Error;

    fn try_from(req: SaveLabelsRequest) -> Result<Self> {
        let query_image = req.query_image.unwrap_or_default();
        LabelDecision::new(&query_image, &req.positives, &req.negatives)
    }
}

fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| normalize_image_id(id))
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// A stored, immutable label decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelRecord {
    pub id: Uuid,
    pub query_image: String,
    pub positives: Vec<String>,
    pub negatives: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Response of `POST /api/labels/save`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveLabelsResponse {
    pub id: Uuid,
    pub query_image: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&LabelRecord> for SaveLabelsResponse {
    fn from(record: &LabelRecord) -> Self {
        Self {
            id: record.id,
            query_image: record.query_image.clone(),
            timestamp: record.timestamp,
        }
    }
}

// ========================================
// Image statistics
// ========================================

/// Positive/negative tallies for one image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStat {
    pub positive_count: u64,
    pub negative_count: u64,
}

/// Body of `POST /api/image_stats/bulk`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageStatsRequest {
    #[serde(default)]
    pub images: Vec<String>,
}

/// Response of `POST /api/image_stats/bulk`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageStatsResponse {
    pub stats: BTreeMap<String, ImageStat>,
}

// ========================================
// Login, batches, uploads
// ========================================

/// Body of `POST /api/login`
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Response of `POST /api/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    /// Always `"bearer"`
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
}

/// Response of `GET /api/batches/count`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchCountResponse {
    pub total: usize,
}

/// Response of the ZIP upload endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub ok: bool,
    /// Sanitized name the archive was stored under
    pub filename: String,
    pub bytes: u64,
}
