//! Label endpoints
//!
//! Saving decisions, reading back history, and per-image tallies.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use labeler_common::models::{
    normalize_image_id, ImageStatsRequest, ImageStatsResponse, LabelDecision, LabelRecord,
    SaveLabelsRequest, SaveLabelsResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{ApiError, ApiResult, AppState};

const DEFAULT_HISTORY_LIMIT: u32 = 20;
const MAX_HISTORY_LIMIT: u32 = 200;

/// POST /api/labels/save
///
/// Validates the decision and stores it as a new record.
pub async fn save_labels(
    State(state): State<AppState>,
    body: Result<Json<SaveLabelsRequest>, JsonRejection>,
) -> ApiResult<Json<SaveLabelsResponse>> {
    let Json(body) = body?;
    let decision = LabelDecision::try_from(body)?;

    let record = state.store.save(&decision).await?;

    info!(
        "Labels saved for {} ({} positive, {} negative)",
        record.query_image,
        record.positives.len(),
        record.negatives.len()
    );

    Ok(Json(SaveLabelsResponse::from(&record)))
}

/// Query parameters for `GET /api/labels`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub query_image: String,
    pub limit: Option<u32>,
}

/// GET /api/labels?queryImage=ID[&limit=N]
///
/// Newest-first decisions stored for one query image.
pub async fn list_labels(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<LabelRecord>>> {
    let Query(query) = query?;

    let query_image = normalize_image_id(&query.query_image);
    if query_image.is_empty() {
        return Err(ApiError::BadRequest("queryImage is required".to_string()));
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let records = state.store.recent(&query_image, limit).await?;
    Ok(Json(records))
}

/// GET /api/labels/:id
pub async fn get_label(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<LabelRecord>> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid record id: {}", id)))?;

    state
        .store
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Label record {}", id)))
}

/// POST /api/image_stats/bulk
///
/// Positive/negative tallies for the requested images.
pub async fn image_stats_bulk(
    State(state): State<AppState>,
    body: Result<Json<ImageStatsRequest>, JsonRejection>,
) -> ApiResult<Json<ImageStatsResponse>> {
    let Json(body) = body?;

    let mut images: Vec<String> = body
        .images
        .iter()
        .map(|img| normalize_image_id(img))
        .filter(|img| !img.is_empty())
        .collect();
    images.sort();
    images.dedup();

    let stats = state.store.image_stats(&images).await?;
    Ok(Json(ImageStatsResponse { stats }))
}
