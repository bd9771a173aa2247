//! Session and index endpoints

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use labeler_common::config::MAX_PAGE_SIZE;
use labeler_common::models::Session;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::services::build_session;
use crate::{ApiError, ApiResult, AppState};

/// Query parameters for `GET /api/session`
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    /// Overrides the configured page size (1..=200)
    pub limit: Option<usize>,
}

/// GET /api/session[?limit=N]
///
/// Random query image plus a page of candidates.
pub async fn get_session(
    State(state): State<AppState>,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> ApiResult<Json<Session>> {
    let Query(query) = query?;

    let page_size = match query.limit {
        Some(limit) if (1..=MAX_PAGE_SIZE).contains(&limit) => limit,
        Some(limit) => {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, limit
            )))
        }
        None => state.page_size,
    };

    let session = build_session(&state.index, page_size)?;
    Ok(Json(session))
}

/// Response of `POST /api/refresh`
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub ok: bool,
    pub count: usize,
}

/// POST /api/refresh
///
/// Rescans the image root and swaps in the new index snapshot.
pub async fn refresh_index(State(state): State<AppState>) -> ApiResult<Json<RefreshResponse>> {
    let index = state.index.clone();
    let count = tokio::task::spawn_blocking(move || index.rebuild())
        .await
        .map_err(|e| ApiError::Internal(format!("Index rebuild task failed: {}", e)))??;

    info!("Manual refresh: {} images", count);
    Ok(Json(RefreshResponse { ok: true, count }))
}
