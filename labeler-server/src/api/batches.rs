//! Predefined batch endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use labeler_common::models::{BatchCountResponse, Session};

use crate::{ApiError, ApiResult, AppState};

/// GET /api/batch/:index
///
/// The batch at a zero-based index, shaped like a session.
pub async fn get_batch(
    State(state): State<AppState>,
    Path(index): Path<String>,
) -> ApiResult<Json<Session>> {
    let index: usize = index
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid batch index: {}", index)))?;

    let batch = state.batches.get(index)?;
    Ok(Json(batch.clone()))
}

/// GET /api/batches/count
pub async fn batch_count(State(state): State<AppState>) -> Json<BatchCountResponse> {
    Json(BatchCountResponse {
        total: state.batches.len(),
    })
}
