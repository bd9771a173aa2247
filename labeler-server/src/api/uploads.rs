//! ZIP upload endpoints
//!
//! Both routes take `multipart/form-data` with the archive in a `file` field.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use labeler_common::models::UploadResponse;

use crate::services::{sanitize_file_name, UploadKind};
use crate::{ApiError, ApiResult, AppState};

const FILE_FIELD: &str = "file";

/// POST /api/upload_batch
pub async fn upload_batch(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    store_upload(&state, UploadKind::Batch, multipart?).await
}

/// POST /api/upload_non_labeled
pub async fn upload_non_labeled(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    store_upload(&state, UploadKind::NonLabeled, multipart?).await
}

async fn store_upload(
    state: &AppState,
    kind: UploadKind,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let raw_name = field.file_name().unwrap_or_default().to_string();
        let filename = sanitize_file_name(&raw_name).ok_or_else(|| {
            ApiError::BadRequest(format!("Expected a .zip file, got {:?}", raw_name))
        })?;

        let mut upload = state.uploads.begin(kind, &filename).await?;
        loop {
            let chunk = match field.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    upload.abort().await;
                    return Err(e.into());
                }
            };
            if let Err(e) = upload.write(&chunk).await {
                upload.abort().await;
                return Err(e.into());
            }
        }
        let bytes = upload.finish().await?;

        return Ok(Json(UploadResponse {
            ok: true,
            filename,
            bytes,
        }));
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        FILE_FIELD
    )))
}
