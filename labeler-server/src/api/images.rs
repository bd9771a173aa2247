//! Image byte serving
//!
//! `GET /images/*path` serves files from the image root. A path is served
//! only if it is relative with plain components, has an allowed image
//! extension, and still resolves inside the root after following symlinks.
//! Everything else is a 404.

use axum::{
    extract::{Path as UrlPath, Request, State},
    response::{IntoResponse, Response},
};
use std::path::{Component, Path, PathBuf};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, warn};

use crate::services::image_index::is_image_path;
use crate::{ApiError, AppState};

/// GET /images/*path
pub async fn serve_image(
    State(state): State<AppState>,
    UrlPath(requested): UrlPath<String>,
    request: Request,
) -> Response {
    let Some(path) = resolve_image_path(state.index.root(), &requested).await else {
        return ApiError::NotFound(format!("Image {}", requested)).into_response();
    };

    debug!("Serving image {}", path.display());
    match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Map a requested id onto a file inside `root`, or `None` if it must not
/// be served
pub async fn resolve_image_path(root: &Path, requested: &str) -> Option<PathBuf> {
    let relative = Path::new(requested);

    let plain = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if requested.is_empty() || !plain || !is_image_path(relative) {
        return None;
    }

    let canonical_root = tokio::fs::canonicalize(root).await.ok()?;
    let canonical = tokio::fs::canonicalize(root.join(relative)).await.ok()?;

    if !canonical.starts_with(&canonical_root) {
        warn!("Rejected image path escaping the root: {}", requested);
        return None;
    }

    let metadata = tokio::fs::metadata(&canonical).await.ok()?;
    metadata.is_file().then_some(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_resolves_nested_image() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("cats")).unwrap();
        fs::write(dir.path().join("cats/a.jpg"), b"jpg").unwrap();

        let resolved = resolve_image_path(dir.path(), "cats/a.jpg").await;
        assert!(resolved.is_some());
    }

    #[tokio::test]
    async fn test_rejects_traversal_and_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"jpg").unwrap();

        assert!(resolve_image_path(dir.path(), "../a.jpg").await.is_none());
        assert!(resolve_image_path(dir.path(), "cats/../a.jpg").await.is_none());
        assert!(resolve_image_path(dir.path(), "../../etc/passwd").await.is_none());
        assert!(resolve_image_path(dir.path(), "/etc/passwd").await.is_none());
        assert!(resolve_image_path(dir.path(), "./a.jpg").await.is_none());
        assert!(resolve_image_path(dir.path(), "").await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_non_image_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"text").unwrap();

        assert!(resolve_image_path(dir.path(), "notes.txt").await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rejects_symlink_out_of_root() {
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.png"), b"png").unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.png"), dir.path().join("link.png"))
            .unwrap();

        assert!(resolve_image_path(dir.path(), "link.png").await.is_none());
    }
}
