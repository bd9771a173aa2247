//! labeler-server library
//!
//! HTTP service for pairwise image labeling: serves a random query image with
//! a page of candidates, stores positive/negative decisions, and serves the
//! image bytes and the browser UI. Predefined batches, ZIP uploads and a
//! login endpoint issuing JWTs sit alongside.

use axum::http::HeaderValue;
use axum::Router;
use chrono::{DateTime, Utc};
use labeler_common::config::{CorsPolicy, DEFAULT_UPLOAD_ROOT};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use crate::db::LabelStore;
use crate::services::{Authenticator, BatchSet, ImageIndex, UploadStore, MAX_UPLOAD_BYTES};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Image index (snapshot swapped on refresh)
    pub index: Arc<ImageIndex>,
    /// Label store gateway
    pub store: LabelStore,
    /// Candidates per session unless the request overrides it
    pub page_size: usize,
    /// Login and token validation; `None` disables authentication
    pub auth: Option<Arc<Authenticator>>,
    /// Predefined batches
    pub batches: Arc<BatchSet>,
    /// Destination of ZIP uploads
    pub uploads: UploadStore,
    /// Cross-origin policy applied to every route
    pub cors: CorsPolicy,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create new application state with auth disabled and any origin allowed
    pub fn new(index: Arc<ImageIndex>, store: LabelStore, page_size: usize) -> Self {
        Self {
            index,
            store,
            page_size,
            auth: None,
            batches: Arc::new(BatchSet::empty()),
            uploads: UploadStore::new(DEFAULT_UPLOAD_ROOT),
            cors: CorsPolicy::AllowAny,
            startup_time: Utc::now(),
        }
    }

    pub fn with_auth(mut self, auth: Option<Authenticator>) -> Self {
        self.auth = auth.map(Arc::new);
        self
    }

    pub fn with_batches(mut self, batches: BatchSet) -> Self {
        self.batches = Arc::new(batches);
        self
    }

    pub fn with_uploads(mut self, uploads: UploadStore) -> Self {
        self.uploads = uploads;
        self
    }

    pub fn with_cors(mut self, cors: CorsPolicy) -> Self {
        self.cors = cors;
        self
    }
}

/// Build application router
///
/// `/api/health`, `/api/login`, the UI and `/images/*` are public; every
/// other `/api/*` route goes through the bearer token check.
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::middleware;
    use axum::routing::{get, post};

    let cors = cors_layer(&state.cors);

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/session", get(api::get_session))
        .route("/api/labels/save", post(api::save_labels))
        .route("/api/labels", get(api::list_labels))
        .route("/api/labels/:id", get(api::get_label))
        .route("/api/image_stats/bulk", post(api::image_stats_bulk))
        .route("/api/refresh", post(api::refresh_index))
        .route("/api/batch/:index", get(api::get_batch))
        .route("/api/batches/count", get(api::batch_count))
        .route(
            "/api/upload_batch",
            post(api::upload_batch).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/upload_non_labeled",
            post(api::upload_non_labeled).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/", get(api::serve_index))
        .route("/static/app.js", get(api::serve_app_js))
        .route("/images/*path", get(api::serve_image))
        .route("/api/login", post(api::login))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(policy: &CorsPolicy) -> CorsLayer {
    match policy {
        CorsPolicy::AllowAny => CorsLayer::permissive(),
        CorsPolicy::AllowList(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin: {}", origin);
                        None
                    }
                })
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}
