//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use labeler_common::db::ping;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "ok", or "degraded" when the label store does not answer
    pub status: String,
    pub module: String,
    pub version: String,
    pub build: String,
    /// Images in the current index snapshot
    pub images: usize,
    /// When the current index snapshot was built
    pub indexed_at: DateTime<Utc>,
    /// Label store reachable
    pub store: bool,
    pub image_root: String,
    pub uptime_seconds: u64,
}

/// GET /api/health
///
/// Does NOT require authentication.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = ping(state.store.pool()).await;
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let snapshot = state.index.list();

    Json(HealthResponse {
        status: if store { "ok" } else { "degraded" }.to_string(),
        module: "labeler-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: env!("GIT_HASH").to_string(),
        images: snapshot.len(),
        indexed_at: snapshot.built_at(),
        store,
        image_root: state.index.root().display().to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/api/health", get(health_check))
}
