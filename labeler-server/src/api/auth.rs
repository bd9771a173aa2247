//! Login endpoint and authentication middleware
//!
//! With a password configured, protected routes require
//! `Authorization: Bearer <jwt>` where the token comes from `POST /api/login`.
//! With no password configured every request passes through and the login
//! endpoint answers 404.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Json,
};
use labeler_common::models::{LoginRequest, LoginResponse};
use tracing::warn;

use crate::{ApiError, ApiResult, AppState};

/// POST /api/login
///
/// Exchanges the configured user name and password for an access token.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Some(auth) = state.auth.as_deref() else {
        return Err(ApiError::NotFound(
            "Login is disabled (no password configured)".to_string(),
        ));
    };

    let Json(body) = body?;
    let response = auth.login(&body.username, &body.password)?;
    Ok(Json(response))
}

/// Bearer token check for protected routes
///
/// Valid claims are stored in the request extensions for handlers.
///
/// **Note:** Applied to protected routes only. `/api/health`, `/api/login`,
/// the UI and `/images/*` do NOT use this middleware.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(auth) = state.auth.as_deref() else {
        return Ok(next.run(request).await);
    };

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer)
        .map(str::to_owned)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    match auth.validate(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(e) => {
            warn!("Rejected request to {}: {}", request.uri().path(), e);
            Err(ApiError::Unauthorized("Invalid or expired token".to_string()))
        }
    }
}

/// Extract the token from a `Bearer <token>` header value
fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
