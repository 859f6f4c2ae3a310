//! Admin authentication middleware.
//!
//! Admin routes require an `X-API-Key` header whose SHA-256 digest matches
//! `security.admin_api_key_hash`. Only the digest is kept in configuration.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::error::ApiError;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

const INVALID_KEY_MESSAGE: &str = "Invalid or missing API key";

/// Compares two digests without short-circuiting on the first mismatch.
pub(crate) fn digests_match(presented: &str, expected: &str) -> bool {
    presented.len() == expected.len()
        && presented
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// The non-empty `X-API-Key` value, if any.
pub(crate) fn presented_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|key| !key.is_empty())
}

/// Checks `headers` against the configured admin digest.
fn authorize_admin(headers: &HeaderMap, admin_api_key_hash: &str) -> Result<(), ApiError> {
    let api_key = presented_api_key(headers)
        .ok_or_else(|| ApiError::Unauthorized(INVALID_KEY_MESSAGE.to_string()))?;

    let expected = admin_api_key_hash.to_ascii_lowercase();
    if expected.is_empty() {
        tracing::error!("Admin API key hash is not configured");
        return Err(ApiError::Forbidden(
            "Admin access is not configured".to_string(),
        ));
    }

    if !digests_match(&shared::crypto::sha256_hex(api_key), &expected) {
        return Err(ApiError::Unauthorized(INVALID_KEY_MESSAGE.to_string()));
    }

    Ok(())
}

/// Middleware for admin-only routes.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(e) = authorize_admin(req.headers(), &state.config.security.admin_api_key_hash) {
        tracing::warn!(path = %req.uri().path(), error = %e, "Rejected admin request");
        return Err(e);
    }

    Ok(next.run(req).await)
}
