//! Common test utilities for integration tests.
//!
//! The router runs over the in-memory flag store, so no database is needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use domain::services::{FeatureFlagService, InMemoryFlagStore};
use domain::SystemClock;
use fake::faker::lorem::en::Word;
use fake::Fake;
use feature_flags_api::{app::create_app, config::Config};
use std::sync::Arc;

pub const ADMIN_API_KEY: &str = "test-admin-key";

/// Test configuration accepting [`ADMIN_API_KEY`] with rate limiting off.
pub fn test_config() -> Config {
    test_config_with(&[])
}

pub fn test_config_with(overrides: &[(&str, &str)]) -> Config {
    let hash = shared::crypto::sha256_hex(ADMIN_API_KEY);
    let mut all = vec![("security.admin_api_key_hash", hash.as_str())];
    all.extend_from_slice(overrides);

    let config = Config::load_for_test(&all).expect("Failed to load test config");
    config.validate().expect("Test config should be valid");
    config
}

pub fn create_test_app(config: Config) -> Router {
    let service = FeatureFlagService::new(Arc::new(InMemoryFlagStore::new()), Arc::new(SystemClock));
    create_app(config, Arc::new(service))
}

/// A flag name that will not collide with other tests.
pub fn unique_flag_name() -> String {
    let word: String = Word().fake();
    format!("{}-{}", word, &uuid::Uuid::new_v4().simple().to_string()[..8])
}

/// Build a JSON request with the admin API key.
pub fn admin_json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-API-Key", ADMIN_API_KEY)
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a body-less request with the admin API key.
pub fn admin_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-API-Key", ADMIN_API_KEY)
        .body(Body::empty())
        .unwrap()
}

/// Build an unauthenticated JSON request.
pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Helper to parse JSON response body.
pub async fn parse_response_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
}

/// Create a flag via the API and return its JSON representation.
pub async fn create_flag(app: &Router, body: serde_json::Value) -> serde_json::Value {
    use axum::http::StatusCode;
    use tower::ServiceExt;

    let response = app
        .clone()
        .oneshot(admin_json_request(Method::POST, "/api/v1/flags", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    parse_response_body(response).await
}
