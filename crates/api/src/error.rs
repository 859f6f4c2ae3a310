use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use domain::services::{FlagServiceError, StoreError};
use domain::DomainError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation failed on {} field(s)", .0.len())]
    InvalidFields(Vec<ValidationDetail>),

    #[error("Strategy configuration error: {0}")]
    StrategyConfig(String),

    #[error("Rate limited")]
    RateLimited { limit: u32, retry_after: u64 },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let mut retry_after = None;

        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::InvalidFields(fields) => {
                let message = match fields.as_slice() {
                    [only] => only.message.clone(),
                    _ => format!("{} validation errors", fields.len()),
                };
                details = Some(fields);
                (StatusCode::BAD_REQUEST, "validation_error", message)
            }
            ApiError::StrategyConfig(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "strategy_config_error",
                msg,
            ),
            ApiError::RateLimited {
                limit,
                retry_after: wait,
            } => {
                retry_after = Some(wait);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "rate_limited",
                    format!("Rate limit of {} requests/minute exceeded", limit),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
            retry_after,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(wait) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(wait));
        }
        response
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidArgument(msg) => ApiError::Validation(msg),
            DomainError::StrategyConfig(msg) => ApiError::StrategyConfig(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            StoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::Corrupt(_) | StoreError::Backend(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<FlagServiceError> for ApiError {
    fn from(err: FlagServiceError) -> Self {
        match err {
            FlagServiceError::Domain(e) => e.into(),
            FlagServiceError::Store(e) => e.into(),
            FlagServiceError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::InvalidFields(details)
    }
}

// Extractor rejections use the same JSON error body as handler errors.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::Environment;
    use uuid::Uuid;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_api_error_status_codes() {
        let cases = [
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::StrategyConfig("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (
                ApiError::RateLimited {
                    limit: 10,
                    retry_after: 5,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (ApiError::InvalidFields(Vec::new()), StatusCode::BAD_REQUEST),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::ServiceUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_strategy_config_error_body() {
        let response: Response =
            ApiError::from(DomainError::StrategyConfig("percentage must be a number".into()))
                .into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "strategy_config_error");
        assert_eq!(body["message"], "percentage must be a number");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = ApiError::Internal("connection refused".into()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[test]
    fn test_from_domain_error() {
        assert!(matches!(
            ApiError::from(DomainError::InvalidArgument("bad".into())),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            ApiError::from(DomainError::StrategyConfig("bad".into())),
            ApiError::StrategyConfig(_)
        ));
    }

    #[test]
    fn test_from_store_error() {
        let conflict = StoreError::Conflict {
            name: "dark-mode".into(),
            environment: Environment::Production,
        };
        assert!(matches!(ApiError::from(conflict), ApiError::Conflict(_)));
        assert!(matches!(
            ApiError::from(StoreError::NotFound(Uuid::nil())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(StoreError::Corrupt("bad row".into())),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn test_from_flag_service_error() {
        let err = FlagServiceError::NotFound("Flag 42".into());
        match ApiError::from(err) {
            ApiError::NotFound(msg) => assert_eq!(msg, "Flag 42 not found"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            ApiError::StrategyConfig("test".into()).to_string(),
            "Strategy configuration error: test"
        );
        let limited = ApiError::RateLimited {
            limit: 1,
            retry_after: 60,
        };
        assert_eq!(limited.to_string(), "Rate limited");
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited {
            limit: 100,
            retry_after: 60,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");

        let body = body_json(response).await;
        assert_eq!(body["error"], "rate_limited");
        assert_eq!(body["retryAfter"], 60);
        assert_eq!(body["message"], "Rate limit of 100 requests/minute exceeded");
    }

    #[derive(Debug, validator::Validate)]
    struct Sample {
        #[validate(length(min = 3, message = "Name is too short"))]
        name: String,
        #[validate(range(min = 1, max = 10, message = "Weight must be 1-10"))]
        weight: u32,
    }

    #[tokio::test]
    async fn test_validation_errors_carry_field_details() {
        use validator::Validate;

        let errors = Sample {
            name: "ab".into(),
            weight: 0,
        }
        .validate()
        .unwrap_err();
        let response = ApiError::from(errors).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["message"], "2 validation errors");
        assert_eq!(body["details"][0]["field"], "name");
        assert_eq!(body["details"][0]["message"], "Name is too short");
        assert_eq!(body["details"][1]["field"], "weight");
    }

    #[tokio::test]
    async fn test_single_validation_error_uses_its_message() {
        use validator::Validate;

        let errors = Sample {
            name: "ab".into(),
            weight: 5,
        }
        .validate()
        .unwrap_err();
        let body = body_json(ApiError::from(errors).into_response()).await;
        assert_eq!(body["message"], "Name is too short");
        assert_eq!(body["details"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_plain_errors_have_no_details() {
        let body = body_json(ApiError::NotFound("Flag x not found".into()).into_response()).await;
        assert!(body.get("details").is_none());
        assert!(body.get("retryAfter").is_none());
    }
}
