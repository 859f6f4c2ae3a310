//! Feature flag management routes.
//!
//! All routes here sit behind the admin API key.

use axum::{extract::State, http::StatusCode, Json};
use domain::models::{
    strategy_config_text, CreateFeatureFlagRequest, FeatureFlag, ListFeatureFlagsQuery,
    ListFeatureFlagsResponse, SetEnabledRequest, UpdateStrategyRequest,
};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{ApiJson, ApiPath, ApiQuery};

/// Create a flag.
///
/// POST /api/v1/flags
pub async fn create_flag(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateFeatureFlagRequest>,
) -> Result<(StatusCode, Json<FeatureFlag>), ApiError> {
    request.validate()?;

    let config = strategy_config_text(request.strategy_config);
    let flag = state
        .service
        .create(
            &request.name,
            request.environment,
            request.is_enabled,
            request.strategy_type,
            config.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(flag)))
}

/// List flags, optionally for one environment.
///
/// GET /api/v1/flags?environment=production
pub async fn list_flags(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListFeatureFlagsQuery>,
) -> Result<Json<ListFeatureFlagsResponse>, ApiError> {
    let flags = state.service.list(query.environment).await?;
    let total = flags.len();
    Ok(Json(ListFeatureFlagsResponse { flags, total }))
}

/// GET /api/v1/flags/:flag_id
pub async fn get_flag(
    State(state): State<AppState>,
    ApiPath(flag_id): ApiPath<Uuid>,
) -> Result<Json<FeatureFlag>, ApiError> {
    Ok(Json(state.service.get(flag_id).await?))
}

/// Turn a flag on or off.
///
/// PUT /api/v1/flags/:flag_id/enabled
pub async fn set_enabled(
    State(state): State<AppState>,
    ApiPath(flag_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<SetEnabledRequest>,
) -> Result<Json<FeatureFlag>, ApiError> {
    let flag = state
        .service
        .set_enabled(flag_id, request.is_enabled)
        .await?;
    Ok(Json(flag))
}

/// Replace a flag's strategy type and config together.
///
/// PUT /api/v1/flags/:flag_id/strategy
pub async fn update_strategy(
    State(state): State<AppState>,
    ApiPath(flag_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateStrategyRequest>,
) -> Result<Json<FeatureFlag>, ApiError> {
    let config = strategy_config_text(request.strategy_config);
    let flag = state
        .service
        .update_strategy(flag_id, request.strategy_type, config.as_deref())
        .await?;
    Ok(Json(flag))
}

/// DELETE /api/v1/flags/:flag_id
pub async fn delete_flag(
    State(state): State<AppState>,
    ApiPath(flag_id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(flag_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
