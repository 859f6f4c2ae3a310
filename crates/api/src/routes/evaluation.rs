//! Flag evaluation routes.

use axum::{extract::State, Json};
use domain::models::{
    BulkEvaluateRequest, BulkEvaluateResponse, Environment, EvaluateFlagRequest,
    EvaluateFlagResponse, Evaluation, FeatureFlag, FlagState,
};
use domain::services::FlagServiceError;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{ApiJson, ApiPath};
use crate::middleware::metrics::{record_evaluation, record_evaluation_error};

fn evaluation_response(
    result: Result<(FeatureFlag, Evaluation), FlagServiceError>,
) -> Result<Json<EvaluateFlagResponse>, ApiError> {
    match result {
        Ok((flag, evaluation)) => {
            record_evaluation(flag.strategy_type(), &evaluation);
            Ok(Json(EvaluateFlagResponse {
                flag_id: flag.id(),
                name: flag.name().to_string(),
                environment: flag.environment(),
                evaluation,
            }))
        }
        Err(err) => {
            if let FlagServiceError::Domain(domain_err) = &err {
                record_evaluation_error(domain_err);
            }
            Err(err.into())
        }
    }
}

/// Evaluate one flag by id.
///
/// POST /api/v1/flags/:flag_id/evaluate
pub async fn evaluate_flag(
    State(state): State<AppState>,
    ApiPath(flag_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<EvaluateFlagRequest>,
) -> Result<Json<EvaluateFlagResponse>, ApiError> {
    evaluation_response(state.service.evaluate(flag_id, &request.context).await)
}

/// Evaluate one flag by its name within an environment.
///
/// POST /api/v1/environments/:environment/flags/:name/evaluate
pub async fn evaluate_flag_by_name(
    State(state): State<AppState>,
    ApiPath((environment, name)): ApiPath<(Environment, String)>,
    ApiJson(request): ApiJson<EvaluateFlagRequest>,
) -> Result<Json<EvaluateFlagResponse>, ApiError> {
    evaluation_response(
        state
            .service
            .evaluate_by_name(&name, environment, &request.context)
            .await,
    )
}

/// Evaluate every flag of an environment.
///
/// POST /api/v1/evaluate
///
/// A flag that fails to evaluate is reported as disabled with its error; it
/// does not fail the request.
pub async fn evaluate_all(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<BulkEvaluateRequest>,
) -> Result<Json<BulkEvaluateResponse>, ApiError> {
    let outcomes = state
        .service
        .evaluate_all(request.environment, &request.context)
        .await?;

    let flags = outcomes
        .into_iter()
        .map(|(flag, outcome)| {
            let flag_state = match outcome {
                Ok(evaluation) => {
                    record_evaluation(flag.strategy_type(), &evaluation);
                    FlagState::from(evaluation)
                }
                Err(e) => {
                    record_evaluation_error(&e);
                    tracing::warn!(flag_id = %flag.id(), error = %e, "Flag evaluation failed");
                    FlagState::failed(e.to_string())
                }
            };
            (flag.name().to_string(), flag_state)
        })
        .collect();

    Ok(Json(BulkEvaluateResponse {
        environment: request.environment,
        flags,
    }))
}
