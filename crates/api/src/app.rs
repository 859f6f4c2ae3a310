use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use domain::services::FeatureFlagService;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    init_metrics, metrics_handler, metrics_middleware, rate_limit_middleware, require_admin,
    security_headers_middleware, trace_id, RateLimiterState,
};
use crate::routes::{evaluation, flags, health};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FeatureFlagService>,
    pub config: Arc<Config>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    pub fn new(config: Config, service: Arc<FeatureFlagService>) -> Self {
        // A limit of 0 disables rate limiting.
        let rate_limiter =
            RateLimiterState::new(config.security.rate_limit_per_minute).map(Arc::new);

        Self {
            service,
            config: Arc::new(config),
            rate_limiter,
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins = &config.security.cors_origins;
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_app(config: Config, service: Arc<FeatureFlagService>) -> Router {
    router(AppState::new(config, service))
}

pub fn router(state: AppState) -> Router {
    init_metrics();

    let config = state.config.clone();

    // Flag management (admin API key)
    let admin_routes = Router::new()
        .route("/api/v1/flags", post(flags::create_flag).get(flags::list_flags))
        .route(
            "/api/v1/flags/:flag_id",
            get(flags::get_flag).delete(flags::delete_flag),
        )
        .route("/api/v1/flags/:flag_id/enabled", put(flags::set_enabled))
        .route("/api/v1/flags/:flag_id/strategy", put(flags::update_strategy))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    // Evaluation (rate limited per client)
    let evaluation_routes = Router::new()
        .route(
            "/api/v1/flags/:flag_id/evaluate",
            post(evaluation::evaluate_flag),
        )
        .route(
            "/api/v1/environments/:environment/flags/:name/evaluate",
            post(evaluation::evaluate_flag_by_name),
        )
        .route("/api/v1/evaluate", post(evaluation::evaluate_all))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    // Global middleware (order matters: bottom layers run first)
    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(evaluation_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config))
        .with_state(state)
}
