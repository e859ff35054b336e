use crate::infra::{AppState, ValuationEngines};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use valuation::engine::{PropertyAttributes, ValuationResult};
use valuation::error::AppError;

pub(crate) fn with_valuation_routes(engines: Arc<ValuationEngines>) -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/hdb/health", axum::routing::get(hdb_health_endpoint))
        .route(
            "/api/v1/private/health",
            axum::routing::get(private_health_endpoint),
        )
        .route(
            "/api/v1/hdb/predict",
            axum::routing::post(hdb_predict_endpoint),
        )
        .route(
            "/api/v1/private/predict",
            axum::routing::post(private_predict_endpoint),
        )
        .layer(Extension(engines))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn hdb_health_endpoint(
    Extension(engines): Extension<Arc<ValuationEngines>>,
) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "models": engines.hdb_health }))
}

pub(crate) async fn private_health_endpoint(
    Extension(engines): Extension<Arc<ValuationEngines>>,
) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "models": engines.private_health }))
}

pub(crate) async fn hdb_predict_endpoint(
    Extension(engines): Extension<Arc<ValuationEngines>>,
    Json(attrs): Json<PropertyAttributes>,
) -> Result<Json<ValuationResult>, AppError> {
    let result = engines.hdb.valuate(&attrs)?;
    Ok(Json(result))
}

pub(crate) async fn private_predict_endpoint(
    Extension(engines): Extension<Arc<ValuationEngines>>,
    Json(attrs): Json<PropertyAttributes>,
) -> Result<Json<ValuationResult>, AppError> {
    let result = engines.private.valuate(&attrs)?;
    Ok(Json(result))
}
