use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use leadgen::error::AppError;
use leadgen::pipeline::PipelineStage;
use leadgen::tracking::{tracking_router, TrackingService};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

pub(crate) const API_KEY_HEADER: &str = "x-api-key";

pub(crate) fn with_service_routes(tracking: Arc<TrackingService>) -> Router {
    tracking_router(tracking)
        .route("/api/v1/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/pipeline/:stage", post(trigger_stage_endpoint))
}

pub(crate) async fn healthcheck(Extension(state): Extension<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.environment.label(),
    }))
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

/// Runs one stage now and returns its counts.
pub(crate) async fn trigger_stage_endpoint(
    Extension(state): Extension<AppState>,
    Path(stage): Path<String>,
    headers: HeaderMap,
) -> Response {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if presented != Some(state.api_key.as_ref()) {
        warn!(%stage, "pipeline trigger rejected: bad api key");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Could not validate API KEY" })),
        )
            .into_response();
    }

    let stage = match stage.parse::<PipelineStage>() {
        Ok(stage) => stage,
        Err(err) => return AppError::from(err).into_response(),
    };

    match state.runner.run_stage(stage).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(json!({ "stage": stage.label(), "summary": summary })),
        )
            .into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
