use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use super::service::{BrevoWebhook, ClientInfo, TrackingError, TrackingService};

/// 1x1 transparent GIF served for every pixel request.
pub static TRANSPARENT_GIF: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0xff, 0xff,
    0xff, 0x00, 0x00, 0x00, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// Public pixel, click and delivery webhook endpoints.
pub fn tracking_router(service: Arc<TrackingService>) -> Router {
    Router::new()
        .route("/api/v1/track/open/:token", get(open_handler))
        .route("/api/v1/track/click/:token", get(click_handler))
        .route("/api/v1/webhooks/brevo", post(brevo_webhook_handler))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClickParams {
    url: Option<String>,
}

/// First `X-Forwarded-For` entry, else the socket peer.
pub(crate) fn client_info(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientInfo {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    ClientInfo {
        ip_address: forwarded.or_else(|| peer.map(|addr| addr.ip().to_string())),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    }
}

pub(crate) async fn open_handler(
    State(service): State<Arc<TrackingService>>,
    Path(token): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let client = client_info(&headers, peer.map(|ConnectInfo(addr)| addr));
    if let Err(err) = service.record_open(&token, client).await {
        error!(error = %err, "failed to record open");
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime::IMAGE_GIF.to_string()),
            (
                header::CACHE_CONTROL,
                "no-store, no-cache, must-revalidate".to_string(),
            ),
        ],
        TRANSPARENT_GIF.as_slice(),
    )
        .into_response()
}

pub(crate) async fn click_handler(
    State(service): State<Arc<TrackingService>>,
    Path(token): Path<String>,
    Query(params): Query<ClickParams>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let Some(target) = params.url.filter(|url| !url.trim().is_empty()) else {
        let payload = json!({ "error": "missing url parameter" });
        return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
    };

    let client = client_info(&headers, peer.map(|ConnectInfo(addr)| addr));
    match service.record_click(&token, &target, client).await {
        Ok((destination, _)) => Redirect::temporary(destination.as_str()).into_response(),
        Err(TrackingError::InvalidTarget) => {
            warn!(%target, "rejected click redirect target");
            let payload = json!({ "error": TrackingError::InvalidTarget.to_string() });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
        Err(err) => {
            error!(error = %err, "failed to record click");
            match super::service::validate_redirect(&target) {
                Ok(destination) => Redirect::temporary(destination.as_str()).into_response(),
                Err(_) => StatusCode::BAD_REQUEST.into_response(),
            }
        }
    }
}

pub(crate) async fn brevo_webhook_handler(
    State(service): State<Arc<TrackingService>>,
    body: Bytes,
) -> Response {
    let payload: BrevoWebhook = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "malformed brevo webhook payload");
            return (StatusCode::OK, Json(json!({ "status": "error" }))).into_response();
        }
    };

    match service.apply_webhook(&payload).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(err) => {
            error!(error = %err, event = %payload.event, "brevo webhook processing failed");
            (StatusCode::OK, Json(json!({ "status": "error" }))).into_response()
        }
    }
}
