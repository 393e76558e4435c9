//! Request IDs and request bodies.
//!
//! # Responsibilities
//! - Generate a UUID v4 `x-request-id` when the client did not send one
//! - Echo it on the response and record it on the request span
//! - Define the JSON bodies the public endpoints accept

use axum::body::Body;
use axum::http::{HeaderName, Request};
use serde::Deserialize;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::Span;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Span for `TraceLayer`, carrying the request ID.
pub fn make_request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}

/// Body of `POST /execute-payment` and `POST /verify-access`.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletRequest {
    pub wallet_address: String,
}

/// Body of `POST /admin/reconcile`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileRequest {
    pub wallet_address: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
}
