//! Operator API, mounted under `/admin` when `admin.enabled`.
//!
//! Bearer-token protected. Exposes gate status, in-flight settlements, and
//! manual reconciliation by wallet and optional transaction hash.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/pending", get(get_pending))
        .route("/admin/reconcile", post(post_reconcile))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
