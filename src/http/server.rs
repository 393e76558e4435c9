//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the public and admin handlers
//! - Wire up middleware (request ID, tracing, CORS, body limit, timeout)
//! - Serve until the shutdown broadcast fires

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::access::AccessVerifier;
use crate::admin::setup_admin_router;
use crate::config::{AdminConfig, GateConfig};
use crate::health::HealthProbe;
use crate::http::handlers;
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer};
use crate::ledger::SubscriptionLedger;
use crate::payments::PaymentProcessor;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<PaymentProcessor>,
    pub verifier: AccessVerifier,
    pub ledger: Arc<dyn SubscriptionLedger>,
    pub health: Arc<HealthProbe>,
    pub admin: AdminConfig,
    pub started_at: Instant,
}

/// HTTP server for the access gate.
pub struct HttpServer {
    router: Router,
    config: GateConfig,
}

impl HttpServer {
    pub fn new(config: GateConfig, state: AppState) -> Self {
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GateConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/", get(handlers::health))
            .route("/execute-payment", post(handlers::execute_payment))
            .route("/verify-access", post(handlers::verify_access))
            .with_state(state.clone());

        if config.admin.enabled {
            router = router.merge(setup_admin_router(state));
        }

        // Outermost first. CORS wraps the whole stack so preflights skip it; it
        // sits outside the ServiceBuilder because its body type differs.
        router
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
                    .layer(propagate_request_id_layer())
                    .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
            .layer(CorsLayer::permissive())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            admin_enabled = self.config.admin.enabled,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
