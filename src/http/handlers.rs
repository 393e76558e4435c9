//! Public endpoint handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::health::HealthReport;
use crate::http::request::WalletRequest;
use crate::http::response::{AccessResponse, PaymentResponse};
use crate::http::server::AppState;
use crate::ledger::WalletAddress;
use crate::payments::PaymentError;

/// `GET /`
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health.probe().await)
}

/// `POST /execute-payment`
pub async fn execute_payment(
    State(state): State<AppState>,
    payload: Result<Json<WalletRequest>, JsonRejection>,
) -> Result<Json<PaymentResponse>, PaymentError> {
    let wallet = parse_wallet(payload)?;
    tracing::info!(wallet = %wallet, "Payment requested");

    let outcome = state.processor.execute(&wallet).await?;
    Ok(Json(outcome.into()))
}

/// `POST /verify-access`
pub async fn verify_access(
    State(state): State<AppState>,
    payload: Result<Json<WalletRequest>, JsonRejection>,
) -> Result<Json<AccessResponse>, PaymentError> {
    let wallet = parse_wallet(payload)?;
    let status = state.verifier.verify(&wallet).await?;
    Ok(Json(status.into()))
}

fn parse_wallet(
    payload: Result<Json<WalletRequest>, JsonRejection>,
) -> Result<WalletAddress, PaymentError> {
    let Json(request) = payload.map_err(|e| PaymentError::InvalidRequest(e.body_text()))?;
    Ok(WalletAddress::parse(&request.wallet_address)?)
}
