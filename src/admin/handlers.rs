use alloy::primitives::TxHash;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Serialize;

use crate::http::request::ReconcileRequest;
use crate::http::server::AppState;
use crate::ledger::WalletAddress;
use crate::payments::{PaymentError, PendingSettlement, ReconcileOutcome};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub custody_address: String,
    pub recipient: String,
    pub payment_amount: String,
    pub chain_id: u64,
    pub pending_settlements: usize,
    /// `None` when the ledger could not be read.
    pub active_subscriptions: Option<i64>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let settings = state.processor.settings();
    let active_subscriptions = match state.ledger.count_active().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "Could not count active subscriptions");
            None
        }
    };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        custody_address: state.processor.custody_address().to_checksum(None),
        recipient: settings.recipient.to_checksum(None),
        payment_amount: settings.amount_display.clone(),
        chain_id: settings.chain_id,
        pending_settlements: state.processor.pending().len(),
        active_subscriptions,
    })
}

pub async fn get_pending(State(state): State<AppState>) -> Json<Vec<PendingSettlement>> {
    Json(state.processor.pending().snapshot())
}

pub async fn post_reconcile(
    State(state): State<AppState>,
    payload: Result<Json<ReconcileRequest>, JsonRejection>,
) -> Result<Json<ReconcileOutcome>, PaymentError> {
    let Json(request) = payload.map_err(|e| PaymentError::InvalidRequest(e.body_text()))?;
    let wallet = WalletAddress::parse(&request.wallet_address)?;
    let tx_hash = match request.tx_hash.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(raw.parse::<TxHash>().map_err(|_| {
            PaymentError::InvalidRequest(format!("malformed tx hash {}", raw))
        })?),
        _ => None,
    };

    tracing::info!(wallet = %wallet, tx_hash = ?tx_hash, "Manual reconciliation requested");
    let outcome = state.processor.reconcile(&wallet, tx_hash).await?;
    Ok(Json(outcome))
}
