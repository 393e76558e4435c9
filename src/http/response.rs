//! Response bodies and error mapping.
//!
//! # Design Decisions
//! - Every failure is JSON with a stable `error_code` and a `retry_safe` flag
//! - Ambiguous payment outcomes carry the transaction hash

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::access::AccessStatus;
use crate::payments::{tx_hash_hex, PaymentError, PaymentOutcome};

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub success: bool,
    pub message: &'static str,
    pub wallet_address: String,
    pub subscription_date: DateTime<Utc>,
    pub tx_hash: String,
    pub payment_amount: String,
}

impl From<PaymentOutcome> for PaymentResponse {
    fn from(outcome: PaymentOutcome) -> Self {
        let message = outcome.message();
        let record = match outcome {
            PaymentOutcome::Granted(r) | PaymentOutcome::AlreadyActive(r) => r,
        };
        Self {
            success: true,
            message,
            wallet_address: record.wallet_address,
            subscription_date: record.subscription_date,
            tx_hash: record.tx_hash,
            payment_amount: record.payment_amount,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub has_access: bool,
    pub wallet_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl From<AccessStatus> for AccessResponse {
    fn from(status: AccessStatus) -> Self {
        match status.record {
            Some(record) => Self {
                has_access: true,
                wallet_address: status.wallet.to_string(),
                subscription_date: Some(record.subscription_date),
                tx_hash: Some(record.tx_hash),
                payment_amount: Some(record.payment_amount),
                message: None,
            },
            None => Self {
                has_access: false,
                wallet_address: status.wallet.to_string(),
                subscription_date: None,
                tx_hash: None,
                payment_amount: None,
                message: Some("No active subscription found"),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: &'static str,
    pub retry_safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

pub fn status_for(err: &PaymentError) -> StatusCode {
    match err {
        PaymentError::InvalidWallet(_)
        | PaymentError::InvalidRequest(_)
        | PaymentError::ReconciliationMismatch { .. } => StatusCode::BAD_REQUEST,
        PaymentError::NetworkUnavailable(_)
        | PaymentError::GasPriceTooHigh { .. }
        | PaymentError::InsufficientFunds { .. } => StatusCode::SERVICE_UNAVAILABLE,
        PaymentError::BroadcastRejected(_) | PaymentError::TransactionReverted(_) => {
            StatusCode::BAD_GATEWAY
        }
        PaymentError::ConfirmationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        PaymentError::PaymentInProgress { .. } => StatusCode::CONFLICT,
        PaymentError::NothingToReconcile(_) => StatusCode::NOT_FOUND,
        PaymentError::PaymentNotRecorded { .. }
        | PaymentError::Storage(_)
        | PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(error_code = self.code(), error = %self, "Request failed");
        } else {
            tracing::info!(error_code = self.code(), error = %self, "Request refused");
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            error_code: self.code(),
            retry_safe: self.retry_safe(),
            tx_hash: self.tx_hash().map(|h| tx_hash_hex(&h)),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{TxHash, U256};

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&PaymentError::InvalidWallet("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&PaymentError::InsufficientFunds {
                required: U256::from(2),
                available: U256::from(1)
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&PaymentError::ConfirmationTimeout {
                tx_hash: TxHash::ZERO,
                waited_secs: 1
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&PaymentError::PaymentInProgress { tx_hash: TxHash::ZERO }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&PaymentError::BroadcastRejected("nonce too low".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_error_body_carries_tx_hash() {
        let response = PaymentError::PaymentNotRecorded {
            tx_hash: TxHash::repeat_byte(0x11),
            reason: "db down".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_code"], "payment_not_recorded");
        assert_eq!(json["retry_safe"], false);
        assert!(json["tx_hash"].as_str().unwrap().starts_with("0x1111"));
    }
}
