use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the gate for every failed request.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub error_code: String,
    pub retry_safe: bool,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gate returned {status}: {} ({})", .body.error, .body.error_code)]
    Api { status: StatusCode, body: ApiError },

    #[error("gate returned {status} with an unexpected body: {text}")]
    Unexpected { status: StatusCode, text: String },
}

impl GateError {
    /// Whether the same call may be repeated without risking a second payment.
    /// Transport failures are treated as unsafe: the payment may have gone out.
    pub fn retry_safe(&self) -> bool {
        match self {
            Self::Api { body, .. } => body.retry_safe,
            _ => false,
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Api { body, .. } => Some(&body.error_code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub message: String,
    pub status: String,
    #[serde(default)]
    pub payment_wallet: Option<String>,
    #[serde(default)]
    pub balance: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub connected: Option<bool>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentReceipt {
    pub success: bool,
    pub message: String,
    pub wallet_address: String,
    pub subscription_date: String,
    pub tx_hash: String,
    pub payment_amount: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessStatus {
    pub has_access: bool,
    pub wallet_address: String,
    #[serde(default)]
    pub subscription_date: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub payment_amount: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of `POST /admin/reconcile`. `outcome` is one of `already_active`,
/// `recorded`, `still_pending`, `dropped` or `reverted`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileResult {
    pub outcome: String,
    #[serde(default)]
    pub record: Option<serde_json::Value>,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Serialize)]
struct WalletBody<'a> {
    wallet_address: &'a str,
}

#[derive(Serialize)]
struct ReconcileBody<'a> {
    wallet_address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_hash: Option<&'a str>,
}

pub struct GateClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GateClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Attach the admin API key used for `/admin/*` calls.
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub async fn health(&self) -> Result<HealthStatus, GateError> {
        let resp = self.client.get(format!("{}/", self.base_url)).send().await?;
        decode(resp).await
    }

    /// Pay for access. Check `GateError::retry_safe` before retrying a failure.
    pub async fn execute_payment(&self, wallet_address: &str) -> Result<PaymentReceipt, GateError> {
        let resp = self
            .client
            .post(format!("{}/execute-payment", self.base_url))
            .json(&WalletBody { wallet_address })
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn verify_access(&self, wallet_address: &str) -> Result<AccessStatus, GateError> {
        let resp = self
            .client
            .post(format!("{}/verify-access", self.base_url))
            .json(&WalletBody { wallet_address })
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn admin_status(&self) -> Result<serde_json::Value, GateError> {
        let resp = self.admin_get("/admin/status").send().await?;
        decode(resp).await
    }

    pub async fn admin_pending(&self) -> Result<Vec<serde_json::Value>, GateError> {
        let resp = self.admin_get("/admin/pending").send().await?;
        decode(resp).await
    }

    pub async fn reconcile(
        &self,
        wallet_address: &str,
        tx_hash: Option<&str>,
    ) -> Result<ReconcileResult, GateError> {
        let mut req = self
            .client
            .post(format!("{}/admin/reconcile", self.base_url))
            .json(&ReconcileBody {
                wallet_address,
                tx_hash,
            });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        decode(req.send().await?).await
    }

    fn admin_get(&self, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, GateError> {
    let status = resp.status();
    let text = resp.text().await?;

    if status.is_success() {
        return serde_json::from_str(&text).map_err(|_| GateError::Unexpected { status, text });
    }

    match serde_json::from_str::<ApiError>(&text) {
        Ok(body) => Err(GateError::Api { status, body }),
        Err(_) => Err(GateError::Unexpected { status, text }),
    }
}
