use alloy::primitives::utils::format_ether;
use alloy::primitives::Address;
use serde::Serialize;
use std::sync::Arc;

use crate::blockchain::ChainRpc;
use crate::ledger::SubscriptionLedger;
use crate::observability::metrics;

pub const RUNNING_MESSAGE: &str = "Payment server is running";

/// Best-effort status body. Fields that could not be read are omitted.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub message: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_wallet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct HealthProbe {
    chain: Arc<dyn ChainRpc>,
    ledger: Arc<dyn SubscriptionLedger>,
    custody: Address,
    network_name: String,
    currency_symbol: String,
    chain_id: u64,
}

impl HealthProbe {
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        ledger: Arc<dyn SubscriptionLedger>,
        custody: Address,
        network_name: String,
        currency_symbol: String,
        chain_id: u64,
    ) -> Self {
        Self {
            chain,
            ledger,
            custody,
            network_name,
            currency_symbol,
            chain_id,
        }
    }

    /// Never fails; an unreachable node degrades the report instead.
    pub async fn probe(&self) -> HealthReport {
        let balance = match self.chain.balance(self.custody).await {
            Ok(balance) => balance,
            Err(e) => {
                metrics::record_rpc_health(false);
                tracing::warn!(error = %e, "Health probe could not read custody balance");
                return HealthReport {
                    message: RUNNING_MESSAGE,
                    status: "healthy",
                    payment_wallet: None,
                    balance: None,
                    network: None,
                    chain_id: None,
                    connected: None,
                    database: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let connected = self.chain.block_number().await.is_ok();
        metrics::record_rpc_health(connected);
        let database = match self.ledger.ping().await {
            Ok(()) => "connected",
            Err(e) => {
                tracing::warn!(error = %e, "Health probe could not reach the ledger");
                "unavailable"
            }
        };

        HealthReport {
            message: RUNNING_MESSAGE,
            status: "healthy",
            payment_wallet: Some(self.custody.to_checksum(None)),
            balance: Some(format!("{} {}", format_ether(balance), self.currency_symbol)),
            network: Some(self.network_name.clone()),
            chain_id: Some(self.chain_id),
            connected: Some(connected),
            database: Some(database),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::MockChain;
    use crate::ledger::InMemoryLedger;
    use alloy::primitives::U256;

    fn probe(chain: Arc<MockChain>, ledger: Arc<InMemoryLedger>) -> HealthProbe {
        HealthProbe::new(
            chain,
            ledger,
            Address::ZERO,
            "Polygon Amoy".to_string(),
            "POL".to_string(),
            80002,
        )
    }

    #[tokio::test]
    async fn test_healthy_report() {
        let chain = Arc::new(MockChain::new(
            Address::ZERO,
            80002,
            U256::from(1_500_000_000_000_000_000u64),
        ));
        let report = probe(chain, Arc::new(InMemoryLedger::new())).probe().await;

        assert_eq!(report.status, "healthy");
        let balance = report.balance.unwrap();
        assert!(balance.starts_with("1.5"), "{balance}");
        assert!(balance.ends_with(" POL"));
        assert_eq!(report.connected, Some(true));
        assert_eq!(report.database, Some("connected"));
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_degrades_when_rpc_down() {
        let chain = Arc::new(MockChain::new(Address::ZERO, 80002, U256::ZERO));
        chain.set_offline(true);
        let report = probe(chain, Arc::new(InMemoryLedger::new())).probe().await;

        assert_eq!(report.status, "healthy");
        assert!(report.error.is_some());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("balance").is_none());
        assert!(json.get("payment_wallet").is_none());
    }

    #[tokio::test]
    async fn test_database_unavailable_reported() {
        let chain = Arc::new(MockChain::new(Address::ZERO, 80002, U256::ZERO));
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_failing(true);
        let report = probe(chain, ledger).probe().await;
        assert_eq!(report.database, Some("unavailable"));
    }
}
