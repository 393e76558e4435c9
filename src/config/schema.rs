//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the access gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Blockchain integration settings.
    pub blockchain: BlockchainConfig,

    /// What is paid, and to whom.
    pub payment: PaymentConfig,

    /// Access ledger storage.
    pub database: DatabaseConfig,

    /// Background reconciliation of unsettled payments.
    pub reconciliation: ReconciliationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    ///
    /// Must outlast a full confirmation wait plus the RPC calls before it.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 180 }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 80002 for Polygon Amoy, 31337 for local Anvil).
    pub chain_id: u64,

    /// Human readable network name, reported by the health probe.
    pub network_name: String,

    /// Native currency symbol, reported by the health probe.
    pub currency_symbol: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// How long a broadcast waits for inclusion before reporting an
    /// ambiguous outcome.
    pub confirmation_timeout_secs: u64,

    /// Number of blocks (including the inclusion block) before a transfer
    /// counts as confirmed.
    pub confirmation_blocks: u32,

    /// Receipt polling interval in milliseconds.
    pub receipt_poll_interval_ms: u64,

    /// Gas limit for a plain value transfer.
    pub gas_limit: u64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://rpc-amoy.polygon.technology".to_string(),
            failover_urls: Vec::new(),
            chain_id: 80002,
            network_name: "Polygon Amoy".to_string(),
            currency_symbol: "POL".to_string(),
            rpc_timeout_secs: 10,
            confirmation_timeout_secs: 120,
            confirmation_blocks: 1,
            receipt_poll_interval_ms: 2000,
            gas_limit: 21_000,
            max_gas_price_gwei: 500,
        }
    }
}

/// Payment terms.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Address receiving every payment.
    pub recipient: String,

    /// Amount per payment, as a decimal string in native token units.
    pub amount: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            recipient: String::new(),
            amount: "0.001".to_string(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string.
    pub url: String,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection.
    pub acquire_timeout_secs: u64,

    /// Apply embedded migrations at startup.
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
            acquire_timeout_secs: 5,
            run_migrations: true,
        }
    }
}

/// Reconciliation worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Run the background reconciler.
    pub enabled: bool,

    /// Sweep interval in seconds.
    pub interval_secs: u64,

    /// Base delay for exponential backoff between attempts on one entry.
    pub base_delay_ms: u64,

    /// Maximum delay between attempts on one entry.
    pub max_delay_ms: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 15,
            base_delay_ms: 5_000,
            max_delay_ms: 300_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: GateConfig = toml::from_str(
            r#"
            [payment]
            recipient = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8"
            "#,
        )
        .unwrap();

        assert_eq!(config.payment.amount, "0.001");
        assert_eq!(config.blockchain.chain_id, 80002);
        assert_eq!(config.blockchain.confirmation_timeout_secs, 120);
        assert!(config.timeouts.request_secs > config.blockchain.confirmation_timeout_secs);
        assert!(!config.admin.enabled);
    }
}
