//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that addresses, amounts and URLs parse
//! - Validate value ranges (timeouts > 0, request deadline outlasts confirmation)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, U256};
use thiserror::Error;

use crate::config::schema::{BlockchainConfig, GateConfig};

/// Width of the ledger's `payment_amount` column.
const MAX_AMOUNT_LEN: usize = 32;

const RPC_CALLS_BEFORE_CONFIRMATION: u64 = 4;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }

    let chain = &config.blockchain;
    if let Err(e) = chain.rpc_url.parse::<url::Url>() {
        errors.push(ValidationError::new(
            "blockchain.rpc_url",
            format!("'{}' is not a valid URL: {}", chain.rpc_url, e),
        ));
    }
    if chain.chain_id == 0 {
        errors.push(ValidationError::new("blockchain.chain_id", "must be > 0"));
    }
    if chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.rpc_timeout_secs", "must be > 0"));
    }
    if chain.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "blockchain.confirmation_timeout_secs",
            "must be > 0",
        ));
    }
    if chain.confirmation_blocks == 0 {
        errors.push(ValidationError::new("blockchain.confirmation_blocks", "must be >= 1"));
    }
    if chain.receipt_poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "blockchain.receipt_poll_interval_ms",
            "must be > 0",
        ));
    }
    if chain.gas_limit < 21_000 {
        errors.push(ValidationError::new(
            "blockchain.gas_limit",
            "must be at least 21000 for a value transfer",
        ));
    }
    let required = min_request_secs(chain);
    if config.timeouts.request_secs <= required {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            format!(
                "{}s must exceed the confirmation timeout plus RPC time before it ({}s)",
                config.timeouts.request_secs, required
            ),
        ));
    }

    match config.payment.recipient.parse::<Address>() {
        Ok(addr) if addr.is_zero() => {
            errors.push(ValidationError::new("payment.recipient", "must not be the zero address"));
        }
        Ok(_) => {}
        Err(_) => errors.push(ValidationError::new(
            "payment.recipient",
            format!("'{}' is not an address", config.payment.recipient),
        )),
    }

    if config.payment.amount.trim().len() > MAX_AMOUNT_LEN {
        errors.push(ValidationError::new(
            "payment.amount",
            format!("must be at most {} characters", MAX_AMOUNT_LEN),
        ));
    }
    match parse_ether(&config.payment.amount) {
        Ok(wei) if wei == U256::ZERO => {
            errors.push(ValidationError::new("payment.amount", "must be greater than zero"));
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new(
            "payment.amount",
            format!("'{}' is not a decimal amount: {}", config.payment.amount, e),
        )),
    }

    let db = &config.database;
    if !(db.url.starts_with("postgres://") || db.url.starts_with("postgresql://")) {
        errors.push(ValidationError::new(
            "database.url",
            "must be a postgres:// connection string",
        ));
    }
    if db.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be > 0"));
    }

    if config.reconciliation.enabled && config.reconciliation.interval_secs == 0 {
        errors.push(ValidationError::new("reconciliation.interval_secs", "must be > 0"));
    }

    let obs = &config.observability;
    if !matches!(obs.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            "must be \"pretty\" or \"json\"",
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "required when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Seconds a payment request can spend before its handler gives up: the
/// confirmation wait plus four RPC calls (balance, gas price, nonce, send)
/// that may each walk every provider.
fn min_request_secs(chain: &BlockchainConfig) -> u64 {
    let providers = 1 + chain.failover_urls.len() as u64;
    chain.confirmation_timeout_secs
        + RPC_CALLS_BEFORE_CONFIRMATION * chain.rpc_timeout_secs * providers
}
