//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect to the RPC provider and the ledger
//! - Load the custody key from the environment
//! - Assemble the service objects handed to the HTTP server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - `assemble` takes its collaborators as trait objects so tests can
//!   substitute a scripted chain and an in-memory ledger

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::access::AccessVerifier;
use crate::blockchain::wallet::PRIVATE_KEY_ENV_VAR;
use crate::blockchain::{BlockchainClient, BlockchainError, ChainRpc, CustodyWallet};
use crate::config::{ConfigError, GateConfig};
use crate::health::HealthProbe;
use crate::http::AppState;
use crate::ledger::{LedgerError, PgLedger, SubscriptionLedger};
use crate::payments::{PaymentProcessor, PaymentSettings};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("blockchain error: {0}")]
    Blockchain(#[from] BlockchainError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Wire the services together.
pub fn assemble(
    config: &GateConfig,
    chain: Arc<dyn ChainRpc>,
    wallet: CustodyWallet,
    ledger: Arc<dyn SubscriptionLedger>,
) -> Result<AppState, ConfigError> {
    let settings = PaymentSettings::from_config(config)?;
    let custody = wallet.address();

    let health = HealthProbe::new(
        chain.clone(),
        ledger.clone(),
        custody,
        config.blockchain.network_name.clone(),
        config.blockchain.currency_symbol.clone(),
        config.blockchain.chain_id,
    );
    let processor = PaymentProcessor::new(chain, wallet, ledger.clone(), settings);

    Ok(AppState {
        processor: Arc::new(processor),
        verifier: AccessVerifier::new(ledger.clone()),
        ledger,
        health: Arc::new(health),
        admin: config.admin.clone(),
        started_at: Instant::now(),
    })
}

/// Build the custody wallet from the `PRIVATE_KEY` secret. An unset or blank
/// secret is a missing secret; anything else that fails to parse is reported
/// as a wallet error, without the key itself.
fn load_wallet(secret: Option<String>, chain_id: u64) -> Result<CustodyWallet, StartupError> {
    let secret = secret
        .filter(|key| !key.trim().is_empty())
        .ok_or(ConfigError::MissingSecret(PRIVATE_KEY_ENV_VAR))?;
    Ok(CustodyWallet::from_private_key(&secret, chain_id)?)
}

/// Connect to the configured RPC provider and Postgres, then assemble.
pub async fn connect(config: &GateConfig) -> Result<AppState, StartupError> {
    let wallet = load_wallet(
        std::env::var(PRIVATE_KEY_ENV_VAR).ok(),
        config.blockchain.chain_id,
    )?;

    let client = BlockchainClient::new(config.blockchain.clone()).await?;
    match client.verify_chain_id().await {
        Ok(()) => {}
        Err(e @ BlockchainError::ChainMismatch { .. }) => return Err(e.into()),
        Err(e) => {
            // The node may come up later; the health probe reports it.
            let reachable = client.is_healthy().await;
            tracing::warn!(error = %e, reachable, "Could not verify chain ID at startup");
        }
    }

    let ledger = PgLedger::connect(&config.database).await?;
    if config.database.run_migrations {
        ledger.migrate().await?;
    }

    tracing::info!(
        custody = %wallet.address(),
        recipient = %config.payment.recipient,
        amount = %config.payment.amount,
        chain_id = config.blockchain.chain_id,
        "Services connected"
    );

    Ok(assemble(config, Arc::new(client), wallet, Arc::new(ledger))?)
}
