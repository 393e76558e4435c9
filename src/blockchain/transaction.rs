//! Transfer construction from live network state.
//!
//! # Responsibilities
//! - Check the custody balance covers the configured amount
//! - Read gas price and the custody nonce
//! - Assemble an unsigned transfer

use alloy::primitives::{Address, U256};
use std::sync::Arc;

use crate::blockchain::rpc::{ChainRpc, NonceTag};
use crate::blockchain::types::{BlockchainError, BlockchainResult, PaymentTransaction};

/// Fixed parameters of every transfer the gate makes.
#[derive(Debug, Clone)]
pub struct TransferTerms {
    pub custody: Address,
    pub recipient: Address,
    pub amount: U256,
    pub gas_limit: u64,
    pub chain_id: u64,
    pub max_gas_price_gwei: u64,
}

/// Transaction builder for custody transfers.
pub struct TransactionBuilder {
    client: Arc<dyn ChainRpc>,
    terms: TransferTerms,
}

impl TransactionBuilder {
    /// Create a new transaction builder.
    pub fn new(client: Arc<dyn ChainRpc>, terms: TransferTerms) -> Self {
        Self { client, terms }
    }

    /// Build the next transfer.
    ///
    /// `nonce_floor` is the lowest nonce the caller has not yet used; the
    /// chain's pending count wins when it is higher.
    pub async fn build(&self, nonce_floor: Option<u64>) -> BlockchainResult<PaymentTransaction> {
        let balance = self.client.balance(self.terms.custody).await?;
        if balance < self.terms.amount {
            return Err(BlockchainError::InsufficientFunds {
                required: self.terms.amount,
                available: balance,
            });
        }

        let gas_price = self.client.gas_price().await?;
        let gas_price_gwei = gas_price / 1_000_000_000;
        if gas_price_gwei > self.terms.max_gas_price_gwei as u128 {
            return Err(BlockchainError::GasPriceTooHigh {
                current_gwei: gas_price_gwei as u64,
                max_gwei: self.terms.max_gas_price_gwei,
            });
        }

        let chain_nonce = self
            .client
            .transaction_count(self.terms.custody, NonceTag::Pending)
            .await?;
        let nonce = nonce_floor.map_or(chain_nonce, |floor| floor.max(chain_nonce));

        tracing::debug!(
            balance = %balance,
            gas_price = gas_price,
            chain_nonce = chain_nonce,
            nonce = nonce,
            "Built transfer"
        );

        Ok(PaymentTransaction {
            recipient: self.terms.recipient,
            value: self.terms.amount,
            gas_limit: self.terms.gas_limit,
            gas_price,
            nonce,
            chain_id: self.terms.chain_id,
        })
    }
}
