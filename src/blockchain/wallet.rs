//! Custody wallet and transaction signing.
//!
//! # Security
//! - The private key is loaded ONLY from an environment variable
//! - Keys are never logged or serialized; `Debug` prints the address only

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;

use crate::blockchain::types::{BlockchainError, BlockchainResult, PaymentTransaction, SignedPayment};

/// Environment variable name for the custody private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "PRIVATE_KEY";

/// The custody account that pays for every access grant.
#[derive(Clone)]
pub struct CustodyWallet {
    /// The underlying signer (private key).
    signer: PrivateKeySigner,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl CustodyWallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `chain_id` - Chain ID for transaction signing
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> BlockchainResult<Self> {
        let key_hex = private_key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;
        let signer = signer.with_chain_id(Some(chain_id));

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Custody wallet initialized"
        );

        Ok(Self { signer, chain_id })
    }

    /// Get the wallet's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign a built transfer into a raw legacy transaction.
    ///
    /// Deterministic (RFC 6979) for identical inputs.
    pub fn sign_transfer(&self, payment: &PaymentTransaction) -> BlockchainResult<SignedPayment> {
        if payment.chain_id != self.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.chain_id,
                actual: payment.chain_id,
            });
        }

        let mut tx = TxLegacy {
            chain_id: Some(payment.chain_id),
            nonce: payment.nonce,
            gas_price: payment.gas_price,
            gas_limit: payment.gas_limit,
            to: TxKind::Call(payment.recipient),
            value: payment.value,
            input: Bytes::new(),
        };

        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| BlockchainError::Wallet(format!("Signing failed: {}", e)))?;

        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(SignedPayment {
            tx_hash: *envelope.tx_hash(),
            nonce: payment.nonce,
            raw: envelope.encoded_2718(),
        })
    }
}

impl std::fmt::Debug for CustodyWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodyWallet")
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}
