//! Chain-specific types and error definitions.

use alloy::primitives::{Address, TxHash, U256};
use thiserror::Error;

// Re-export BlockchainConfig from config module to avoid duplication
pub use crate::config::schema::BlockchainConfig;

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed on every provider.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The node refused the signed payload (stale nonce, underpriced, ...).
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// Inclusion was not observed in time. The transfer may still land.
    #[error("Transaction {tx_hash} not confirmed after {waited_secs} seconds")]
    ConfirmationTimeout { tx_hash: TxHash, waited_secs: u64 },

    /// Transaction was mined but reverted.
    #[error("Transaction reverted: {0}")]
    Reverted(TxHash),

    /// Invalid private key format or signing failure.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Custody balance cannot cover the configured amount.
    #[error("Insufficient balance: required {required} wei, available {available} wei")]
    InsufficientFunds { required: U256, available: U256 },

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// An unsigned, fully specified native-token transfer.
///
/// Built per request and discarded after broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTransaction {
    pub recipient: Address,
    pub value: U256,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub nonce: u64,
    pub chain_id: u64,
}

/// A signed, RLP-encoded transfer ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone)]
pub struct SignedPayment {
    pub tx_hash: TxHash,
    pub nonce: u64,
    pub raw: Vec<u8>,
}

/// The part of a mined receipt the gate cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    pub success: bool,
    pub from: Address,
    pub to: Option<Address>,
}

/// Transaction confirmation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Transaction is pending in mempool (or unknown to the node).
    Pending,
    /// Transaction has been mined but not enough confirmations.
    Confirming { current: u32, required: u32 },
    /// Transaction is confirmed with required block depth.
    Confirmed(TransactionReceipt),
    /// Transaction was mined and reverted.
    Failed(TransactionReceipt),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BlockchainError::Rpc("All RPC providers failed".into());
        assert_eq!(err.to_string(), "RPC error: All RPC providers failed");

        let err = BlockchainError::InsufficientFunds {
            required: U256::from(1000),
            available: U256::from(10),
        };
        assert!(err.to_string().contains("required 1000 wei"));

        let err = BlockchainError::ConfirmationTimeout {
            tx_hash: TxHash::ZERO,
            waited_secs: 120,
        };
        assert!(err.to_string().contains("120 seconds"));
    }
}
