//! The network seam used by the payment pipeline.
//!
//! [`BlockchainClient`](crate::blockchain::BlockchainClient) is the production
//! implementation; tests substitute a scripted fake.

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;

use crate::blockchain::types::{BlockchainResult, TransactionReceipt};

/// Which block to count an account's transactions against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceTag {
    /// Mined transactions only.
    Latest,
    /// Mined plus mempool transactions.
    Pending,
}

/// Read and submit operations against one EVM network.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Chain ID reported by the node.
    async fn chain_id(&self) -> BlockchainResult<u64>;

    /// Latest block number.
    async fn block_number(&self) -> BlockchainResult<u64>;

    /// Native balance of `address` in wei.
    async fn balance(&self, address: Address) -> BlockchainResult<U256>;

    /// Current legacy gas price in wei.
    async fn gas_price(&self) -> BlockchainResult<u128>;

    /// Transaction count (next nonce) for `address`.
    async fn transaction_count(&self, address: Address, tag: NonceTag) -> BlockchainResult<u64>;

    /// Submit a signed payload. Returns the hash the node accepted.
    ///
    /// A node-side refusal is [`BlockchainError::Rejected`](crate::blockchain::BlockchainError::Rejected);
    /// transport failures are [`BlockchainError::Rpc`](crate::blockchain::BlockchainError::Rpc).
    async fn send_raw_transaction(&self, raw: &[u8]) -> BlockchainResult<TxHash>;

    /// Receipt for `tx_hash`, or `None` while it is not mined.
    async fn transaction_receipt(&self, tx_hash: TxHash)
        -> BlockchainResult<Option<TransactionReceipt>>;
}
