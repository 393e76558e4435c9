//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key, RPC URL)
//!     → wallet.rs (key loading, signing)
//!     → client.rs (RPC connection with timeouts and failover)
//!     → transaction.rs (balance, gas price, nonce → unsigned transfer)
//!     → broadcast.rs (submit, poll receipt, confirm)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when blockchain unreachable

pub mod broadcast;
pub mod client;
pub mod mock;
pub mod rpc;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use broadcast::Broadcaster;
pub use client::BlockchainClient;
pub use mock::MockChain;
pub use rpc::{ChainRpc, NonceTag};
pub use transaction::{TransactionBuilder, TransferTerms};
pub use types::{
    BlockchainConfig, BlockchainError, BlockchainResult, ConfirmationStatus,
    PaymentTransaction, SignedPayment, TransactionReceipt,
};
pub use wallet::CustodyWallet;
