//! Caller-facing payment errors.

use alloy::primitives::{TxHash, U256};
use thiserror::Error;

use crate::blockchain::BlockchainError;
use crate::ledger::{InvalidWalletAddress, LedgerError};

/// Every way a payment or reconciliation can fail, kept distinct so clients
/// can tell whether a retry is safe.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("invalid wallet address: {0}")]
    InvalidWallet(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("blockchain network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    #[error("insufficient custody balance: required {required} wei, available {available} wei")]
    InsufficientFunds { required: U256, available: U256 },

    #[error("transaction rejected by the network: {0}")]
    BroadcastRejected(String),

    /// The transfer may still be mined; do not pay again.
    #[error("transaction {tx_hash} not confirmed after {waited_secs} seconds; it may still be mined")]
    ConfirmationTimeout { tx_hash: TxHash, waited_secs: u64 },

    #[error("transaction {0} reverted")]
    TransactionReverted(TxHash),

    #[error("a payment for this wallet is already in flight: {tx_hash}")]
    PaymentInProgress { tx_hash: TxHash },

    /// Paid on chain, ledger write failed. Reconcile instead of paying again.
    #[error("payment {tx_hash} confirmed but not recorded: {reason}")]
    PaymentNotRecorded { tx_hash: TxHash, reason: String },

    #[error("nothing to reconcile for wallet {0}")]
    NothingToReconcile(String),

    #[error("transaction {tx_hash} cannot settle this wallet: {reason}")]
    ReconciliationMismatch { tx_hash: TxHash, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] LedgerError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidWallet(_) => "invalid_wallet",
            Self::InvalidRequest(_) => "invalid_request",
            Self::NetworkUnavailable(_) => "network_unavailable",
            Self::GasPriceTooHigh { .. } => "gas_price_too_high",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::BroadcastRejected(_) => "broadcast_rejected",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::TransactionReverted(_) => "transaction_reverted",
            Self::PaymentInProgress { .. } => "payment_in_progress",
            Self::PaymentNotRecorded { .. } => "payment_not_recorded",
            Self::NothingToReconcile(_) => "nothing_to_reconcile",
            Self::ReconciliationMismatch { .. } => "reconciliation_mismatch",
            Self::Storage(_) => "storage_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether repeating the same request cannot cause a second payment.
    pub fn retry_safe(&self) -> bool {
        match self {
            Self::NetworkUnavailable(_)
            | Self::GasPriceTooHigh { .. }
            | Self::InsufficientFunds { .. }
            | Self::BroadcastRejected(_)
            | Self::TransactionReverted(_)
            | Self::PaymentInProgress { .. }
            | Self::Storage(_) => true,
            Self::InvalidWallet(_)
            | Self::InvalidRequest(_)
            | Self::ConfirmationTimeout { .. }
            | Self::PaymentNotRecorded { .. }
            | Self::NothingToReconcile(_)
            | Self::ReconciliationMismatch { .. }
            | Self::Internal(_) => false,
        }
    }

    /// The on-chain transaction this error concerns, if one exists.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::ConfirmationTimeout { tx_hash, .. }
            | Self::PaymentInProgress { tx_hash }
            | Self::PaymentNotRecorded { tx_hash, .. }
            | Self::ReconciliationMismatch { tx_hash, .. } => Some(*tx_hash),
            Self::TransactionReverted(tx_hash) => Some(*tx_hash),
            _ => None,
        }
    }
}

impl From<BlockchainError> for PaymentError {
    fn from(err: BlockchainError) -> Self {
        match err {
            BlockchainError::Rpc(msg) => Self::NetworkUnavailable(msg),
            BlockchainError::Rejected(reason) => Self::BroadcastRejected(reason),
            BlockchainError::ConfirmationTimeout { tx_hash, waited_secs } => {
                Self::ConfirmationTimeout { tx_hash, waited_secs }
            }
            BlockchainError::Reverted(tx_hash) => Self::TransactionReverted(tx_hash),
            BlockchainError::InsufficientFunds { required, available } => {
                Self::InsufficientFunds { required, available }
            }
            BlockchainError::GasPriceTooHigh { current_gwei, max_gwei } => {
                Self::GasPriceTooHigh { current_gwei, max_gwei }
            }
            err @ (BlockchainError::Wallet(_) | BlockchainError::ChainMismatch { .. }) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<InvalidWalletAddress> for PaymentError {
    fn from(err: InvalidWalletAddress) -> Self {
        Self::InvalidWallet(err.0)
    }
}
