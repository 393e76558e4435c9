//! Ledger record, key, and error types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use std::fmt;
use thiserror::Error;

/// A wallet address in its canonical form: `0x` followed by 40 lower-case hex
/// digits. The only key the ledger accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct WalletAddress(String);

/// Input that is not a 20-byte hex address.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid wallet address: {0}")]
pub struct InvalidWalletAddress(pub String);

impl WalletAddress {
    /// Trim, validate, and lower-case.
    pub fn parse(raw: &str) -> Result<Self, InvalidWalletAddress> {
        let lowered = raw.trim().to_ascii_lowercase();
        let Some(hex) = lowered.strip_prefix("0x") else {
            return Err(InvalidWalletAddress(raw.to_string()));
        };
        if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidWalletAddress(raw.to_string()));
        }
        Ok(Self(lowered))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of `wallet_subscriptions`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: i32,
    pub wallet_address: String,
    pub tx_hash: String,
    pub payment_amount: String,
    pub subscription_date: DateTime<Utc>,
    pub is_active: bool,
    /// Stored, never enforced.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of [`SubscriptionLedger::upsert`](crate::ledger::SubscriptionLedger::upsert).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The row was inserted, or an inactive row was reactivated.
    Written(SubscriptionRecord),
    /// An active row already existed and was left unchanged.
    AlreadyActive(SubscriptionRecord),
}

impl UpsertOutcome {
    pub fn record(&self) -> &SubscriptionRecord {
        match self {
            Self::Written(r) | Self::AlreadyActive(r) => r,
        }
    }

    pub fn into_record(self) -> SubscriptionRecord {
        match self {
            Self::Written(r) | Self::AlreadyActive(r) => r,
        }
    }
}

/// Errors from the ledger store.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_is_lowercased_and_trimmed() {
        let wallet = WalletAddress::parse("  0x70997970C51812dc3A010C7d01b50e0d17dc79C8 ").unwrap();
        assert_eq!(wallet.as_str(), "0x70997970c51812dc3a010c7d01b50e0d17dc79c8");
    }

    #[test]
    fn test_uppercase_prefix_accepted() {
        let wallet = WalletAddress::parse("0X70997970C51812DC3A010C7D01B50E0D17DC79C8").unwrap();
        assert!(wallet.as_str().starts_with("0x"));
    }

    #[test]
    fn test_invalid_wallets() {
        for raw in [
            "",
            "0x",
            "70997970c51812dc3a010c7d01b50e0d17dc79c8",
            "0x70997970c51812dc3a010c7d01b50e0d17dc79",
            "0x70997970c51812dc3a010c7d01b50e0d17dc79c8aa",
            "0xz0997970c51812dc3a010c7d01b50e0d17dc79c8",
        ] {
            assert!(WalletAddress::parse(raw).is_err(), "accepted {raw:?}");
        }
    }
}
