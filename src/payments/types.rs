//! Payment pipeline results.

use alloy::primitives::TxHash;
use serde::Serialize;

use crate::ledger::SubscriptionRecord;

/// Successful result of `execute-payment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// A transfer was confirmed and recorded by this call.
    Granted(SubscriptionRecord),
    /// The wallet already had access; nothing was paid.
    AlreadyActive(SubscriptionRecord),
}

impl PaymentOutcome {
    pub fn record(&self) -> &SubscriptionRecord {
        match self {
            Self::Granted(r) | Self::AlreadyActive(r) => r,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Granted(_) => "Payment executed successfully, subscription granted",
            Self::AlreadyActive(_) => "Wallet already has active subscription",
        }
    }
}

/// Result of reconciling a wallet against an earlier transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The ledger already had an active record.
    AlreadyActive { record: SubscriptionRecord },
    /// The confirmed transfer is now recorded.
    Recorded { record: SubscriptionRecord },
    /// No receipt yet, or not enough confirmations.
    StillPending { tx_hash: TxHash },
    /// The transfer will never be mined; the wallet may pay again.
    Dropped { tx_hash: TxHash },
    /// The transfer was mined and reverted; the wallet may pay again.
    Reverted { tx_hash: TxHash },
}

/// Canonical `0x`-prefixed lower-case hex form stored in the ledger.
pub fn tx_hash_hex(tx_hash: &TxHash) -> String {
    format!("0x{}", alloy::hex::encode(tx_hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_hash_hex_is_66_chars() {
        let hex = tx_hash_hex(&TxHash::repeat_byte(0xab));
        assert_eq!(hex.len(), 66);
        assert!(hex.starts_with("0xabab"));
    }

    #[test]
    fn test_reconcile_outcome_tagged() {
        let json = serde_json::to_value(ReconcileOutcome::Dropped { tx_hash: TxHash::ZERO }).unwrap();
        assert_eq!(json["outcome"], "dropped");
        assert!(json["tx_hash"].as_str().unwrap().starts_with("0x"));
    }
}
