use std::sync::Arc;

use crate::ledger::{LedgerResult, SubscriptionLedger, SubscriptionRecord, WalletAddress};
use crate::observability::metrics;

/// Answer to "does this wallet have access".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessStatus {
    pub wallet: WalletAddress,
    pub has_access: bool,
    /// Present only when `has_access`.
    pub record: Option<SubscriptionRecord>,
}

/// Decides access strictly from `is_active`. `expires_at` is not evaluated.
#[derive(Clone)]
pub struct AccessVerifier {
    ledger: Arc<dyn SubscriptionLedger>,
}

impl AccessVerifier {
    pub fn new(ledger: Arc<dyn SubscriptionLedger>) -> Self {
        Self { ledger }
    }

    pub async fn verify(&self, wallet: &WalletAddress) -> LedgerResult<AccessStatus> {
        let record = match self.ledger.find(wallet).await {
            Ok(record) => record.filter(|r| r.is_active),
            Err(e) => {
                metrics::record_access_check("error");
                return Err(e);
            }
        };

        let has_access = record.is_some();
        metrics::record_access_check(if has_access { "granted" } else { "denied" });
        tracing::debug!(wallet = %wallet, has_access, "Access checked");

        Ok(AccessStatus {
            wallet: wallet.clone(),
            has_access,
            record,
        })
    }
}
