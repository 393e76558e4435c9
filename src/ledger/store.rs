use async_trait::async_trait;

use crate::ledger::types::{LedgerResult, SubscriptionRecord, UpsertOutcome, WalletAddress};

/// Persistent wallet → access-record store.
///
/// At most one record exists per wallet; implementations enforce this in
/// storage, not in callers.
#[async_trait]
pub trait SubscriptionLedger: Send + Sync {
    /// Plain read of the record for `wallet`, active or not.
    async fn find(&self, wallet: &WalletAddress) -> LedgerResult<Option<SubscriptionRecord>>;

    /// Record a confirmed payment for `wallet`.
    ///
    /// An existing active record is returned unchanged. Otherwise a single
    /// atomic insert-or-update activates the row with the given hash and amount.
    async fn upsert(
        &self,
        wallet: &WalletAddress,
        tx_hash: &str,
        payment_amount: &str,
    ) -> LedgerResult<UpsertOutcome>;

    /// The record whose payment is `tx_hash`, if any.
    async fn find_by_tx_hash(&self, tx_hash: &str) -> LedgerResult<Option<SubscriptionRecord>>;

    /// Number of active records.
    async fn count_active(&self) -> LedgerResult<i64>;

    /// Cheap liveness check.
    async fn ping(&self) -> LedgerResult<()>;
}
