//! In-process ledger for tests and local development.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use crate::ledger::store::SubscriptionLedger;
use crate::ledger::types::{
    LedgerError, LedgerResult, SubscriptionRecord, UpsertOutcome, WalletAddress,
};

/// A [`SubscriptionLedger`] over a concurrent map.
///
/// The map entry lock makes each upsert atomic per wallet. `set_failing`
/// turns every call into [`LedgerError::Unavailable`].
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    records: Arc<DashMap<String, SubscriptionRecord>>,
    next_id: Arc<AtomicI32>,
    failing: Arc<AtomicBool>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a storage outage.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Total rows, active or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mark a record inactive.
    pub fn deactivate(&self, wallet: &WalletAddress) {
        if let Some(mut record) = self.records.get_mut(wallet.as_str()) {
            record.is_active = false;
        }
    }

    fn check(&self) -> LedgerResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("in-memory ledger set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionLedger for InMemoryLedger {
    async fn find(&self, wallet: &WalletAddress) -> LedgerResult<Option<SubscriptionRecord>> {
        self.check()?;
        Ok(self.records.get(wallet.as_str()).map(|r| r.value().clone()))
    }

    async fn upsert(
        &self,
        wallet: &WalletAddress,
        tx_hash: &str,
        payment_amount: &str,
    ) -> LedgerResult<UpsertOutcome> {
        self.check()?;
        match self.records.entry(wallet.as_str().to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_active {
                    return Ok(UpsertOutcome::AlreadyActive(entry.get().clone()));
                }
                let record = entry.get_mut();
                record.tx_hash = tx_hash.to_string();
                record.payment_amount = payment_amount.to_string();
                record.subscription_date = Utc::now();
                record.is_active = true;
                Ok(UpsertOutcome::Written(record.clone()))
            }
            Entry::Vacant(entry) => {
                let record = SubscriptionRecord {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                    wallet_address: wallet.as_str().to_string(),
                    tx_hash: tx_hash.to_string(),
                    payment_amount: payment_amount.to_string(),
                    subscription_date: Utc::now(),
                    is_active: true,
                    expires_at: None,
                };
                entry.insert(record.clone());
                Ok(UpsertOutcome::Written(record))
            }
        }
    }

    async fn find_by_tx_hash(&self, tx_hash: &str) -> LedgerResult<Option<SubscriptionRecord>> {
        self.check()?;
        Ok(self
            .records
            .iter()
            .find(|r| r.value().tx_hash == tx_hash)
            .map(|r| r.value().clone()))
    }

    async fn count_active(&self) -> LedgerResult<i64> {
        self.check()?;
        Ok(self.records.iter().filter(|r| r.value().is_active).count() as i64)
    }

    async fn ping(&self) -> LedgerResult<()> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(n: u8) -> WalletAddress {
        WalletAddress::parse(&format!("0x{:040x}", n)).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_then_find() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.find(&wallet(1)).await.unwrap().is_none());

        let outcome = ledger.upsert(&wallet(1), "0xaa", "0.001").await.unwrap();
        assert!(matches!(outcome, UpsertOutcome::Written(_)));

        let record = ledger.find(&wallet(1)).await.unwrap().unwrap();
        assert_eq!(record.tx_hash, "0xaa");
        assert_eq!(record.payment_amount, "0.001");
        assert!(record.is_active);
        assert!(record.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_active_record_is_not_overwritten() {
        let ledger = InMemoryLedger::new();
        ledger.upsert(&wallet(1), "0xaa", "0.001").await.unwrap();

        let outcome = ledger.upsert(&wallet(1), "0xbb", "0.002").await.unwrap();
        assert!(matches!(outcome, UpsertOutcome::AlreadyActive(_)));
        assert_eq!(outcome.record().tx_hash, "0xaa");
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_record_updated_in_place() {
        let ledger = InMemoryLedger::new();
        let first = ledger.upsert(&wallet(1), "0xaa", "0.001").await.unwrap().into_record();
        ledger.deactivate(&wallet(1));

        let second = ledger.upsert(&wallet(1), "0xbb", "0.001").await.unwrap();
        assert!(matches!(second, UpsertOutcome::Written(_)));
        assert_eq!(second.record().id, first.id);
        assert_eq!(second.record().tx_hash, "0xbb");
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_tx_hash() {
        let ledger = InMemoryLedger::new();
        ledger.upsert(&wallet(1), "0xaa", "0.001").await.unwrap();
        ledger.upsert(&wallet(2), "0xbb", "0.001").await.unwrap();

        let record = ledger.find_by_tx_hash("0xbb").await.unwrap().unwrap();
        assert_eq!(record.wallet_address, wallet(2).as_str());
        assert!(ledger.find_by_tx_hash("0xcc").await.unwrap().is_none());
        assert_eq!(ledger.count_active().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failing_switch() {
        let ledger = InMemoryLedger::new();
        ledger.set_failing(true);
        assert!(matches!(
            ledger.upsert(&wallet(1), "0xaa", "0.001").await,
            Err(LedgerError::Unavailable(_))
        ));
        assert!(ledger.is_empty());

        ledger.set_failing(false);
        assert!(ledger.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_upserts_single_row() {
        let ledger = InMemoryLedger::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .upsert(&wallet(7), &format!("0x{:02x}", i), "0.001")
                    .await
                    .unwrap()
            }));
        }
        let mut written = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), UpsertOutcome::Written(_)) {
                written += 1;
            }
        }
        assert_eq!(written, 1);
        assert_eq!(ledger.len(), 1);
    }
}
