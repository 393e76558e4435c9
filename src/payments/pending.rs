//! In-flight settlements: transfers submitted but not yet recorded.

use alloy::primitives::TxHash;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ledger::WalletAddress;
use crate::observability::metrics;

/// How far a settlement got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStage {
    AwaitingConfirmation,
    AwaitingLedgerWrite,
}

/// A transfer this process submitted for `wallet`.
#[derive(Debug, Clone, Serialize)]
pub struct PendingSettlement {
    pub wallet: WalletAddress,
    pub tx_hash: TxHash,
    pub nonce: u64,
    pub stage: SettlementStage,
    pub submitted_at: DateTime<Utc>,
    pub attempts: u32,
    #[serde(skip)]
    pub next_attempt_at: Instant,
}

/// Thread-safe wallet → settlement map, at most one entry per wallet.
///
/// Process-local; lost on restart.
#[derive(Clone, Default)]
pub struct PendingSettlements {
    inner: Arc<DashMap<WalletAddress, PendingSettlement>>,
}

impl PendingSettlements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a signed transfer before it is submitted. The entry becomes due
    /// for reconciliation after `grace`.
    pub fn register(&self, wallet: &WalletAddress, tx_hash: TxHash, nonce: u64, grace: Duration) {
        self.inner.insert(
            wallet.clone(),
            PendingSettlement {
                wallet: wallet.clone(),
                tx_hash,
                nonce,
                stage: SettlementStage::AwaitingConfirmation,
                submitted_at: Utc::now(),
                attempts: 0,
                next_attempt_at: Instant::now() + grace,
            },
        );
        metrics::set_pending_settlements(self.inner.len());
    }

    pub fn get(&self, wallet: &WalletAddress) -> Option<PendingSettlement> {
        self.inner.get(wallet).map(|r| r.value().clone())
    }

    /// The entry, under any wallet, that tracks `tx_hash`.
    pub fn find_by_tx(&self, tx_hash: &TxHash) -> Option<PendingSettlement> {
        self.inner
            .iter()
            .find(|r| r.value().tx_hash == *tx_hash)
            .map(|r| r.value().clone())
    }

    pub fn set_stage(&self, wallet: &WalletAddress, stage: SettlementStage) {
        if let Some(mut entry) = self.inner.get_mut(wallet) {
            entry.stage = stage;
        }
    }

    /// Make the entry due immediately.
    pub fn mark_due(&self, wallet: &WalletAddress) {
        if let Some(mut entry) = self.inner.get_mut(wallet) {
            entry.next_attempt_at = Instant::now();
        }
    }

    /// Push the next attempt back by `delay` and count the attempt.
    pub fn reschedule(&self, wallet: &WalletAddress, delay: Duration) {
        if let Some(mut entry) = self.inner.get_mut(wallet) {
            entry.attempts = entry.attempts.saturating_add(1);
            entry.next_attempt_at = Instant::now() + delay;
        }
    }

    /// Remove the entry for `wallet` only if it still tracks `tx_hash`.
    pub fn remove_if_tx(&self, wallet: &WalletAddress, tx_hash: &TxHash) -> bool {
        let removed = self
            .inner
            .remove_if(wallet, |_, entry| entry.tx_hash == *tx_hash)
            .is_some();
        metrics::set_pending_settlements(self.inner.len());
        removed
    }

    /// Entries whose next attempt is at or before `now`.
    pub fn due(&self, now: Instant) -> Vec<PendingSettlement> {
        self.inner
            .iter()
            .filter(|r| r.value().next_attempt_at <= now)
            .map(|r| r.value().clone())
            .collect()
    }

    /// All entries, oldest first.
    pub fn snapshot(&self) -> Vec<PendingSettlement> {
        let mut entries: Vec<_> = self.inner.iter().map(|r| r.value().clone()).collect();
        entries.sort_by_key(|e| e.submitted_at);
        entries
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
