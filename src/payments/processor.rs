//! The payment pipeline: build → sign → broadcast → confirm → record.
//!
//! # Invariants
//! - One custody account, one nonce sequence: building, signing, and
//!   submitting run under a single lock, released before confirmation
//! - A wallet with an active record or an in-flight settlement is never
//!   charged again
//! - Reconciliation never broadcasts

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, TxHash, U256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::blockchain::{
    BlockchainError, Broadcaster, ChainRpc, ConfirmationStatus, CustodyWallet, NonceTag,
    SignedPayment, TransactionBuilder, TransferTerms,
};
use crate::config::{ConfigError, GateConfig};
use crate::ledger::{SubscriptionLedger, SubscriptionRecord, UpsertOutcome, WalletAddress};
use crate::observability::metrics;
use crate::payments::error::PaymentError;
use crate::payments::pending::{PendingSettlements, SettlementStage};
use crate::payments::types::{tx_hash_hex, PaymentOutcome, ReconcileOutcome};

/// Fixed payment terms and timing, resolved from config once at startup.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub recipient: Address,
    pub amount_wei: U256,
    /// Amount as configured, stored verbatim in the ledger.
    pub amount_display: String,
    pub chain_id: u64,
    pub gas_limit: u64,
    pub max_gas_price_gwei: u64,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    pub confirmation_blocks: u32,
    /// Delay before the reconciler looks at an entry the request is still
    /// waiting on.
    pub reconcile_grace: Duration,
}

impl PaymentSettings {
    pub fn from_config(config: &GateConfig) -> Result<Self, ConfigError> {
        let recipient: Address =
            config
                .payment
                .recipient
                .trim()
                .parse()
                .map_err(|e| ConfigError::Invalid {
                    field: "payment.recipient",
                    message: format!("{}", e),
                })?;
        let amount_display = config.payment.amount.trim().to_string();
        let amount_wei = parse_ether(&amount_display).map_err(|e| ConfigError::Invalid {
            field: "payment.amount",
            message: e.to_string(),
        })?;
        let confirmation_timeout = Duration::from_secs(config.blockchain.confirmation_timeout_secs);

        Ok(Self {
            recipient,
            amount_wei,
            amount_display,
            chain_id: config.blockchain.chain_id,
            gas_limit: config.blockchain.gas_limit,
            max_gas_price_gwei: config.blockchain.max_gas_price_gwei,
            confirmation_timeout,
            poll_interval: Duration::from_millis(config.blockchain.receipt_poll_interval_ms),
            confirmation_blocks: config.blockchain.confirmation_blocks,
            reconcile_grace: confirmation_timeout
                + Duration::from_secs(config.reconciliation.interval_secs),
        })
    }
}

/// Owns the custody wallet and drives every payment it makes.
pub struct PaymentProcessor {
    chain: Arc<dyn ChainRpc>,
    wallet: CustodyWallet,
    ledger: Arc<dyn SubscriptionLedger>,
    builder: TransactionBuilder,
    broadcaster: Broadcaster,
    pending: PendingSettlements,
    settings: PaymentSettings,
    /// Lowest nonce not yet handed out by this process. Also the lock that
    /// serializes nonce use.
    nonce_floor: Mutex<Option<u64>>,
}

impl PaymentProcessor {
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        wallet: CustodyWallet,
        ledger: Arc<dyn SubscriptionLedger>,
        settings: PaymentSettings,
    ) -> Self {
        let terms = TransferTerms {
            custody: wallet.address(),
            recipient: settings.recipient,
            amount: settings.amount_wei,
            gas_limit: settings.gas_limit,
            chain_id: settings.chain_id,
            max_gas_price_gwei: settings.max_gas_price_gwei,
        };
        let builder = TransactionBuilder::new(chain.clone(), terms);
        let broadcaster = Broadcaster::new(
            chain.clone(),
            settings.confirmation_timeout,
            settings.poll_interval,
            settings.confirmation_blocks,
        );

        Self {
            chain,
            wallet,
            ledger,
            builder,
            broadcaster,
            pending: PendingSettlements::new(),
            settings,
            nonce_floor: Mutex::new(None),
        }
    }

    pub fn custody_address(&self) -> Address {
        self.wallet.address()
    }

    pub fn settings(&self) -> &PaymentSettings {
        &self.settings
    }

    pub fn pending(&self) -> &PendingSettlements {
        &self.pending
    }

    /// Pay for `wallet` and grant access, unless it already has access.
    pub async fn execute(&self, wallet: &WalletAddress) -> Result<PaymentOutcome, PaymentError> {
        let result = self.execute_inner(wallet).await;
        match &result {
            Ok(PaymentOutcome::Granted(_)) => metrics::record_payment("granted"),
            Ok(PaymentOutcome::AlreadyActive(_)) => metrics::record_payment("already_active"),
            Err(e) => metrics::record_payment(e.code()),
        }
        result
    }

    async fn execute_inner(&self, wallet: &WalletAddress) -> Result<PaymentOutcome, PaymentError> {
        if let Some(record) = self.active_record(wallet).await? {
            tracing::info!(wallet = %wallet, "Wallet already has active subscription");
            return Ok(PaymentOutcome::AlreadyActive(record));
        }
        self.ensure_not_in_flight(wallet)?;

        let signed = match self.submit(wallet).await? {
            Submission::Sent(signed) => signed,
            Submission::AlreadyActive(record) => return Ok(PaymentOutcome::AlreadyActive(record)),
        };

        let started = Instant::now();
        let receipt = match self.broadcaster.wait_for_confirmation(signed.tx_hash).await {
            Ok(receipt) => receipt,
            Err(BlockchainError::Reverted(tx_hash)) => {
                tracing::warn!(wallet = %wallet, tx_hash = %tx_hash, "Transaction reverted");
                self.pending.remove_if_tx(wallet, &tx_hash);
                return Err(PaymentError::TransactionReverted(tx_hash));
            }
            Err(e) => {
                tracing::warn!(
                    wallet = %wallet,
                    tx_hash = %signed.tx_hash,
                    error = %e,
                    "Confirmation not observed; left for reconciliation"
                );
                return Err(e.into());
            }
        };
        metrics::record_confirmation_time(started.elapsed());
        tracing::info!(
            wallet = %wallet,
            tx_hash = %receipt.transaction_hash,
            block = receipt.block_number,
            gas_used = receipt.gas_used,
            "Payment confirmed"
        );

        self.pending.set_stage(wallet, SettlementStage::AwaitingLedgerWrite);
        match self.record(wallet, signed.tx_hash).await? {
            UpsertOutcome::Written(record) => Ok(PaymentOutcome::Granted(record)),
            UpsertOutcome::AlreadyActive(record) => {
                if record.tx_hash != tx_hash_hex(&signed.tx_hash) {
                    tracing::warn!(
                        wallet = %wallet,
                        tx_hash = %signed.tx_hash,
                        recorded = %record.tx_hash,
                        "Wallet was activated by another transfer while this one settled"
                    );
                }
                Ok(PaymentOutcome::AlreadyActive(record))
            }
        }
    }

    /// The nonce critical section. Returns once the node has accepted (or
    /// refused) the transfer.
    async fn submit(&self, wallet: &WalletAddress) -> Result<Submission, PaymentError> {
        let mut floor = self.nonce_floor.lock().await;

        // A request for the same wallet may have completed while we waited.
        if let Some(record) = self.active_record(wallet).await? {
            return Ok(Submission::AlreadyActive(record));
        }
        self.ensure_not_in_flight(wallet)?;

        let tx = self.builder.build(*floor).await.map_err(|e| {
            tracing::warn!(wallet = %wallet, error = %e, "Could not build transfer");
            PaymentError::from(e)
        })?;
        let signed = self.wallet.sign_transfer(&tx)?;

        // Registered before submission: once the node may hold the payload,
        // the wallet must not be charged again.
        self.pending
            .register(wallet, signed.tx_hash, signed.nonce, self.settings.reconcile_grace);

        match self.broadcaster.submit(&signed).await {
            Ok(_) => {
                *floor = Some(signed.nonce + 1);
                Ok(Submission::Sent(signed))
            }
            Err(BlockchainError::Rejected(reason)) => {
                *floor = None;
                self.pending.remove_if_tx(wallet, &signed.tx_hash);
                tracing::warn!(
                    wallet = %wallet,
                    nonce = signed.nonce,
                    reason = %reason,
                    "Transfer rejected by the network"
                );
                Err(PaymentError::BroadcastRejected(reason))
            }
            Err(e) => {
                // The node may or may not have the payload; keep the entry so
                // the reconciler decides.
                *floor = None;
                self.pending.mark_due(wallet);
                tracing::error!(
                    wallet = %wallet,
                    tx_hash = %signed.tx_hash,
                    nonce = signed.nonce,
                    error = %e,
                    "Submission outcome unknown"
                );
                Err(e.into())
            }
        }
    }

    async fn record(
        &self,
        wallet: &WalletAddress,
        tx_hash: TxHash,
    ) -> Result<UpsertOutcome, PaymentError> {
        match self
            .ledger
            .upsert(wallet, &tx_hash_hex(&tx_hash), &self.settings.amount_display)
            .await
        {
            Ok(outcome) => {
                metrics::record_ledger_write("ok");
                self.pending.remove_if_tx(wallet, &tx_hash);
                tracing::info!(wallet = %wallet, tx_hash = %tx_hash, "Subscription recorded");
                Ok(outcome)
            }
            Err(e) => {
                metrics::record_ledger_write("error");
                self.pending.mark_due(wallet);
                tracing::error!(
                    wallet = %wallet,
                    tx_hash = %tx_hash,
                    error = %e,
                    "Payment confirmed but ledger write failed"
                );
                Err(PaymentError::PaymentNotRecorded {
                    tx_hash,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Bring the ledger in line with an earlier transfer for `wallet`.
    ///
    /// Uses the tracked in-flight entry, or `tx_hash` when given (e.g. after a
    /// restart lost the in-memory entry). Never submits a transaction.
    pub async fn reconcile(
        &self,
        wallet: &WalletAddress,
        tx_hash: Option<TxHash>,
    ) -> Result<ReconcileOutcome, PaymentError> {
        if let Some(record) = self.active_record(wallet).await? {
            if let Some(entry) = self.pending.get(wallet) {
                self.pending.remove_if_tx(wallet, &entry.tx_hash);
            }
            return Ok(ReconcileOutcome::AlreadyActive { record });
        }

        let entry = self.pending.get(wallet);
        let (tx_hash, nonce) = match (tx_hash, &entry) {
            (Some(hash), Some(e)) if e.tx_hash == hash => (hash, Some(e.nonce)),
            (Some(hash), _) => {
                if let Some(other) = self.pending.find_by_tx(&hash) {
                    return Err(PaymentError::ReconciliationMismatch {
                        tx_hash: hash,
                        reason: format!("transaction is in flight for wallet {}", other.wallet),
                    });
                }
                (hash, None)
            }
            (None, Some(e)) => (e.tx_hash, Some(e.nonce)),
            (None, None) => return Err(PaymentError::NothingToReconcile(wallet.to_string())),
        };

        match self.broadcaster.check(tx_hash).await? {
            ConfirmationStatus::Pending => {
                if let Some(nonce) = nonce {
                    if self.is_dropped(nonce).await? {
                        self.pending.remove_if_tx(wallet, &tx_hash);
                        *self.nonce_floor.lock().await = None;
                        tracing::warn!(wallet = %wallet, tx_hash = %tx_hash, nonce, "Transfer dropped");
                        return Ok(ReconcileOutcome::Dropped { tx_hash });
                    }
                }
                Ok(ReconcileOutcome::StillPending { tx_hash })
            }
            ConfirmationStatus::Confirming { .. } => Ok(ReconcileOutcome::StillPending { tx_hash }),
            ConfirmationStatus::Failed(_) => {
                self.pending.remove_if_tx(wallet, &tx_hash);
                tracing::warn!(wallet = %wallet, tx_hash = %tx_hash, "Reconciled transfer reverted");
                Ok(ReconcileOutcome::Reverted { tx_hash })
            }
            ConfirmationStatus::Confirmed(receipt) => {
                if receipt.from != self.wallet.address() {
                    return Err(PaymentError::ReconciliationMismatch {
                        tx_hash,
                        reason: format!("sent by {}, not the custody account", receipt.from),
                    });
                }
                if receipt.to != Some(self.settings.recipient) {
                    return Err(PaymentError::ReconciliationMismatch {
                        tx_hash,
                        reason: "not sent to the configured recipient".to_string(),
                    });
                }
                if let Some(existing) = self.ledger.find_by_tx_hash(&tx_hash_hex(&tx_hash)).await? {
                    if existing.wallet_address != wallet.as_str() {
                        return Err(PaymentError::ReconciliationMismatch {
                            tx_hash,
                            reason: format!(
                                "already recorded for wallet {}",
                                existing.wallet_address
                            ),
                        });
                    }
                }

                self.pending.set_stage(wallet, SettlementStage::AwaitingLedgerWrite);
                let record = self.record(wallet, tx_hash).await?.into_record();
                tracing::info!(wallet = %wallet, tx_hash = %tx_hash, "Settlement reconciled");
                Ok(ReconcileOutcome::Recorded { record })
            }
        }
    }

    /// A transfer with no receipt will never land once the account's mined
    /// nonce has passed it, or the node holds nothing at that nonce.
    async fn is_dropped(&self, nonce: u64) -> Result<bool, PaymentError> {
        let custody = self.wallet.address();
        let latest = self.chain.transaction_count(custody, NonceTag::Latest).await?;
        if latest > nonce {
            return Ok(true);
        }
        let pending = self.chain.transaction_count(custody, NonceTag::Pending).await?;
        Ok(pending <= nonce)
    }

    async fn active_record(
        &self,
        wallet: &WalletAddress,
    ) -> Result<Option<SubscriptionRecord>, PaymentError> {
        Ok(self.ledger.find(wallet).await?.filter(|r| r.is_active))
    }

    fn ensure_not_in_flight(&self, wallet: &WalletAddress) -> Result<(), PaymentError> {
        match self.pending.get(wallet) {
            Some(entry) => Err(PaymentError::PaymentInProgress {
                tx_hash: entry.tx_hash,
            }),
            None => Ok(()),
        }
    }
}

enum Submission {
    Sent(SignedPayment),
    AlreadyActive(SubscriptionRecord),
}
