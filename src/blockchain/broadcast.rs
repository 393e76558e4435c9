//! Submission and confirmation monitoring.
//!
//! # Responsibilities
//! - Submit signed payloads exactly once
//! - Poll for the receipt until confirmed, reverted, or the timeout elapses
//!
//! # Design Decisions
//! - No resubmission here; a rejected nonce is reported, not retried
//! - A timeout is an ambiguous outcome, kept distinct from failure

use alloy::primitives::TxHash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::blockchain::rpc::ChainRpc;
use crate::blockchain::types::{
    BlockchainError, BlockchainResult, ConfirmationStatus, SignedPayment, TransactionReceipt,
};

/// Submits transfers and waits for them to land.
pub struct Broadcaster {
    client: Arc<dyn ChainRpc>,
    confirmation_timeout: Duration,
    poll_interval: Duration,
    confirmation_blocks: u32,
}

impl Broadcaster {
    pub fn new(
        client: Arc<dyn ChainRpc>,
        confirmation_timeout: Duration,
        poll_interval: Duration,
        confirmation_blocks: u32,
    ) -> Self {
        Self {
            client,
            confirmation_timeout,
            poll_interval,
            confirmation_blocks: confirmation_blocks.max(1),
        }
    }

    /// Submit a signed payload.
    pub async fn submit(&self, signed: &SignedPayment) -> BlockchainResult<TxHash> {
        let accepted = self.client.send_raw_transaction(&signed.raw).await?;
        if accepted != signed.tx_hash {
            tracing::warn!(
                expected = %signed.tx_hash,
                accepted = %accepted,
                "Node reported a different transaction hash"
            );
        }
        tracing::info!(tx_hash = %signed.tx_hash, nonce = signed.nonce, "Transaction submitted");
        Ok(signed.tx_hash)
    }

    /// One-shot confirmation check.
    pub async fn check(&self, tx_hash: TxHash) -> BlockchainResult<ConfirmationStatus> {
        let receipt = match self.client.transaction_receipt(tx_hash).await? {
            Some(r) => r,
            None => return Ok(ConfirmationStatus::Pending),
        };

        if !receipt.success {
            return Ok(ConfirmationStatus::Failed(receipt));
        }

        if self.confirmation_blocks == 1 {
            return Ok(ConfirmationStatus::Confirmed(receipt));
        }

        let current_block = self.client.block_number().await?;
        let confirmations = current_block.saturating_sub(receipt.block_number) as u32 + 1;
        if confirmations >= self.confirmation_blocks {
            Ok(ConfirmationStatus::Confirmed(receipt))
        } else {
            Ok(ConfirmationStatus::Confirming {
                current: confirmations,
                required: self.confirmation_blocks,
            })
        }
    }

    /// Wait for a transaction to be confirmed.
    ///
    /// Transient RPC errors while polling are logged and polling continues;
    /// only the timeout bounds the wait.
    pub async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
    ) -> BlockchainResult<TransactionReceipt> {
        let started = Instant::now();

        let result = timeout(self.confirmation_timeout, async {
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match self.check(tx_hash).await {
                    Ok(ConfirmationStatus::Confirmed(receipt)) => return Ok(receipt),
                    Ok(ConfirmationStatus::Failed(_)) => {
                        return Err(BlockchainError::Reverted(tx_hash));
                    }
                    Ok(ConfirmationStatus::Pending) => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                    }
                    Ok(ConfirmationStatus::Confirming { current, required }) => {
                        tracing::debug!(
                            tx_hash = %tx_hash,
                            confirmations = current,
                            required = required,
                            "Waiting for confirmations"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(tx_hash = %tx_hash, error = %e, "Receipt poll failed");
                    }
                }
            }
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(BlockchainError::ConfirmationTimeout {
                tx_hash,
                waited_secs: started.elapsed().as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::mock::MockChain;
    use crate::blockchain::types::PaymentTransaction;
    use crate::blockchain::wallet::CustodyWallet;
    use alloy::primitives::U256;

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn setup(blocks: u32) -> (Arc<MockChain>, Broadcaster, CustodyWallet) {
        let wallet = CustodyWallet::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        let chain = Arc::new(MockChain::new(
            wallet.address(),
            31337,
            U256::from(10u64).pow(U256::from(18)),
        ));
        let broadcaster = Broadcaster::new(
            chain.clone(),
            Duration::from_millis(200),
            Duration::from_millis(10),
            blocks,
        );
        (chain, broadcaster, wallet)
    }

    fn signed(wallet: &CustodyWallet, nonce: u64) -> SignedPayment {
        wallet
            .sign_transfer(&PaymentTransaction {
                recipient: "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".parse().unwrap(),
                value: U256::from(1000),
                gas_limit: 21_000,
                gas_price: 1,
                nonce,
                chain_id: 31337,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_confirms_mined_transaction() {
        let (_chain, broadcaster, wallet) = setup(1);
        let payment = signed(&wallet, 0);
        let tx_hash = broadcaster.submit(&payment).await.unwrap();
        let receipt = broadcaster.wait_for_confirmation(tx_hash).await.unwrap();
        assert_eq!(receipt.transaction_hash, payment.tx_hash);
        assert!(receipt.success);
    }

    #[tokio::test]
    async fn test_rejected_nonce_is_reported() {
        let (_chain, broadcaster, wallet) = setup(1);
        broadcaster.submit(&signed(&wallet, 0)).await.unwrap();
        let err = broadcaster.submit(&signed(&wallet, 0)).await.unwrap_err();
        assert!(matches!(err, BlockchainError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_ambiguous() {
        let (chain, broadcaster, wallet) = setup(1);
        chain.set_auto_mine(false);
        let tx_hash = broadcaster.submit(&signed(&wallet, 0)).await.unwrap();

        let err = broadcaster.wait_for_confirmation(tx_hash).await.unwrap_err();
        assert!(matches!(err, BlockchainError::ConfirmationTimeout { .. }));

        chain.mine_pending();
        assert!(matches!(
            broadcaster.check(tx_hash).await.unwrap(),
            ConfirmationStatus::Confirmed(_)
        ));
    }

    #[tokio::test]
    async fn test_revert_detected() {
        let (chain, broadcaster, wallet) = setup(1);
        chain.revert_next();
        let tx_hash = broadcaster.submit(&signed(&wallet, 0)).await.unwrap();
        let err = broadcaster.wait_for_confirmation(tx_hash).await.unwrap_err();
        assert!(matches!(err, BlockchainError::Reverted(h) if h == tx_hash));
    }

    #[tokio::test]
    async fn test_confirmation_depth() {
        let (chain, broadcaster, wallet) = setup(3);
        let tx_hash = broadcaster.submit(&signed(&wallet, 0)).await.unwrap();
        assert_eq!(
            broadcaster.check(tx_hash).await.unwrap(),
            ConfirmationStatus::Confirming { current: 1, required: 3 }
        );
        chain.advance_blocks(2);
        assert!(matches!(
            broadcaster.check(tx_hash).await.unwrap(),
            ConfirmationStatus::Confirmed(_)
        ));
    }
}
