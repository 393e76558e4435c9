//! In-process scripted chain for tests and local runs without a node.
//!
//! Decodes submitted payloads, enforces strict nonce ordering the way a node
//! does, and mines on submit unless told otherwise.

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{keccak256, Address, TxHash, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::blockchain::rpc::{ChainRpc, NonceTag};
use crate::blockchain::types::{BlockchainError, BlockchainResult, TransactionReceipt};

#[derive(Debug)]
struct MockState {
    balance: U256,
    gas_price: u128,
    block_number: u64,
    /// Next nonce counting mined transactions only.
    latest_nonce: u64,
    /// Next nonce counting mempool transactions too.
    pending_nonce: u64,
    mempool: Vec<(TxHash, u64, Option<Address>)>,
    receipts: HashMap<TxHash, TransactionReceipt>,
    submissions: u64,
    auto_mine: bool,
    revert_next: bool,
    reject_next: Option<String>,
    offline: bool,
}

/// Scripted [`ChainRpc`] implementation.
#[derive(Debug)]
pub struct MockChain {
    custody: Address,
    chain_id: u64,
    state: Mutex<MockState>,
}

impl MockChain {
    /// A chain where `custody` holds `balance` wei and every submission is
    /// mined immediately.
    pub fn new(custody: Address, chain_id: u64, balance: U256) -> Self {
        Self {
            custody,
            chain_id,
            state: Mutex::new(MockState {
                balance,
                gas_price: 30_000_000_000,
                block_number: 100,
                latest_nonce: 0,
                pending_nonce: 0,
                mempool: Vec::new(),
                receipts: HashMap::new(),
                submissions: 0,
                auto_mine: true,
                revert_next: false,
                reject_next: None,
                offline: false,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_balance(&self, balance: U256) {
        self.state().balance = balance;
    }

    pub fn set_gas_price(&self, gas_price: u128) {
        self.state().gas_price = gas_price;
    }

    /// Leave submissions in the mempool until [`mine_pending`](Self::mine_pending).
    pub fn set_auto_mine(&self, auto_mine: bool) {
        self.state().auto_mine = auto_mine;
    }

    /// Make every call fail as if the node were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Refuse the next submission with `reason`.
    pub fn reject_next(&self, reason: &str) {
        self.state().reject_next = Some(reason.to_string());
    }

    /// Mine the next submission as reverted.
    pub fn revert_next(&self) {
        self.state().revert_next = true;
    }

    /// Number of `send_raw_transaction` calls received, accepted or not.
    pub fn submissions(&self) -> u64 {
        self.state().submissions
    }

    /// Number of mined transactions.
    pub fn mined(&self) -> usize {
        self.state().receipts.len()
    }

    /// Mine everything in the mempool into one new block.
    pub fn mine_pending(&self) {
        let mut state = self.state();
        state.block_number += 1;
        let block = state.block_number;
        let revert = std::mem::take(&mut state.revert_next);
        let mempool = std::mem::take(&mut state.mempool);
        for (tx_hash, _nonce, to) in mempool {
            state.latest_nonce += 1;
            state.receipts.insert(
                tx_hash,
                TransactionReceipt {
                    transaction_hash: tx_hash,
                    block_number: block,
                    gas_used: 21_000,
                    success: !revert,
                    from: self.custody,
                    to,
                },
            );
        }
    }

    /// Evict the mempool, as a node does with transactions it gives up on.
    pub fn drop_pending(&self) {
        let mut state = self.state();
        state.mempool.clear();
        state.pending_nonce = state.latest_nonce;
    }

    /// Consume `count` nonces with transactions this service did not send.
    pub fn advance_nonce(&self, count: u64) {
        let mut state = self.state();
        state.latest_nonce += count;
        state.pending_nonce = state.pending_nonce.max(state.latest_nonce);
        state.block_number += 1;
    }

    /// Append empty blocks.
    pub fn advance_blocks(&self, count: u64) {
        self.state().block_number += count;
    }

    fn check_online(state: &MockState) -> BlockchainResult<()> {
        if state.offline {
            return Err(BlockchainError::Rpc("All RPC providers failed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn chain_id(&self) -> BlockchainResult<u64> {
        Self::check_online(&self.state())?;
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        let state = self.state();
        Self::check_online(&state)?;
        Ok(state.block_number)
    }

    async fn balance(&self, _address: Address) -> BlockchainResult<U256> {
        let state = self.state();
        Self::check_online(&state)?;
        Ok(state.balance)
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        let state = self.state();
        Self::check_online(&state)?;
        Ok(state.gas_price)
    }

    async fn transaction_count(&self, _address: Address, tag: NonceTag) -> BlockchainResult<u64> {
        let state = self.state();
        Self::check_online(&state)?;
        Ok(match tag {
            NonceTag::Latest => state.latest_nonce,
            NonceTag::Pending => state.pending_nonce,
        })
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> BlockchainResult<TxHash> {
        let auto_mine = {
            let mut state = self.state();
            Self::check_online(&state)?;
            state.submissions += 1;

            if let Some(reason) = state.reject_next.take() {
                return Err(BlockchainError::Rejected(reason));
            }

            let envelope = TxEnvelope::decode_2718(&mut &raw[..])
                .map_err(|e| BlockchainError::Rejected(format!("invalid transaction: {}", e)))?;
            if envelope.chain_id() != Some(self.chain_id) {
                return Err(BlockchainError::Rejected("invalid chain id".to_string()));
            }
            let nonce = envelope.nonce();
            if nonce < state.pending_nonce {
                return Err(BlockchainError::Rejected("nonce too low".to_string()));
            }
            if nonce > state.pending_nonce {
                return Err(BlockchainError::Rejected("nonce too high".to_string()));
            }

            let tx_hash = keccak256(raw);
            state.pending_nonce += 1;
            state.balance = state.balance.saturating_sub(envelope.value());
            state.mempool.push((tx_hash, nonce, envelope.to()));
            state.auto_mine
        };

        if auto_mine {
            self.mine_pending();
        }
        Ok(keccak256(raw))
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> BlockchainResult<Option<TransactionReceipt>> {
        let state = self.state();
        Self::check_online(&state)?;
        Ok(state.receipts.get(&tx_hash).cloned())
    }
}
