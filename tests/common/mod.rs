//! Shared utilities for the HTTP integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use access_gate::blockchain::{CustodyWallet, MockChain};
use access_gate::config::GateConfig;
use access_gate::ledger::InMemoryLedger;
use access_gate::lifecycle::{assemble, Shutdown};
use access_gate::{AppState, HttpServer};
use alloy::primitives::U256;
use tokio::net::TcpListener;

/// Anvil's first dev account.
pub const CUSTODY_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const RECIPIENT: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
pub const ADMIN_KEY: &str = "test-admin-key";
pub const CHAIN_ID: u64 = 31337;

/// One ether, enough for a thousand payments of the default amount.
pub const CUSTODY_BALANCE: u128 = 1_000_000_000_000_000_000;

/// A gate running on an ephemeral port over a scripted chain and an
/// in-memory ledger.
pub struct TestGate {
    pub addr: SocketAddr,
    pub chain: Arc<MockChain>,
    pub ledger: Arc<InMemoryLedger>,
    pub state: AppState,
    shutdown: Shutdown,
}

impl TestGate {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestGate {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn test_config() -> GateConfig {
    let mut config = GateConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.blockchain.rpc_url = "http://127.0.0.1:8545".to_string();
    config.blockchain.chain_id = CHAIN_ID;
    config.blockchain.network_name = "Anvil".to_string();
    config.blockchain.currency_symbol = "ETH".to_string();
    config.blockchain.confirmation_timeout_secs = 1;
    config.blockchain.receipt_poll_interval_ms = 10;
    config.blockchain.rpc_timeout_secs = 1;
    config.timeouts.request_secs = 10;
    config.payment.recipient = RECIPIENT.to_string();
    config.payment.amount = "0.001".to_string();
    config.database.url = "postgres://unused@localhost/unused".to_string();
    config.reconciliation.interval_secs = 1;
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.to_string();
    config
}

pub async fn spawn_gate() -> TestGate {
    spawn_gate_with(test_config()).await
}

pub async fn spawn_gate_with(config: GateConfig) -> TestGate {
    let wallet = CustodyWallet::from_private_key(CUSTODY_KEY, CHAIN_ID).unwrap();
    let chain = Arc::new(MockChain::new(
        wallet.address(),
        CHAIN_ID,
        U256::from(CUSTODY_BALANCE),
    ));
    let ledger = Arc::new(InMemoryLedger::new());

    let state = assemble(&config, chain.clone(), wallet, ledger.clone()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, state.clone());
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestGate {
        addr,
        chain,
        ledger,
        state,
        shutdown,
    }
}

/// A distinct, valid wallet address per `n`.
pub fn wallet(n: u32) -> String {
    format!("0x{:040x}", 0xabc000 + n)
}
