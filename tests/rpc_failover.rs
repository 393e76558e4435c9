//! Submission through the real RPC client when providers time out or refuse.
//!
//! Each node is a minimal JSON-RPC server on an ephemeral port that answers
//! the read calls the gate makes and scripts `eth_sendRawTransaction`.

use std::sync::Arc;
use std::time::Duration;

use access_gate::blockchain::{
    BlockchainClient, BlockchainConfig, BlockchainError, ChainRpc, CustodyWallet,
};
use access_gate::ledger::{InMemoryLedger, WalletAddress};
use access_gate::payments::{PaymentError, PaymentProcessor, PaymentSettings};
use alloy::primitives::keccak256;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

mod common;

const RAW: &[u8] = &[0xf8, 0x6b, 0x80, 0x84, 0x3b, 0x9a, 0xca, 0x00];

#[derive(Clone)]
enum SendReply {
    /// Never answers within the client timeout.
    Hang,
    /// Answers with a JSON-RPC error carrying this message.
    Refuse(&'static str),
}

async fn answer(request: Value, reply: SendReply) -> Json<Value> {
    let id = request["id"].clone();
    let result = match request["method"].as_str().unwrap_or_default() {
        "eth_chainId" => json!("0x7a69"),
        "eth_getBalance" => json!("0xde0b6b3a7640000"),
        "eth_gasPrice" => json!("0x3b9aca00"),
        "eth_getTransactionCount" => json!("0x0"),
        "eth_blockNumber" => json!("0x64"),
        "eth_sendRawTransaction" => match reply {
            SendReply::Hang => {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Value::Null
            }
            SendReply::Refuse(message) => {
                return Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32000, "message": message },
                }));
            }
        },
        _ => Value::Null,
    };
    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

async fn spawn_node(reply: SendReply) -> String {
    let app = Router::new().route(
        "/",
        post(move |Json(request): Json<Value>| answer(request, reply.clone())),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

async fn client(primary: SendReply, failover: Option<SendReply>) -> BlockchainClient {
    let rpc_url = spawn_node(primary).await;
    let mut failover_urls = Vec::new();
    if let Some(reply) = failover {
        failover_urls.push(spawn_node(reply).await);
    }
    BlockchainClient::new(BlockchainConfig {
        rpc_url,
        failover_urls,
        chain_id: common::CHAIN_ID,
        rpc_timeout_secs: 1,
        ..BlockchainConfig::default()
    })
    .await
    .unwrap()
}

fn processor(client: BlockchainClient) -> PaymentProcessor {
    let mut settings = PaymentSettings::from_config(&common::test_config()).unwrap();
    settings.confirmation_timeout = Duration::from_millis(300);
    let wallet = CustodyWallet::from_private_key(common::CUSTODY_KEY, common::CHAIN_ID).unwrap();
    PaymentProcessor::new(
        Arc::new(client),
        wallet,
        Arc::new(InMemoryLedger::new()),
        settings,
    )
}

#[tokio::test]
async fn test_refusal_on_first_contact_is_a_rejection() {
    let reply = SendReply::Refuse("insufficient funds for gas * price + value");
    let client = client(reply, None).await;

    let err = client.send_raw_transaction(RAW).await.unwrap_err();
    assert!(matches!(err, BlockchainError::Rejected(_)), "got {err:?}");
}

#[tokio::test]
async fn test_already_known_counts_as_accepted() {
    let client = client(SendReply::Refuse("already known"), None).await;

    let tx_hash = client.send_raw_transaction(RAW).await.unwrap();
    assert_eq!(tx_hash, keccak256(RAW));
}

#[tokio::test]
async fn test_refusal_after_primary_timeout_is_ambiguous() {
    let client = client(SendReply::Hang, Some(SendReply::Refuse("nonce too low"))).await;

    let err = client.send_raw_transaction(RAW).await.unwrap_err();
    assert!(matches!(err, BlockchainError::Rpc(_)), "got {err:?}");
}

#[tokio::test]
async fn test_failover_already_known_keeps_wallet_in_flight() {
    let client = client(SendReply::Hang, Some(SendReply::Refuse("already known"))).await;
    let processor = processor(client);
    let wallet = WalletAddress::parse(&common::wallet(1)).unwrap();

    let err = processor.execute(&wallet).await.unwrap_err();
    assert!(matches!(err, PaymentError::ConfirmationTimeout { .. }), "got {err:?}");
    assert_eq!(processor.pending().len(), 1);

    let err = processor.execute(&wallet).await.unwrap_err();
    assert!(matches!(err, PaymentError::PaymentInProgress { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_failover_nonce_too_low_does_not_free_wallet() {
    let client = client(SendReply::Hang, Some(SendReply::Refuse("nonce too low"))).await;
    let processor = processor(client);
    let wallet = WalletAddress::parse(&common::wallet(2)).unwrap();

    let err = processor.execute(&wallet).await.unwrap_err();
    assert!(matches!(err, PaymentError::NetworkUnavailable(_)), "got {err:?}");
    assert!(err.retry_safe());
    assert!(processor.pending().get(&wallet).is_some());

    let err = processor.execute(&wallet).await.unwrap_err();
    assert!(matches!(err, PaymentError::PaymentInProgress { .. }), "got {err:?}");
}
