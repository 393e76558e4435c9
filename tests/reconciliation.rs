//! Ambiguous payment outcomes and their settlement through the admin API
//! and the background reconciler.

use access_gate::config::validation::validate_config;
use access_gate::payments::{ReconcileOutcome, Reconciler};
use gate_sdk::GateClient;
use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

fn admin_client(gate: &common::TestGate) -> GateClient {
    GateClient::new(&gate.base_url()).with_api_key(common::ADMIN_KEY)
}

#[tokio::test]
async fn test_confirmation_timeout_then_reconcile() {
    let gate = common::spawn_gate().await;
    gate.chain.set_auto_mine(false);
    let client = admin_client(&gate);
    let wallet = common::wallet(1);

    let err = client.execute_payment(&wallet).await.unwrap_err();
    assert_eq!(err.error_code(), Some("confirmation_timeout"));
    assert!(!err.retry_safe());
    let tx_hash = match &err {
        gate_sdk::GateError::Api { status, body } => {
            assert_eq!(*status, StatusCode::GATEWAY_TIMEOUT);
            body.tx_hash.clone().unwrap()
        }
        other => panic!("unexpected error: {other}"),
    };

    // A retry must not broadcast a second transfer.
    let retry = client.execute_payment(&wallet).await.unwrap_err();
    assert_eq!(retry.error_code(), Some("payment_in_progress"));
    assert_eq!(gate.chain.submissions(), 1);

    let pending = client.admin_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["tx_hash"], tx_hash.as_str());

    let still = client.reconcile(&wallet, None).await.unwrap();
    assert_eq!(still.outcome, "still_pending");

    gate.chain.mine_pending();
    let settled = client.reconcile(&wallet, None).await.unwrap();
    assert_eq!(settled.outcome, "recorded");
    assert_eq!(settled.record.unwrap()["tx_hash"], tx_hash.as_str());

    assert!(client.verify_access(&wallet).await.unwrap().has_access);
    assert!(client.admin_pending().await.unwrap().is_empty());
    assert_eq!(gate.chain.submissions(), 1);
}

#[tokio::test]
async fn test_tightest_valid_deadline_still_reports_tx_hash() {
    let mut config = common::test_config();
    config.timeouts.request_secs = config.blockchain.confirmation_timeout_secs;
    assert!(validate_config(&config).is_err());

    // One second over the confirmation wait plus four one-second RPC calls.
    config.timeouts.request_secs = 6;
    validate_config(&config).unwrap();

    let gate = common::spawn_gate_with(config).await;
    gate.chain.set_auto_mine(false);

    let res = reqwest::Client::new()
        .post(gate.url("/execute-payment"))
        .json(&json!({ "wallet_address": common::wallet(1) }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error_code"], "confirmation_timeout");
    assert!(body["tx_hash"].as_str().unwrap().starts_with("0x"));
}

#[tokio::test]
async fn test_ledger_failure_after_confirmation_is_recoverable() {
    let gate = common::spawn_gate().await;
    let client = admin_client(&gate);
    let wallet = common::wallet(2);

    // Fail the ledger only once the transfer is on its way.
    gate.chain.set_auto_mine(false);
    let pay = client.execute_payment(&wallet);
    let outage = async {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        gate.ledger.set_failing(true);
        gate.chain.mine_pending();
    };
    let (result, _) = tokio::join!(pay, outage);

    let err = result.unwrap_err();
    assert_eq!(err.error_code(), Some("payment_not_recorded"));
    assert!(!err.retry_safe());
    assert_eq!(gate.chain.mined(), 1);

    gate.ledger.set_failing(false);
    let settled = client.reconcile(&wallet, None).await.unwrap();
    assert_eq!(settled.outcome, "recorded");
    assert!(client.verify_access(&wallet).await.unwrap().has_access);

    // Settling twice is harmless.
    let again = client.reconcile(&wallet, None).await.unwrap();
    assert_eq!(again.outcome, "already_active");
    assert_eq!(gate.chain.submissions(), 1);
}

#[tokio::test]
async fn test_dropped_transfer_frees_wallet_to_pay_again() {
    let gate = common::spawn_gate().await;
    gate.chain.set_auto_mine(false);
    let client = admin_client(&gate);
    let wallet = common::wallet(3);

    let err = client.execute_payment(&wallet).await.unwrap_err();
    assert_eq!(err.error_code(), Some("confirmation_timeout"));

    gate.chain.drop_pending();
    let dropped = client.reconcile(&wallet, None).await.unwrap();
    assert_eq!(dropped.outcome, "dropped");

    gate.chain.set_auto_mine(true);
    let receipt = client.execute_payment(&wallet).await.unwrap();
    assert!(receipt.success);
    assert_eq!(gate.chain.submissions(), 2);
    assert_eq!(gate.chain.mined(), 1);
}

#[tokio::test]
async fn test_reconcile_without_tracked_payment_is_not_found() {
    let gate = common::spawn_gate().await;
    let client = reqwest::Client::new();

    let res = client
        .post(gate.url("/admin/reconcile"))
        .bearer_auth(common::ADMIN_KEY)
        .json(&json!({ "wallet_address": common::wallet(4) }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error_code"], "nothing_to_reconcile");
}

#[tokio::test]
async fn test_reconcile_rejects_another_wallets_payment() {
    let gate = common::spawn_gate().await;
    let client = admin_client(&gate);
    let payer = common::wallet(5);
    let other = common::wallet(6);

    let receipt = client.execute_payment(&payer).await.unwrap();

    let err = client
        .reconcile(&other, Some(&receipt.tx_hash))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("reconciliation_mismatch"));
    assert!(!client.verify_access(&other).await.unwrap().has_access);
}

#[tokio::test]
async fn test_reconcile_rejects_malformed_tx_hash() {
    let gate = common::spawn_gate().await;
    let client = admin_client(&gate);

    let err = client
        .reconcile(&common::wallet(7), Some("0x1234"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("invalid_request"));
}

#[tokio::test]
async fn test_background_reconciler_settles_due_entries() {
    let gate = common::spawn_gate().await;
    gate.chain.set_auto_mine(false);
    let client = admin_client(&gate);
    let wallet = common::wallet(8);

    let err = client.execute_payment(&wallet).await.unwrap_err();
    assert_eq!(err.error_code(), Some("confirmation_timeout"));
    gate.chain.mine_pending();

    let processor = gate.state.processor.clone();
    let reconciler = Reconciler::new(processor.clone(), common::test_config().reconciliation);

    // The entry is not due until the grace period after the timeout passes.
    let entry = processor.pending().snapshot().remove(0);
    processor.pending().reschedule(&entry.wallet, std::time::Duration::ZERO);
    assert_eq!(reconciler.run_once().await, 1);

    assert!(processor.pending().is_empty());
    assert!(client.verify_access(&wallet).await.unwrap().has_access);

    let outcome = processor.reconcile(&entry.wallet, None).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::AlreadyActive { .. }));
}
