//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_payments_total` (counter): payment attempts by outcome
//! - `gate_payment_confirmation_seconds` (histogram): submit → confirmed
//! - `gate_ledger_writes_total` (counter): upserts by result
//! - `gate_access_checks_total` (counter): verify-access by result
//! - `gate_pending_settlements` (gauge): paid but not yet recorded
//! - `gate_rpc_healthy` (gauge): 1=healthy, 0=unhealthy
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Label values are static strings to keep cardinality bounded

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Start the Prometheus scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn describe() {
    metrics::describe_counter!("gate_payments_total", "Payment attempts by outcome");
    metrics::describe_histogram!(
        "gate_payment_confirmation_seconds",
        metrics::Unit::Seconds,
        "Time from submission to confirmation"
    );
    metrics::describe_counter!("gate_ledger_writes_total", "Ledger upserts by result");
    metrics::describe_counter!("gate_access_checks_total", "Access checks by result");
    metrics::describe_gauge!("gate_pending_settlements", "Payments awaiting settlement");
    metrics::describe_gauge!("gate_rpc_healthy", "RPC reachability (1=healthy)");
}

pub fn record_payment(outcome: &'static str) {
    metrics::counter!("gate_payments_total", "outcome" => outcome).increment(1);
}

pub fn record_confirmation_time(elapsed: Duration) {
    metrics::histogram!("gate_payment_confirmation_seconds").record(elapsed.as_secs_f64());
}

pub fn record_ledger_write(result: &'static str) {
    metrics::counter!("gate_ledger_writes_total", "result" => result).increment(1);
}

pub fn record_access_check(result: &'static str) {
    metrics::counter!("gate_access_checks_total", "result" => result).increment(1);
}

pub fn set_pending_settlements(count: usize) {
    metrics::gauge!("gate_pending_settlements").set(count as f64);
}

pub fn record_rpc_health(healthy: bool) {
    metrics::gauge!("gate_rpc_healthy").set(if healthy { 1.0 } else { 0.0 });
}
