//! Resilience helpers.
//!
//! # Design Decisions
//! - Retries are scheduled, never immediate: exponential delay with jitter
//! - Nothing here resubmits a payment; only reads and ledger writes are retried

pub mod backoff;

pub use backoff::Backoff;
