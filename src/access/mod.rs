//! Read-only access checks over the ledger.

pub mod verifier;

pub use verifier::{AccessStatus, AccessVerifier};
