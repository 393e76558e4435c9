//! Payment-gated access service library

pub mod access;
pub mod admin;
pub mod blockchain;
pub mod config;
pub mod health;
pub mod http;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod payments;
pub mod resilience;

pub use config::schema::GateConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
pub use payments::{PaymentProcessor, Reconciler};
