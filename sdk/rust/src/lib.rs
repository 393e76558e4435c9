//! Client for the access gate HTTP API.

pub mod client;

pub use client::{
    AccessStatus, ApiError, GateClient, GateError, HealthStatus, PaymentReceipt, ReconcileResult,
};
