//! Health reporting for `GET /`.
//!
//! # Data Flow
//! ```text
//! GET /
//!     → probe.rs (custody balance, chain reachability, ledger ping)
//!     → HealthReport (always 200; failures become an `error` field)
//! ```

pub mod probe;

pub use probe::{HealthProbe, HealthReport};
