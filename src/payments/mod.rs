//! Payment execution subsystem.
//!
//! # Data Flow
//! ```text
//! POST /execute-payment
//!     → processor.rs (ledger check, nonce lock: build → sign → register → submit)
//!     → pending.rs (in-flight settlement, keyed by wallet)
//!     → blockchain::Broadcaster (wait for confirmation, lock released)
//!     → ledger::SubscriptionLedger::upsert
//!
//! Ambiguous outcomes (timeout, ledger failure, unknown submission)
//!     → pending.rs (entry kept)
//!     → reconciler.rs (periodic, backoff) or POST /admin/reconcile
//!     → processor.rs reconcile (receipt check → upsert, never broadcasts)
//! ```

pub mod error;
pub mod pending;
pub mod processor;
pub mod reconciler;
pub mod types;

pub use error::PaymentError;
pub use pending::{PendingSettlement, PendingSettlements, SettlementStage};
pub use processor::{PaymentProcessor, PaymentSettings};
pub use reconciler::Reconciler;
pub use types::{tx_hash_hex, PaymentOutcome, ReconcileOutcome};
