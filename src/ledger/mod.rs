//! Access ledger subsystem.
//!
//! # Data Flow
//! ```text
//! PaymentProcessor (confirmed receipt)
//!     → store.rs (SubscriptionLedger::upsert, atomic insert-or-return-existing)
//!     → postgres.rs (sqlx transaction on wallet_subscriptions)
//!
//! AccessVerifier
//!     → store.rs (SubscriptionLedger::find, fresh read every call)
//! ```
//!
//! # Invariants
//! - One row per wallet, enforced by the `wallet_address` unique constraint
//! - An active row is never overwritten
//! - A row is visible only after its transaction committed

pub mod memory;
pub mod postgres;
pub mod store;
pub mod types;

pub use memory::InMemoryLedger;
pub use postgres::PgLedger;
pub use store::SubscriptionLedger;
pub use types::{
    InvalidWalletAddress, LedgerError, LedgerResult, SubscriptionRecord, UpsertOutcome,
    WalletAddress,
};
