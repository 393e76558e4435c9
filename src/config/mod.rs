//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env (dotenvy) + config file (TOML)
//!     → loader.rs (parse, deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → handed to lifecycle::startup to build services
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the custody key never lives in it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BlockchainConfig, DatabaseConfig, GateConfig, ListenerConfig,
    ObservabilityConfig, PaymentConfig, ReconciliationConfig, TimeoutConfig,
};
