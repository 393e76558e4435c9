//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable {var} has invalid value '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Environment variable {0} not set")]
    MissingSecret(&'static str),

    #[error("Invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GateConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&content)?
        }
        None => GateConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay well-known environment variables onto a parsed config.
///
/// `lookup` is injected so tests do not touch the process environment.
pub fn apply_env_overrides<F>(config: &mut GateConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("RPC_URL") {
        config.blockchain.rpc_url = v;
    }
    if let Some(v) = lookup("CHAIN_ID") {
        config.blockchain.chain_id = v.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            var: "CHAIN_ID",
            value: v.clone(),
        })?;
    }
    if let Some(v) = lookup("RECIPIENT_WALLET") {
        config.payment.recipient = v;
    }
    if let Some(v) = lookup("PAYMENT_AMOUNT") {
        config.payment.amount = v;
    }
    if let Some(v) = lookup("DATABASE_URL") {
        config.database.url = v;
    }
    if let Some(v) = lookup("GATE_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("GATE_ADMIN_API_KEY") {
        config.admin.api_key = v;
    }
    Ok(())
}
