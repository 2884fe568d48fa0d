//! # Core Error Types
//!
//! Centralized error definitions shared by the oracle crates.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid RPC URL format: '{url}'")]
    InvalidRpcUrl { url: String },

    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

impl ConfigError {
    pub fn missing(field: &str) -> Self {
        ConfigError::MissingField {
            field: field.to_string(),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Wallet and key derivation errors
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    #[error("Invalid mnemonic: {reason}")]
    InvalidMnemonic { reason: String },

    #[error("Key derivation failed for path '{path}': {reason}")]
    DerivationFailed { path: String, reason: String },

    #[error("Cannot derive address with prefix '{prefix}': {reason}")]
    InvalidPrefix { prefix: String, reason: String },
}

/// Network and RPC-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("RPC request timeout after {timeout_ms}ms to {endpoint}")]
    Timeout { timeout_ms: u64, endpoint: String },

    #[error("Rate limited by {endpoint}")]
    RateLimited { endpoint: String },

    #[error("Connection to {endpoint} failed: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("HTTP error {status_code} from {endpoint}")]
    HttpError { status_code: u16, endpoint: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::missing("MNEMONIC").to_string(),
            "Missing required configuration field: 'MNEMONIC'"
        );
        assert_eq!(
            ConfigError::invalid("GAS_PRICE", "no denom").to_string(),
            "Invalid value for 'GAS_PRICE': no denom"
        );
    }

    #[test]
    fn test_network_error_messages() {
        let err = NetworkError::Timeout {
            timeout_ms: 1500,
            endpoint: "http://localhost:26657".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "RPC request timeout after 1500ms to http://localhost:26657"
        );
    }
}
