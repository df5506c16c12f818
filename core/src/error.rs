//! Error types for the core crate
//!
//! This module provides a consolidated error type for the core crate.
//! The first six variants are the protocol taxonomy: each one tells the caller
//! whether the offending message must be dropped, rejected or never sent.

use thiserror::Error;
use std::io;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or truncated wire bytes, unknown tag in its context
    #[error("Parse error: {0}")]
    Parse(String),

    /// Reference to an undefined tag name or an invalid parent context
    #[error("Schema error: {0}")]
    Schema(String),

    /// Entry signature or field hash mismatch
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Cheque signed by someone other than the expected counter-party
    #[error("Policy error: {0}")]
    Policy(String),

    /// Query AST cannot be translated to a request
    #[error("Compile error: {0}")]
    Compile(String),

    /// Unexpected message shape or missing correlation id
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Key or signature primitive failure
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// A value cannot be represented in the requested logical type
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Hex decoding error
    #[error("Hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Result type for the core crate
pub type Result<T> = std::result::Result<T, CoreError>;

/// Convert an error to a Parse error
pub fn to_parse_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::Parse(err.to_string())
}

/// Convert an error to a Crypto error
pub fn to_crypto_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::Crypto(err.to_string())
}

/// Convert an error to a Compile error
pub fn to_compile_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::Compile(err.to_string())
}

/// Convert an error to an InvalidValue error
pub fn to_value_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::InvalidValue(err.to_string())
}

/// Convert an error to a Config error
pub fn to_config_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::Config(err.to_string())
}

impl CoreError {
    /// Whether the error means the data must not be used (integrity or policy failure)
    pub fn is_rejection(&self) -> bool {
        matches!(self, CoreError::Integrity(_) | CoreError::Policy(_))
    }
}
