//! Error types for CÁRIS
//!
//! This module defines the cross-cutting error taxonomy used throughout the
//! backup subsystem. The audience of these errors is operators, so messages
//! carry the raw underlying error text rather than a sanitized summary.

use std::io;
use thiserror::Error;

/// CÁRIS error types
#[derive(Debug, Error)]
pub enum CarisError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Referenced backup or resource does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Checksum mismatch detected during verification
    #[error("Integrity failure: {0}")]
    Integrity(String),

    /// External dump/restore tooling failed
    #[error("Tooling failure: {0}")]
    Tooling(String),

    /// Encryption or decryption failure
    #[error("Cryptographic failure: {0}")]
    Crypto(String),

    /// Filesystem failure (missing directory, permission denied, ...)
    #[error("Filesystem failure: {0}")]
    Filesystem(String),

    /// Authorization error
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for CÁRIS operations
pub type Result<T> = std::result::Result<T, CarisError>;

impl From<serde_json::Error> for CarisError {
    fn from(err: serde_json::Error) -> Self {
        CarisError::Serialization(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for CarisError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        CarisError::Timeout(err.to_string())
    }
}

impl CarisError {
    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new integrity error
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }
}
