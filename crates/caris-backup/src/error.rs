//! Error types for CÁRIS backup operations

use std::{io, path::PathBuf};
use thiserror::Error;

/// Main error type for backup and recovery operations
#[derive(Error, Debug)]
pub enum BackupError {
    /// I/O error during backup operation
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Dump/restore tooling failed (non-zero exit, missing binary)
    #[error("Database tooling failed: {0}")]
    Database(String),

    /// Referenced backup id does not exist
    #[error("Backup not found: {0}")]
    NotFound(String),

    /// Recomputed checksum does not match the stored value
    #[error("Integrity failure: {0}")]
    Integrity(String),

    /// Configuration error
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Compression or decompression failure
    #[error("Compression failed: {0}")]
    Compression(String),

    /// Notification channel failure
    #[error("Notification failed: {0}")]
    Notification(String),

    /// Subprocess exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Invalid backup path
    #[error("Invalid backup path: {0}")]
    InvalidPath(PathBuf),

    /// Cryptographic failure
    #[error("Crypto error: {0}")]
    Crypto(#[from] caris_crypto::CryptoError),

    /// Serialization failure for metadata documents or payloads
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other backup error
    #[error("Backup error: {0}")]
    Other(String),
}

impl BackupError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new database tooling error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new integrity error
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    /// Create a new notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result type for backup operations
pub type BackupResult<T> = Result<T, BackupError>;
