//! Error types for conversation backups

use caris_common::CarisError;
use thiserror::Error;

/// Error type for conversation backup operations
#[derive(Debug, Error)]
pub enum ConversationError {
    /// Requester is not allowed to act on this room or backup
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Unknown room, backup or user
    #[error("Not found: {0}")]
    NotFound(String),

    /// Snapshot could not be encrypted or decrypted
    #[error(transparent)]
    Crypto(#[from] caris_crypto::CryptoError),

    /// Snapshot could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying storage failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ConversationError {
    /// Authorization failure
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Missing room, backup or user
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Storage-layer failure
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Result type for conversation backup operations
pub type ConversationResult<T> = std::result::Result<T, ConversationError>;

impl From<ConversationError> for CarisError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::Unauthorized(msg) => CarisError::Authorization(msg),
            ConversationError::NotFound(msg) => CarisError::NotFound(msg),
            ConversationError::Crypto(e) => e.into(),
            ConversationError::Serialization(e) => CarisError::Serialization(e.to_string()),
            ConversationError::Storage(msg) => CarisError::Internal(msg),
        }
    }
}
