//! Crypto primitives for CÁRIS backups
//!
//! Provides the symmetric building blocks the backup pipelines rely on:
//! - 256-bit symmetric key generation, export and import
//! - Authenticated-by-checksum envelope encryption of backup artifacts
//!   (16-byte random IV prepended to an AES-256-CBC ciphertext stream)
//! - scrypt key derivation from a configured operator secret
//! - SHA-256 content hashing of buffers and files
//!
//! The IV is always carried inside the ciphertext blob itself, so an
//! encrypted artifact is self-describing and needs no separate IV store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod hashing;
pub mod keys;

pub use envelope::{decrypt, decrypt_file, encrypt, encrypt_file, IV_LEN};
pub use hashing::{checksum_file, sha256_hex};
pub use keys::{derive_key, SymmetricKey, KEY_LEN};

use caris_common::CarisError;
use thiserror::Error;

/// Error type for cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Decryption failed (wrong key, truncated blob or corrupt padding)
    #[error("Decryption failed: {0}")]
    Decrypt(String),

    /// Key material could not be parsed
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// Key derivation failed
    #[error("Key derivation failed: {0}")]
    Derivation(String),

    /// I/O error while reading or writing an artifact
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;

impl From<CryptoError> for CarisError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Io(e) => CarisError::Io(e),
            other => CarisError::Crypto(other.to_string()),
        }
    }
}
