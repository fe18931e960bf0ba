//! Symmetric key generation, export/import and derivation

use crate::{CryptoError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{rngs::OsRng, RngCore};
use scrypt::{scrypt, Params};

/// Symmetric key length in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// scrypt cost parameter log2(N); N = 16384 matches the platform default
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// A 256-bit symmetric key
///
/// Deliberately opaque: the raw bytes are only reachable through
/// [`SymmetricKey::as_bytes`], and `Debug` does not print key material.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

impl SymmetricKey {
    /// Generate a fresh random key from the OS RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Build a key from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Export the key as base64 for persistence alongside a backup record
    pub fn export(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Import a key previously produced by [`SymmetricKey::export`]
    pub fn import(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("base64 decode failed: {}", e)))?;
        let bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("expected 32 bytes of key material".into()))?;
        Ok(Self(bytes))
    }
}

/// Derive a key from an operator-configured secret via scrypt
///
/// The salt is fixed per deployment (it lives in configuration next to the
/// secret); the derived key is stable across restarts so older artifacts
/// stay decryptable.
pub fn derive_key(secret: &str, salt: &[u8]) -> Result<SymmetricKey> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN)
        .map_err(|e| CryptoError::Derivation(e.to_string()))?;

    let mut out = [0u8; KEY_LEN];
    scrypt(secret.as_bytes(), salt, &params, &mut out)
        .map_err(|e| CryptoError::Derivation(e.to_string()))?;

    Ok(SymmetricKey(out))
}
