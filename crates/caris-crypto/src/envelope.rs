//! Envelope encryption of backup artifacts
//!
//! Wire format: a fresh random 16-byte IV followed by the AES-256-CBC
//! ciphertext (PKCS#7 padding). Every consumer of an encrypted artifact can
//! decrypt it from the blob plus the key alone.

use crate::{keys::SymmetricKey, CryptoError, Result};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use std::path::Path;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// IV length in bytes, prepended to every ciphertext
pub const IV_LEN: usize = 16;

/// Encrypt a buffer under the given key
///
/// Returns `IV || ciphertext`. A fresh IV is drawn from the OS RNG per call,
/// so encrypting the same plaintext twice yields different blobs.
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(key.as_bytes().into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    blob
}

/// Decrypt a blob produced by [`encrypt`]
pub fn decrypt(key: &SymmetricKey, blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < IV_LEN {
        return Err(CryptoError::Decrypt(format!(
            "blob too short: {} bytes, expected at least {}",
            blob.len(),
            IV_LEN
        )));
    }

    let (iv, ciphertext) = blob.split_at(IV_LEN);
    let mut iv_bytes = [0u8; IV_LEN];
    iv_bytes.copy_from_slice(iv);

    Aes256CbcDec::new(key.as_bytes().into(), &iv_bytes.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::Decrypt("bad padding (wrong key or corrupt data)".into()))
}

/// Encrypt a file on disk, writing `IV || ciphertext` to `dest`
///
/// The source file is left in place; pipeline stages decide when to remove
/// their inputs.
pub fn encrypt_file(key: &SymmetricKey, src: &Path, dest: &Path) -> Result<()> {
    let plaintext = std::fs::read(src)?;
    let blob = encrypt(key, &plaintext);
    std::fs::write(dest, blob)?;
    Ok(())
}

/// Decrypt a file produced by [`encrypt_file`]
pub fn decrypt_file(key: &SymmetricKey, src: &Path, dest: &Path) -> Result<()> {
    let blob = std::fs::read(src)?;
    let plaintext = decrypt(key, &blob)?;
    std::fs::write(dest, plaintext)?;
    Ok(())
}
