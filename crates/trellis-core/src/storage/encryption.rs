//! Per-value encryption.
//!
//! The record codec calls a [`DataEncryption`] collaborator on the encoded
//! payload of each value, except for the tags that bypass encryption (null
//! and record ids). [`AesGcmEncryption`] is the stock implementation.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use trellis_common::utils::error::{Error, Result};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size in bytes of the random nonce stored ahead of each ciphertext.
pub const NONCE_SIZE: usize = 12;

/// Size in bytes of an AES-256 key.
pub const KEY_SIZE: usize = 32;

/// A reversible byte transform applied to encoded values.
pub trait DataEncryption: Send + Sync + fmt::Debug {
    /// Encrypts one encoded value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encryption`] if the cipher fails.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypts what [`encrypt`](Self::encrypt) produced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encryption`] on a wrong key or tampered input.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// 256-bit key, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Wraps raw key material.
    #[must_use]
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Builds a key from a slice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the slice is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::InvalidArgument(format!(
                "encryption key must be {KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Generates a random key.
    #[must_use]
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    /// Returns the key material.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// AES-256-GCM with a fresh random nonce per value.
///
/// Output layout: `[nonce: 12 bytes][ciphertext + tag]`.
pub struct AesGcmEncryption {
    cipher: Aes256Gcm,
}

impl AesGcmEncryption {
    /// Creates a cipher from a key.
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }
}

impl fmt::Debug for AesGcmEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmEncryption").finish_non_exhaustive()
    }
}

impl DataEncryption for AesGcmEncryption {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| Error::Encryption(format!("encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE {
            return Err(Error::Encryption(format!(
                "ciphertext of {} bytes is shorter than the nonce",
                ciphertext.len()
            )));
        }
        let (nonce, body) = ciphertext.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|e| Error::Encryption(format!("decryption failed: {e}")))
    }
}
