//! AES-256-GCM content encryption for payload segments.
//!
//! Each segment is sealed independently under the envelope's content key
//! with a fresh random IV. Wire format is `iv(12) || ciphertext || tag(16)`.

use crate::error::{CryptoError, CryptoResult};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Content key size in bytes.
pub const KEY_SIZE: usize = 32;

/// AES-GCM IV size in bytes.
pub const IV_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Symmetric key protecting one envelope's payload.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey([u8; KEY_SIZE]);

impl ContentKey {
    /// Generates a new random content key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "content key must be {KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentKey([redacted])")
    }
}

/// Length of a sealed segment for a plaintext of `plaintext_len` bytes.
pub fn encrypted_len(plaintext_len: usize) -> usize {
    plaintext_len + IV_SIZE + TAG_SIZE
}

/// Seals one plaintext segment.
pub fn encrypt_segment(key: &ContentKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let mut iv = [0u8; IV_SIZE];
    rand::rng().fill_bytes(&mut iv);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| CryptoError::Encryption(format!("segment seal failed: {e}")))?;

    let mut out = Vec::with_capacity(IV_SIZE + sealed.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Opens one sealed segment.
pub fn decrypt_segment(key: &ContentKey, segment: &[u8]) -> CryptoResult<Vec<u8>> {
    if segment.len() < IV_SIZE + TAG_SIZE {
        return Err(CryptoError::Decryption(format!(
            "segment of {} bytes is shorter than iv and tag",
            segment.len()
        )));
    }
    let (iv, sealed) = segment.split_at(IV_SIZE);
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    cipher.decrypt(Nonce::from_slice(iv), sealed).map_err(|_| {
        CryptoError::Decryption("segment open failed (wrong key or tampered data)".to_string())
    })
}
