//! Signing and verification key material for assertions.
//!
//! Key material is a closed set: a shared secret for HS256 or an RSA key
//! for RS256. The algorithm is fixed by the variant, so sign/verify never
//! dispatches on anything the caller can extend.

use crate::error::{CryptoError, CryptoResult};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Assertion signing algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// HMAC-SHA256 with a shared secret.
    #[serde(rename = "HS256")]
    Hs256,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    #[serde(rename = "RS256")]
    Rs256,
}

impl SigningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Hs256 => "HS256",
            SigningAlgorithm::Rs256 => "RS256",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(SigningAlgorithm::Hs256),
            "RS256" => Ok(SigningAlgorithm::Rs256),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Caller-supplied key for signing or verifying an assertion.
///
/// Never persisted by this crate. Shared secrets are zeroized on drop;
/// `RsaPrivateKey` zeroizes itself.
#[derive(Clone)]
pub enum KeyMaterial {
    SharedSecret(Zeroizing<Vec<u8>>),
    RsaPrivate(Box<RsaPrivateKey>),
    RsaPublic(RsaPublicKey),
}

impl KeyMaterial {
    /// Wraps raw shared-secret bytes. Empty secrets are rejected.
    pub fn shared_secret(bytes: impl Into<Vec<u8>>) -> CryptoResult<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(CryptoError::InvalidKey(
                "shared secret must not be empty".to_string(),
            ));
        }
        Ok(KeyMaterial::SharedSecret(Zeroizing::new(bytes)))
    }

    /// Parses an RSA key from PEM.
    ///
    /// Accepts PKCS#8 and PKCS#1 private keys, and SPKI and PKCS#1 public
    /// keys. A public key can only verify.
    pub fn rsa_from_pem(pem: &str) -> CryptoResult<Self> {
        let pem = pem.trim();
        if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem) {
            return Ok(KeyMaterial::RsaPrivate(Box::new(key)));
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs1_pem(pem) {
            return Ok(KeyMaterial::RsaPrivate(Box::new(key)));
        }
        if let Ok(key) = RsaPublicKey::from_public_key_pem(pem) {
            return Ok(KeyMaterial::RsaPublic(key));
        }
        if let Ok(key) = RsaPublicKey::from_pkcs1_pem(pem) {
            return Ok(KeyMaterial::RsaPublic(key));
        }
        Err(CryptoError::InvalidKey(
            "failed to parse RSA key (expected PKCS#8, PKCS#1 or SPKI PEM)".to_string(),
        ))
    }

    /// Builds key material from an algorithm tag and literal key text.
    ///
    /// HS256 uses the raw bytes of `key`; RS256 parses `key` as PEM.
    pub fn from_parts(alg: SigningAlgorithm, key: &str) -> CryptoResult<Self> {
        match alg {
            SigningAlgorithm::Hs256 => Self::shared_secret(key.as_bytes().to_vec()),
            SigningAlgorithm::Rs256 => Self::rsa_from_pem(key),
        }
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        match self {
            KeyMaterial::SharedSecret(_) => SigningAlgorithm::Hs256,
            KeyMaterial::RsaPrivate(_) | KeyMaterial::RsaPublic(_) => SigningAlgorithm::Rs256,
        }
    }

    /// Returns the RSA public half, if this is an RSA key.
    pub fn rsa_public_key(&self) -> Option<RsaPublicKey> {
        match self {
            KeyMaterial::SharedSecret(_) => None,
            KeyMaterial::RsaPrivate(key) => Some(key.to_public_key()),
            KeyMaterial::RsaPublic(key) => Some(key.clone()),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            KeyMaterial::SharedSecret(_) => "SharedSecret",
            KeyMaterial::RsaPrivate(_) => "RsaPrivate",
            KeyMaterial::RsaPublic(_) => "RsaPublic",
        };
        f.debug_tuple(kind).field(&"[redacted]").finish()
    }
}
