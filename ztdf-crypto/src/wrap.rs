//! Content-key wrapping and policy binding.
//!
//! The content key is wrapped with RSA-OAEP (SHA-256) under the KAS public
//! key. The policy binding ties the wrapped key to one policy object:
//! `base64(hex(HMAC-SHA256(content_key, policy_base64)))`.

use crate::cipher::ContentKey;
use crate::error::{CryptoError, CryptoResult};
use crate::integrity::IntegrityAlgorithm;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::rand_core::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

/// Parses a KAS public key from SPKI or PKCS#1 PEM.
pub fn parse_public_key_pem(pem: &str) -> CryptoResult<RsaPublicKey> {
    let pem = pem.trim();
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::InvalidKey(format!("KAS public key: {e}")))
}

/// Wraps the content key for the holder of `public_key`.
pub fn wrap_key(public_key: &RsaPublicKey, key: &ContentKey) -> CryptoResult<Vec<u8>> {
    public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.as_bytes())
        .map_err(|e| CryptoError::KeyWrap(e.to_string()))
}

/// Unwraps a content key with the KAS private key.
pub fn unwrap_key(private_key: &RsaPrivateKey, wrapped: &[u8]) -> CryptoResult<ContentKey> {
    let bytes = private_key
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map_err(|e| CryptoError::KeyUnwrap(e.to_string()))?;
    ContentKey::from_bytes(&bytes)
}

/// Computes the policy binding hash for a base64-encoded policy.
pub fn policy_binding(key: &ContentKey, policy_b64: &str) -> CryptoResult<String> {
    let tag = IntegrityAlgorithm::Hs256.tag(key.as_bytes(), [policy_b64.as_bytes()])?;
    Ok(BASE64.encode(hex::encode(tag)))
}

/// Checks a declared policy binding hash in constant time.
pub fn verify_policy_binding(
    key: &ContentKey,
    policy_b64: &str,
    declared: &str,
) -> CryptoResult<bool> {
    let Ok(hex_tag) = BASE64.decode(declared) else {
        return Ok(false);
    };
    let Ok(tag) = hex::decode(hex_tag) else {
        return Ok(false);
    };
    IntegrityAlgorithm::Hs256.verify(key.as_bytes(), [policy_b64.as_bytes()], &tag)
}
