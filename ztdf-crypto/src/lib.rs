//! Cryptographic primitives for ZTDF envelopes.
//!
//! Provides:
//! - AES-256-GCM sealing of payload segments under a random content key
//! - HMAC-SHA256 segment tags and the aggregate (root) signature
//! - RSA-OAEP wrapping of the content key and the policy binding hash
//! - HS256/RS256 assertion key material and compact JWS
//!
//! Everything here is synchronous and performs no I/O.

pub mod cipher;
mod error;
pub mod integrity;
pub mod jws;
mod key;
pub mod wrap;

pub use cipher::{ContentKey, IV_SIZE, KEY_SIZE, TAG_SIZE, decrypt_segment, encrypt_segment};
pub use error::{CryptoError, CryptoResult};
pub use integrity::{IntegrityAlgorithm, aggregate_tag, split, tag_segment};
pub use key::{KeyMaterial, SigningAlgorithm};
pub use wrap::{parse_public_key_pem, policy_binding, unwrap_key, verify_policy_binding, wrap_key};

// Re-exported so callers can hold KAS keys without a direct `rsa` dependency.
pub use rsa::{RsaPrivateKey, RsaPublicKey};
