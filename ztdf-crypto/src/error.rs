//! Cryptographic error types.

use thiserror::Error;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised by the ZTDF cryptographic primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("key wrap failed: {0}")]
    KeyWrap(String),

    #[error("key unwrap failed: {0}")]
    KeyUnwrap(String),

    #[error("signature error: {0}")]
    Signature(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid segment size: {0}")]
    InvalidSegmentSize(usize),

    #[error("segment {index} failed integrity check")]
    SegmentIntegrityMismatch { index: usize },

    #[error("aggregate integrity check failed")]
    AggregateIntegrityMismatch,
}
