//! Envelope pipeline error types.

use thiserror::Error;
use ztdf_crypto::CryptoError;

/// Result type for envelope operations.
pub type TdfResult<T> = Result<T, TdfError>;

/// Errors that can occur while writing or reading an envelope.
///
/// Every stage fails closed; variants carry the segment index, assertion
/// id, attribute FQN or KAS origin needed to pinpoint the cause.
#[derive(Debug, Error)]
pub enum TdfError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("segment {index} failed integrity check")]
    SegmentIntegrityMismatch { index: usize },

    #[error("aggregate integrity check failed")]
    AggregateIntegrityMismatch,

    #[error("assertion verification failed: {0}")]
    AssertionVerificationFailed(String),

    #[error("no verification key for assertion: {0}")]
    AssertionKeyMissing(String),

    #[error("untrusted key access origin: {0}")]
    UntrustedKeyAccessOrigin(String),

    #[error("attribute resolution failed: {0}")]
    AttributeResolutionFailed(String),

    #[error("duplicate attribute: {0}")]
    DuplicateAttribute(String),

    #[error("no wrapping key available")]
    WrappingKeyUnavailable,

    #[error("policy binding does not match policy")]
    PolicyBindingMismatch,

    #[error("writer misuse: {0}")]
    WriterMisuse(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid key material: {0}")]
    KeyLoad(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CryptoError> for TdfError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::SegmentIntegrityMismatch { index } => {
                TdfError::SegmentIntegrityMismatch { index }
            }
            CryptoError::AggregateIntegrityMismatch => TdfError::AggregateIntegrityMismatch,
            other => TdfError::Crypto(other),
        }
    }
}
