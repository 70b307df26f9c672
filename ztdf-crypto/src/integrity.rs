//! Segment integrity engine.
//!
//! Splits a payload into fixed-size segments, tags each segment with a keyed
//! hash and tags the ordered concatenation of all segment tags (the root
//! signature). One algorithm applies to every segment and to the aggregate.
//!
//! Verification recomputes each segment tag from its ciphertext, then
//! recomputes the aggregate over the *declared* tags. Both checks must pass.

use crate::error::{CryptoError, CryptoResult};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;

type HmacSha256 = Hmac<Sha256>;

/// Keyed-hash algorithm used for segment and aggregate tags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrityAlgorithm {
    #[default]
    #[serde(rename = "HS256")]
    Hs256,
}

impl IntegrityAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityAlgorithm::Hs256 => "HS256",
        }
    }

    /// Computes the tag over `parts` as if they were one contiguous buffer.
    pub fn tag<'a>(
        &self,
        key: &[u8],
        parts: impl IntoIterator<Item = &'a [u8]>,
    ) -> CryptoResult<Vec<u8>> {
        match self {
            IntegrityAlgorithm::Hs256 => {
                let mut mac = hmac_sha256(key)?;
                for part in parts {
                    mac.update(part);
                }
                Ok(mac.finalize().into_bytes().to_vec())
            }
        }
    }

    /// Constant-time comparison of a recomputed tag against `expected`.
    pub fn verify<'a>(
        &self,
        key: &[u8],
        parts: impl IntoIterator<Item = &'a [u8]>,
        expected: &[u8],
    ) -> CryptoResult<bool> {
        match self {
            IntegrityAlgorithm::Hs256 => {
                let mut mac = hmac_sha256(key)?;
                for part in parts {
                    mac.update(part);
                }
                Ok(mac.verify_slice(expected).is_ok())
            }
        }
    }
}

impl fmt::Display for IntegrityAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrityAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(IntegrityAlgorithm::Hs256),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

fn hmac_sha256(key: &[u8]) -> CryptoResult<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Splits `payload` into segments of at most `max_segment_bytes`.
///
/// An empty payload yields exactly one empty segment.
pub fn split(payload: &[u8], max_segment_bytes: usize) -> CryptoResult<Vec<&[u8]>> {
    if max_segment_bytes == 0 {
        return Err(CryptoError::InvalidSegmentSize(max_segment_bytes));
    }
    if payload.is_empty() {
        return Ok(vec![payload]);
    }
    Ok(payload.chunks(max_segment_bytes).collect())
}

/// Tags a single segment.
pub fn tag_segment(segment: &[u8], key: &[u8], alg: IntegrityAlgorithm) -> CryptoResult<Vec<u8>> {
    alg.tag(key, [segment])
}

/// Tags the in-order concatenation of segment tags.
pub fn aggregate_tag<T: AsRef<[u8]>>(
    tags: &[T],
    key: &[u8],
    alg: IntegrityAlgorithm,
) -> CryptoResult<Vec<u8>> {
    alg.tag(key, tags.iter().map(|t| t.as_ref()))
}

/// Verifies one segment against its declared tag.
pub fn verify_segment(
    index: usize,
    segment: &[u8],
    declared_tag: &[u8],
    key: &[u8],
    alg: IntegrityAlgorithm,
) -> CryptoResult<()> {
    if alg.verify(key, [segment], declared_tag)? {
        Ok(())
    } else {
        Err(CryptoError::SegmentIntegrityMismatch { index })
    }
}

/// Verifies the aggregate tag over the declared segment tags.
pub fn verify_aggregate<T: AsRef<[u8]>>(
    declared_tags: &[T],
    declared_aggregate: &[u8],
    key: &[u8],
    alg: IntegrityAlgorithm,
) -> CryptoResult<()> {
    if alg.verify(key, declared_tags.iter().map(|t| t.as_ref()), declared_aggregate)? {
        Ok(())
    } else {
        Err(CryptoError::AggregateIntegrityMismatch)
    }
}

/// Runs every per-segment check in index order, then the aggregate check.
pub fn verify_all<S: AsRef<[u8]>, T: AsRef<[u8]>>(
    segments: &[S],
    declared_tags: &[T],
    declared_aggregate: &[u8],
    key: &[u8],
    alg: IntegrityAlgorithm,
) -> CryptoResult<()> {
    if segments.len() != declared_tags.len() {
        return Err(CryptoError::AggregateIntegrityMismatch);
    }
    for (index, (segment, tag)) in segments.iter().zip(declared_tags).enumerate() {
        verify_segment(index, segment.as_ref(), tag.as_ref(), key, alg)?;
    }
    verify_aggregate(declared_tags, declared_aggregate, key, alg)
}
