//! Envelope data model and container codec.
//!
//! A finalized envelope is a JSON manifest plus the concatenated segment
//! ciphertexts, framed as:
//!
//! ```text
//! "ZTDF" | version: u8 | manifest_len: u32 BE | manifest JSON | payload
//! ```
//!
//! Segment boundaries inside the payload come from `encryptedSegmentSize`.

use crate::assertions::Assertion;
use crate::error::{TdfError, TdfResult};
use crate::policy::PolicyObject;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use ztdf_crypto::IntegrityAlgorithm;

/// Container magic bytes.
pub const MAGIC: &[u8; 4] = b"ZTDF";

/// Container format version.
pub const CONTAINER_VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 1 + 4;

/// Payload cipher recorded in the manifest.
pub const PAYLOAD_CIPHER: &str = "AES-256-GCM";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub payload: PayloadInfo,
    pub encryption_information: EncryptionInformation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub protocol: String,
    pub mime_type: String,
    pub is_encrypted: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionInformation {
    #[serde(rename = "type")]
    pub kind: String,
    pub key_access: Vec<KeyAccessObject>,
    pub method: EncryptionMethod,
    pub integrity_information: IntegrityInformation,
    /// Base64-encoded policy object.
    pub policy: String,
}

/// Wrapped content key for one KAS.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAccessObject {
    #[serde(rename = "type")]
    pub kind: String,
    /// KAS origin; checked against the reader's allowlist.
    pub url: String,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Base64 RSA-OAEP ciphertext of the content key.
    pub wrapped_key: String,
    pub policy_binding: PolicyBinding,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyBinding {
    pub alg: String,
    pub hash: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionMethod {
    pub algorithm: String,
    pub is_streamable: bool,
    #[serde(default)]
    pub iv: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityInformation {
    pub root_signature: RootSignature,
    pub segment_hash_alg: IntegrityAlgorithm,
    pub segment_size_default: u64,
    pub encrypted_segment_size_default: u64,
    pub segments: Vec<SegmentInfo>,
}

/// Aggregate tag over all segment tags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RootSignature {
    pub alg: IntegrityAlgorithm,
    /// Base64 of the raw aggregate tag.
    pub sig: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentInfo {
    /// Base64 of the raw segment tag.
    pub hash: String,
    pub segment_size: u64,
    pub encrypted_segment_size: u64,
}

/// A finalized envelope: manifest plus concatenated segment ciphertexts.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub manifest: Manifest,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Serializes the envelope into its container framing.
    pub fn to_bytes(&self) -> TdfResult<Vec<u8>> {
        let manifest = serde_json::to_vec(&self.manifest)?;
        let manifest_len = u32::try_from(manifest.len())
            .map_err(|_| TdfError::MalformedEnvelope("manifest exceeds 4 GiB".to_string()))?;

        let mut out = Vec::with_capacity(HEADER_LEN + manifest.len() + self.payload.len());
        out.extend_from_slice(MAGIC);
        out.push(CONTAINER_VERSION);
        out.extend_from_slice(&manifest_len.to_be_bytes());
        out.extend_from_slice(&manifest);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Parses and structurally validates a container.
    ///
    /// Only framing and manifest shape are checked here; integrity and
    /// key access are verified by the reader.
    pub fn from_bytes(bytes: &[u8]) -> TdfResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(malformed("truncated header"));
        }
        let (magic, rest) = bytes.split_at(MAGIC.len());
        if magic != MAGIC {
            return Err(malformed("bad magic"));
        }
        let version = rest[0];
        if version != CONTAINER_VERSION {
            return Err(malformed(format!("unsupported container version {version}")));
        }
        let len_bytes: [u8; 4] = rest[1..5]
            .try_into()
            .map_err(|_| malformed("truncated header"))?;
        let manifest_len = u32::from_be_bytes(len_bytes) as usize;
        let body = &rest[5..];
        if body.len() < manifest_len {
            return Err(malformed("manifest length exceeds container"));
        }
        let (manifest_bytes, payload) = body.split_at(manifest_len);
        let manifest: Manifest = serde_json::from_slice(manifest_bytes)
            .map_err(|e| malformed(format!("manifest: {e}")))?;

        let envelope = Self {
            manifest,
            payload: payload.to_vec(),
        };
        envelope.validate()?;
        Ok(envelope)
    }

    fn validate(&self) -> TdfResult<()> {
        let info = &self.manifest.encryption_information;
        if info.key_access.is_empty() {
            return Err(malformed("no key access objects"));
        }
        if info.method.algorithm != PAYLOAD_CIPHER {
            return Err(malformed(format!(
                "unsupported payload cipher {}",
                info.method.algorithm
            )));
        }
        let integrity = &info.integrity_information;
        if integrity.segment_hash_alg != integrity.root_signature.alg {
            return Err(malformed("segment and root signature algorithms differ"));
        }
        let segments = &integrity.segments;
        if segments.is_empty() {
            return Err(malformed("no segments"));
        }
        let declared = segments
            .iter()
            .try_fold(0u64, |acc, s| acc.checked_add(s.encrypted_segment_size))
            .ok_or_else(|| malformed("segment sizes overflow"))?;
        if declared != self.payload.len() as u64 {
            return Err(malformed(format!(
                "segments declare {declared} bytes but payload has {}",
                self.payload.len()
            )));
        }
        Ok(())
    }

    /// Segment ciphertexts in index order.
    pub fn segments(&self) -> TdfResult<Vec<&[u8]>> {
        let mut out = Vec::with_capacity(self.segment_infos().len());
        let mut offset = 0usize;
        for info in self.segment_infos() {
            let len = usize::try_from(info.encrypted_segment_size)
                .map_err(|_| malformed("segment size overflow"))?;
            let end = offset
                .checked_add(len)
                .filter(|end| *end <= self.payload.len())
                .ok_or_else(|| malformed("segment exceeds payload"))?;
            out.push(&self.payload[offset..end]);
            offset = end;
        }
        Ok(out)
    }

    pub fn segment_infos(&self) -> &[SegmentInfo] {
        &self
            .manifest
            .encryption_information
            .integrity_information
            .segments
    }

    /// Declared raw segment tags in index order.
    pub fn declared_tags(&self) -> TdfResult<Vec<Vec<u8>>> {
        self.segment_infos()
            .iter()
            .enumerate()
            .map(|(i, s)| {
                BASE64
                    .decode(&s.hash)
                    .map_err(|e| malformed(format!("segment {i} hash: {e}")))
            })
            .collect()
    }

    /// Declared raw aggregate tag.
    pub fn root_signature(&self) -> TdfResult<Vec<u8>> {
        let sig = &self
            .manifest
            .encryption_information
            .integrity_information
            .root_signature
            .sig;
        BASE64
            .decode(sig)
            .map_err(|e| malformed(format!("root signature: {e}")))
    }

    pub fn integrity_algorithm(&self) -> IntegrityAlgorithm {
        self.manifest
            .encryption_information
            .integrity_information
            .root_signature
            .alg
    }

    pub fn key_access(&self) -> &[KeyAccessObject] {
        &self.manifest.encryption_information.key_access
    }

    /// Decodes the embedded policy object.
    pub fn policy(&self) -> TdfResult<PolicyObject> {
        let raw = BASE64
            .decode(&self.manifest.encryption_information.policy)
            .map_err(|e| malformed(format!("policy: {e}")))?;
        serde_json::from_slice(&raw).map_err(|e| malformed(format!("policy: {e}")))
    }

    pub fn mime_type(&self) -> &str {
        &self.manifest.payload.mime_type
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.manifest.assertions
    }
}

fn malformed(detail: impl Into<String>) -> TdfError {
    TdfError::MalformedEnvelope(detail.into())
}
