//! Envelope writer.
//!
//! Lifecycle: `Open` while segments are appended, then one `finalize` call
//! moves the writer to `Finalized` (envelope returned) or `Failed` (nothing
//! returned). Segments must arrive with indices 0, 1, 2, ... and each is
//! sealed under the writer's content key as it is written.

use crate::assertions::AssertionConfig;
use crate::config::TdfConfig;
use crate::error::{TdfError, TdfResult};
use crate::key_resolution::WrappingKeyReference;
use crate::manifest::{
    EncryptionInformation, EncryptionMethod, Envelope, IntegrityInformation, KeyAccessObject,
    Manifest, PAYLOAD_CIPHER, PayloadInfo, PolicyBinding, RootSignature, SegmentInfo,
};
use crate::pipeline;
use crate::policy::{PolicyAttributeValue, PolicyObject};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use ztdf_crypto::cipher::encrypted_len;
use ztdf_crypto::{
    ContentKey, IntegrityAlgorithm, KeyMaterial, aggregate_tag, encrypt_segment, policy_binding,
    wrap_key,
};

/// Writer settings.
#[derive(Clone, Debug)]
pub struct WriterConfig {
    /// Maximum plaintext bytes per segment.
    pub segment_size: usize,
    pub integrity_algorithm: IntegrityAlgorithm,
    pub default_mime_type: String,
    pub parallelism: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::from(&TdfConfig::default())
    }
}

impl From<&TdfConfig> for WriterConfig {
    fn from(config: &TdfConfig) -> Self {
        Self {
            segment_size: config.segment_size,
            integrity_algorithm: IntegrityAlgorithm::Hs256,
            default_mime_type: config.default_mime_type.clone(),
            parallelism: config.effective_parallelism(),
        }
    }
}

/// Everything bound into the envelope at finalize time.
#[derive(Clone, Debug, Default)]
pub struct FinalizeOptions {
    /// Mandatory; finalize fails with `WrappingKeyUnavailable` without it.
    pub wrapping_key: Option<WrappingKeyReference>,
    pub attributes: Vec<PolicyAttributeValue>,
    pub assertions: Vec<AssertionConfig>,
    pub mime_type: Option<String>,
}

impl FinalizeOptions {
    pub fn new(wrapping_key: WrappingKeyReference) -> Self {
        Self {
            wrapping_key: Some(wrapping_key),
            ..Self::default()
        }
    }

    pub fn with_attributes(mut self, attributes: Vec<PolicyAttributeValue>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_assertions(mut self, assertions: Vec<AssertionConfig>) -> Self {
        self.assertions = assertions;
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriterState {
    Open,
    Finalized,
    Failed,
}

struct WrittenSegment {
    plaintext_len: usize,
    ciphertext: Arc<[u8]>,
}

/// Single-writer envelope builder.
pub struct EnvelopeWriter {
    config: WriterConfig,
    content_key: ContentKey,
    segments: Vec<WrittenSegment>,
    state: WriterState,
    cancel: CancellationToken,
}

impl EnvelopeWriter {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            config,
            content_key: ContentKey::generate(),
            segments: Vec::new(),
            state: WriterState::Open,
            cancel: CancellationToken::new(),
        }
    }

    /// Observes `cancel` between segments and assertions during finalize.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn ensure_open(&self, op: &str) -> TdfResult<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Finalized => Err(TdfError::WriterMisuse(format!(
                "{op} after finalize"
            ))),
            WriterState::Failed => Err(TdfError::WriterMisuse(format!(
                "{op} on a failed writer"
            ))),
        }
    }

    /// Seals and appends segment `index`. Indices start at 0 and increase
    /// by one; anything else is rejected without changing the writer.
    pub fn write_segment(&mut self, index: usize, bytes: &[u8]) -> TdfResult<()> {
        self.ensure_open("write_segment")?;

        let expected = self.segments.len();
        if index != expected {
            return Err(TdfError::WriterMisuse(format!(
                "segment {index} written out of order, expected {expected}"
            )));
        }
        if bytes.len() > self.config.segment_size {
            return Err(TdfError::WriterMisuse(format!(
                "segment {index} has {} bytes, limit is {}",
                bytes.len(),
                self.config.segment_size
            )));
        }

        let ciphertext = encrypt_segment(&self.content_key, bytes)?;
        self.segments.push(WrittenSegment {
            plaintext_len: bytes.len(),
            ciphertext: ciphertext.into(),
        });
        debug!(index, bytes = bytes.len(), "segment written");
        Ok(())
    }

    /// Binds key, policy and assertions and produces the envelope.
    ///
    /// One-shot: a second call, or any call after a failure, is
    /// `WriterMisuse`. On failure no envelope is produced.
    pub async fn finalize(&mut self, options: FinalizeOptions) -> TdfResult<Envelope> {
        self.ensure_open("finalize")?;

        match self.build(options).await {
            Ok(envelope) => {
                self.state = WriterState::Finalized;
                self.segments.clear();
                info!(
                    segments = envelope.segment_infos().len(),
                    assertions = envelope.assertions().len(),
                    "envelope finalized"
                );
                Ok(envelope)
            }
            Err(e) => {
                self.state = WriterState::Failed;
                self.segments.clear();
                Err(e)
            }
        }
    }

    async fn build(&mut self, options: FinalizeOptions) -> TdfResult<Envelope> {
        let wrapping_key = options
            .wrapping_key
            .ok_or(TdfError::WrappingKeyUnavailable)?;
        let kas_public_key = wrapping_key.public_key()?;

        if self.segments.is_empty() {
            self.write_segment(0, &[])?;
        }

        let mut seen = HashSet::new();
        for assertion in &options.assertions {
            if !seen.insert(assertion.id.as_str()) {
                return Err(TdfError::WriterMisuse(format!(
                    "duplicate assertion id {}",
                    assertion.id
                )));
            }
        }

        let alg = self.config.integrity_algorithm;
        let ciphertexts: Vec<Arc<[u8]>> =
            self.segments.iter().map(|s| s.ciphertext.clone()).collect();
        let tags = pipeline::tag_segments(
            &ciphertexts,
            &self.content_key,
            alg,
            self.config.parallelism,
            &self.cancel,
        )
        .await?;
        let root = aggregate_tag(&tags, self.content_key.as_bytes(), alg)?;

        let policy = PolicyObject::new(&options.attributes);
        let policy_b64 = BASE64.encode(serde_json::to_vec(&policy)?);
        let key_access = KeyAccessObject {
            kind: "wrapped".to_string(),
            url: wrapping_key.kas_uri.clone(),
            protocol: "kas".to_string(),
            kid: Some(wrapping_key.kid.clone()).filter(|k| !k.is_empty()),
            wrapped_key: BASE64.encode(wrap_key(&kas_public_key, &self.content_key)?),
            policy_binding: PolicyBinding {
                alg: "HS256".to_string(),
                hash: policy_binding(&self.content_key, &policy_b64)?,
            },
        };

        let default_key = KeyMaterial::shared_secret(self.content_key.as_bytes().to_vec())?;
        let mut assertions = Vec::with_capacity(options.assertions.len());
        for config in &options.assertions {
            if self.cancel.is_cancelled() {
                return Err(TdfError::Cancelled);
            }
            assertions.push(config.sign(&default_key, &root)?);
        }

        let segments: Vec<SegmentInfo> = self
            .segments
            .iter()
            .zip(&tags)
            .map(|(segment, tag)| SegmentInfo {
                hash: BASE64.encode(tag),
                segment_size: segment.plaintext_len as u64,
                encrypted_segment_size: segment.ciphertext.len() as u64,
            })
            .collect();

        let payload: Vec<u8> = self
            .segments
            .iter()
            .flat_map(|s| s.ciphertext.iter().copied())
            .collect();

        let manifest = Manifest {
            payload: PayloadInfo {
                kind: "reference".to_string(),
                url: "0.payload".to_string(),
                protocol: "binary".to_string(),
                mime_type: options
                    .mime_type
                    .unwrap_or_else(|| self.config.default_mime_type.clone()),
                is_encrypted: true,
            },
            encryption_information: EncryptionInformation {
                kind: "split".to_string(),
                key_access: vec![key_access],
                method: EncryptionMethod {
                    algorithm: PAYLOAD_CIPHER.to_string(),
                    is_streamable: true,
                    iv: String::new(),
                },
                integrity_information: IntegrityInformation {
                    root_signature: RootSignature {
                        alg,
                        sig: BASE64.encode(&root),
                    },
                    segment_hash_alg: alg,
                    segment_size_default: self.config.segment_size as u64,
                    encrypted_segment_size_default: encrypted_len(self.config.segment_size) as u64,
                    segments,
                },
                policy: policy_b64,
            },
            assertions,
        };

        debug!(kas_uri = %wrapping_key.kas_uri, "bound wrapping key");
        Ok(Envelope { manifest, payload })
    }
}
