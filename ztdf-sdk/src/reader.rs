//! Envelope reader.
//!
//! `EnvelopeReader::open` runs the verify-then-decrypt pipeline, each stage
//! gating the next:
//!
//! 1. parse the container (`MalformedEnvelope`)
//! 2. check every key access origin against the allowlist
//!    (`UntrustedKeyAccessOrigin`), before any key access is attempted
//! 3. unwrap the content key and check the policy binding
//! 4. verify every segment tag, then the aggregate over the declared tags
//! 5. verify assertions unless disabled
//!
//! Plaintext is then available only as a sequential stream, one segment
//! decrypted at a time.

use crate::allowlist::KasAllowlist;
use crate::assertions::{
    AssertionReport, VerificationKeyRegistry, VerificationPolicy, verify_assertions,
};
use crate::error::{TdfError, TdfResult};
use crate::manifest::{Envelope, KeyAccessObject, Manifest};
use crate::pipeline;
use crate::policy::PolicyObject;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::io::{self, Read};
use std::ops::Range;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use ztdf_crypto::integrity::verify_aggregate;
use ztdf_crypto::{ContentKey, KeyMaterial, RsaPrivateKey, decrypt_segment, verify_policy_binding};

/// Recovers the content key from a key access object.
///
/// The KAS rewrap exchange lives behind this seam; the reader only calls
/// it after the origin has passed the allowlist.
#[async_trait]
pub trait KeyUnwrapper: Send + Sync {
    async fn unwrap_key(&self, access: &KeyAccessObject) -> TdfResult<ContentKey>;
}

/// Unwraps locally with the KAS private key.
pub struct LocalRsaUnwrapper {
    private_key: RsaPrivateKey,
}

impl LocalRsaUnwrapper {
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self { private_key }
    }
}

#[async_trait]
impl KeyUnwrapper for LocalRsaUnwrapper {
    async fn unwrap_key(&self, access: &KeyAccessObject) -> TdfResult<ContentKey> {
        let wrapped = BASE64
            .decode(&access.wrapped_key)
            .map_err(|e| TdfError::MalformedEnvelope(format!("wrapped key: {e}")))?;
        Ok(ztdf_crypto::unwrap_key(&self.private_key, &wrapped)?)
    }
}

/// Read-side settings.
#[derive(Clone, Debug)]
pub struct ReaderOptions {
    /// Trusted KAS origins. The default trusts nothing.
    pub allowlist: KasAllowlist,
    /// Assertion verification keys. When `None`, the content key is the
    /// HS256 default key.
    pub verification_keys: Option<VerificationKeyRegistry>,
    pub disable_assertion_verification: bool,
    pub tolerate_assertion_failures: bool,
    pub parallelism: usize,
    pub cancel: CancellationToken,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            allowlist: KasAllowlist::default(),
            verification_keys: None,
            disable_assertion_verification: false,
            tolerate_assertion_failures: false,
            parallelism: 4,
            cancel: CancellationToken::new(),
        }
    }
}

impl ReaderOptions {
    pub fn with_allowlist(allowlist: KasAllowlist) -> Self {
        Self {
            allowlist,
            ..Self::default()
        }
    }
}

/// A verified envelope whose plaintext can be streamed.
#[derive(Debug)]
pub struct EnvelopeReader {
    envelope: Envelope,
    content_key: ContentKey,
    ranges: Vec<Range<usize>>,
    reports: Vec<AssertionReport>,
    cancel: CancellationToken,
}

impl EnvelopeReader {
    /// Parses and fully verifies `bytes`.
    pub async fn open(
        bytes: &[u8],
        unwrapper: &dyn KeyUnwrapper,
        options: ReaderOptions,
    ) -> TdfResult<Self> {
        let envelope = Envelope::from_bytes(bytes)?;
        let cancel = options.cancel.clone();

        for access in envelope.key_access() {
            options.allowlist.check(&access.url)?;
        }
        // Policy must decode before the key is released.
        envelope.policy()?;

        let content_key = unwrap_content_key(&envelope, unwrapper).await?;
        if cancel.is_cancelled() {
            return Err(TdfError::Cancelled);
        }

        let ranges = segment_ranges(&envelope)?;
        let declared_tags = envelope.declared_tags()?;
        let root = envelope.root_signature()?;
        let alg = envelope.integrity_algorithm();

        let work: Vec<(Arc<[u8]>, Vec<u8>)> = ranges
            .iter()
            .zip(&declared_tags)
            .map(|(range, tag)| (Arc::from(&envelope.payload[range.clone()]), tag.clone()))
            .collect();
        pipeline::verify_segments(work, &content_key, alg, options.parallelism, &cancel).await?;
        verify_aggregate(&declared_tags, &root, content_key.as_bytes(), alg)?;
        debug!(segments = ranges.len(), "segment integrity verified");

        let registry = match options.verification_keys {
            Some(registry) => registry,
            None => VerificationKeyRegistry::with_default(KeyMaterial::shared_secret(
                content_key.as_bytes().to_vec(),
            )?),
        };
        let reports = verify_assertions(
            envelope.assertions(),
            &registry,
            &root,
            VerificationPolicy {
                disabled: options.disable_assertion_verification,
                tolerate_failures: options.tolerate_assertion_failures,
            },
            &cancel,
        )?;

        Ok(Self {
            envelope,
            content_key,
            ranges,
            reports,
            cancel,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.envelope.manifest
    }

    pub fn mime_type(&self) -> &str {
        self.envelope.mime_type()
    }

    pub fn policy(&self) -> TdfResult<PolicyObject> {
        self.envelope.policy()
    }

    /// Per-assertion outcomes, in manifest order.
    pub fn assertion_reports(&self) -> &[AssertionReport] {
        &self.reports
    }

    /// Sequential plaintext stream over the segments.
    pub fn into_plaintext(self) -> PlaintextStream {
        PlaintextStream {
            envelope: self.envelope,
            content_key: self.content_key,
            ranges: self.ranges,
            next_segment: 0,
            buffer: Vec::new(),
            position: 0,
            cancel: self.cancel,
        }
    }

    /// Decrypts the whole payload.
    pub fn read_to_vec(self) -> TdfResult<Vec<u8>> {
        let mut stream = self.into_plaintext();
        let mut out = Vec::new();
        while stream.fill()? {
            out.extend_from_slice(&stream.buffer);
        }
        Ok(out)
    }
}

async fn unwrap_content_key(
    envelope: &Envelope,
    unwrapper: &dyn KeyUnwrapper,
) -> TdfResult<ContentKey> {
    let policy_b64 = &envelope.manifest.encryption_information.policy;
    let mut last_err = TdfError::WrappingKeyUnavailable;
    for access in envelope.key_access() {
        match unwrapper.unwrap_key(access).await {
            Ok(key) => {
                if !verify_policy_binding(&key, policy_b64, &access.policy_binding.hash)? {
                    return Err(TdfError::PolicyBindingMismatch);
                }
                debug!(kas_uri = %access.url, "content key unwrapped");
                return Ok(key);
            }
            Err(e) => {
                warn!(kas_uri = %access.url, "key unwrap failed: {e}");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

fn segment_ranges(envelope: &Envelope) -> TdfResult<Vec<Range<usize>>> {
    let mut ranges = Vec::with_capacity(envelope.segment_infos().len());
    let mut offset = 0usize;
    for segment in envelope.segments()? {
        ranges.push(offset..offset + segment.len());
        offset += segment.len();
    }
    Ok(ranges)
}

/// Plaintext stream that decrypts one segment at a time, in order.
pub struct PlaintextStream {
    envelope: Envelope,
    content_key: ContentKey,
    ranges: Vec<Range<usize>>,
    next_segment: usize,
    buffer: Vec<u8>,
    position: usize,
    cancel: CancellationToken,
}

impl PlaintextStream {
    fn fill(&mut self) -> TdfResult<bool> {
        let index = self.next_segment;
        let Some(range) = self.ranges.get(index).cloned() else {
            return Ok(false);
        };
        if self.cancel.is_cancelled() {
            return Err(TdfError::Cancelled);
        }

        let plaintext = decrypt_segment(&self.content_key, &self.envelope.payload[range])?;
        let declared = self.envelope.segment_infos()[index].segment_size;
        if plaintext.len() as u64 != declared {
            return Err(TdfError::MalformedEnvelope(format!(
                "segment {index} decrypted to {} bytes, manifest declares {declared}",
                plaintext.len()
            )));
        }

        self.buffer = plaintext;
        self.position = 0;
        self.next_segment += 1;
        Ok(true)
    }
}

impl Read for PlaintextStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.position >= self.buffer.len() {
            if !self.fill().map_err(io::Error::other)? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.buffer.len() - self.position);
        buf[..n].copy_from_slice(&self.buffer[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}
