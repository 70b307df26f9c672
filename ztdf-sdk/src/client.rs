//! High-level encrypt/decrypt over the platform.
//!
//! `TdfClient` wires the platform client into the writer and reader:
//! wrapping-key resolution and attribute lookup happen before any segment
//! is sealed, so a resolution failure never produces output.

use crate::api_client::PlatformClient;
use crate::assertions::AssertionConfig;
use crate::config::TdfConfig;
use crate::error::{TdfError, TdfResult};
use crate::key_resolution::{KeyResolutionStrategy, KeyResolver};
use crate::policy::{AttributeAuthority, resolve_attributes};
use crate::reader::{EnvelopeReader, KeyUnwrapper, ReaderOptions};
use crate::writer::{EnvelopeWriter, FinalizeOptions, WriterConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use ztdf_crypto::split;

/// Per-call encryption options.
#[derive(Clone, Debug, Default)]
pub struct EncryptOptions {
    /// Attribute FQNs to bind into the policy.
    pub attributes: Vec<String>,
    pub assertions: Vec<AssertionConfig>,
    pub mime_type: Option<String>,
    pub cancel: CancellationToken,
}

/// Envelope client bound to one platform.
pub struct TdfClient {
    api: Arc<PlatformClient>,
    resolver: KeyResolver,
    authority: Arc<dyn AttributeAuthority>,
}

impl TdfClient {
    /// Client with the platform's default key resolution order and its
    /// attribute service as the authority.
    pub fn new(config: TdfConfig) -> TdfResult<Self> {
        let api = Arc::new(PlatformClient::new(config)?);
        Ok(Self {
            resolver: KeyResolver::platform_default(api.clone()),
            authority: api.clone(),
            api,
        })
    }

    /// Replaces the key resolution strategies.
    pub fn with_resolver(mut self, strategies: Vec<Box<dyn KeyResolutionStrategy>>) -> Self {
        self.resolver = KeyResolver::new(strategies);
        self
    }

    /// Replaces the attribute authority.
    pub fn with_authority(mut self, authority: Arc<dyn AttributeAuthority>) -> Self {
        self.authority = authority;
        self
    }

    pub fn config(&self) -> &TdfConfig {
        self.api.config()
    }

    /// Encrypts `plaintext` into serialized envelope bytes.
    pub async fn encrypt(&self, plaintext: &[u8], options: EncryptOptions) -> TdfResult<Vec<u8>> {
        let wrapping_key = self.resolver.resolve().await?;
        let attributes = resolve_attributes(self.authority.as_ref(), &options.attributes).await?;

        let config = WriterConfig::from(self.config());
        let mut writer = EnvelopeWriter::new(config.clone()).with_cancellation(options.cancel.clone());
        for (index, segment) in split(plaintext, config.segment_size)?.into_iter().enumerate() {
            if options.cancel.is_cancelled() {
                return Err(TdfError::Cancelled);
            }
            writer.write_segment(index, segment)?;
        }

        let mut finalize = FinalizeOptions::new(wrapping_key)
            .with_attributes(attributes)
            .with_assertions(options.assertions);
        finalize.mime_type = options.mime_type;

        let envelope = writer.finalize(finalize).await?;
        let bytes = envelope.to_bytes()?;
        info!(bytes = bytes.len(), "encrypted payload");
        Ok(bytes)
    }

    /// Opens and verifies envelope bytes.
    pub async fn open(
        &self,
        bytes: &[u8],
        unwrapper: &dyn KeyUnwrapper,
        options: ReaderOptions,
    ) -> TdfResult<EnvelopeReader> {
        EnvelopeReader::open(bytes, unwrapper, options).await
    }

    /// Opens, verifies and decrypts envelope bytes.
    pub async fn decrypt(
        &self,
        bytes: &[u8],
        unwrapper: &dyn KeyUnwrapper,
        options: ReaderOptions,
    ) -> TdfResult<Vec<u8>> {
        self.open(bytes, unwrapper, options).await?.read_to_vec()
    }
}
