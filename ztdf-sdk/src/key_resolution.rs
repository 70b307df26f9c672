//! Wrapping-key resolution.
//!
//! Resolution is an ordered list of strategies evaluated in sequence; the
//! first success wins. A failing strategy is logged and the next one is
//! tried. When every strategy fails the result is `WrappingKeyUnavailable`.
//!
//! The default order is the platform's well-known base key, then the KAS
//! public-key endpoint with the algorithm pinned by configuration.

use crate::api_client::PlatformClient;
use crate::error::{TdfError, TdfResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use ztdf_crypto::{RsaPublicKey, parse_public_key_pem};

/// Identifies the KAS and key protecting an envelope's content key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappingKeyReference {
    /// KAS origin recorded in the key access object.
    pub kas_uri: String,
    pub kid: String,
    pub algorithm: String,
    pub public_key_pem: String,
}

impl WrappingKeyReference {
    pub fn public_key(&self) -> TdfResult<RsaPublicKey> {
        Ok(parse_public_key_pem(&self.public_key_pem)?)
    }
}

/// One way of obtaining a wrapping key.
#[async_trait]
pub trait KeyResolutionStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn resolve(&self) -> TdfResult<WrappingKeyReference>;
}

/// Reads the base key from the platform's well-known configuration.
pub struct WellKnownBaseKey {
    api: Arc<PlatformClient>,
}

impl WellKnownBaseKey {
    pub fn new(api: Arc<PlatformClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl KeyResolutionStrategy for WellKnownBaseKey {
    fn name(&self) -> &'static str {
        "well-known base key"
    }

    async fn resolve(&self) -> TdfResult<WrappingKeyReference> {
        let config = self.api.well_known_configuration().await?;
        let base = config
            .configuration
            .base_key
            .ok_or_else(|| TdfError::Api("well-known configuration has no base_key".to_string()))?;

        Ok(WrappingKeyReference {
            kas_uri: base.kas_uri,
            kid: base.public_key.kid,
            algorithm: base.public_key.algorithm,
            public_key_pem: base.public_key.pem,
        })
    }
}

/// Queries the KAS directly for its current public key.
pub struct KasPublicKey {
    api: Arc<PlatformClient>,
}

impl KasPublicKey {
    pub fn new(api: Arc<PlatformClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl KeyResolutionStrategy for KasPublicKey {
    fn name(&self) -> &'static str {
        "KAS public key"
    }

    async fn resolve(&self) -> TdfResult<WrappingKeyReference> {
        let config = self.api.config();
        let algorithm = config.kas_key_algorithm.clone();
        let resp = self.api.kas_public_key(&algorithm).await?;

        Ok(WrappingKeyReference {
            kas_uri: config.kas_url(),
            kid: resp.kid,
            algorithm,
            public_key_pem: resp.public_key,
        })
    }
}

/// Ordered, first-success-wins key resolver.
pub struct KeyResolver {
    strategies: Vec<Box<dyn KeyResolutionStrategy>>,
}

impl KeyResolver {
    pub fn new(strategies: Vec<Box<dyn KeyResolutionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Well-known base key first, KAS public key as fallback.
    pub fn platform_default(api: Arc<PlatformClient>) -> Self {
        Self::new(vec![
            Box::new(WellKnownBaseKey::new(api.clone())),
            Box::new(KasPublicKey::new(api)),
        ])
    }

    /// Tries each strategy in order. A returned key has a parseable RSA
    /// public key; an unparseable one counts as that strategy failing.
    pub async fn resolve(&self) -> TdfResult<WrappingKeyReference> {
        for strategy in &self.strategies {
            let attempt = match strategy.resolve().await {
                Ok(reference) => reference.public_key().map(|_| reference),
                Err(e) => Err(e),
            };
            match attempt {
                Ok(reference) => {
                    debug!(
                        strategy = strategy.name(),
                        kas_uri = %reference.kas_uri,
                        kid = %reference.kid,
                        "resolved wrapping key"
                    );
                    return Ok(reference);
                }
                Err(e) => warn!(strategy = strategy.name(), "key resolution failed: {e}"),
            }
        }
        Err(TdfError::WrappingKeyUnavailable)
    }
}
