//! Envelope SDK configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default plaintext segment size (2 MiB).
pub const DEFAULT_SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Configuration for the platform client and the envelope pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TdfConfig {
    /// Base URL of the platform (e.g., "https://platform.example.com").
    pub platform_endpoint: String,

    /// OAuth2 client id for client-credentials auth. Unauthenticated when unset.
    pub client_id: Option<String>,

    /// OAuth2 client secret.
    pub client_secret: Option<String>,

    /// Token endpoint override. Defaults to `{platform_endpoint}/auth/token`.
    pub token_endpoint: Option<String>,

    /// Timeout applied to every network call (seconds). Calls are never retried.
    pub request_timeout_secs: u64,

    /// Accept invalid TLS certificates (local test platforms only).
    pub tls_no_verify: bool,

    /// Plaintext bytes per segment.
    pub segment_size: usize,

    /// Key algorithm requested from the KAS public-key endpoint.
    pub kas_key_algorithm: String,

    /// Payload MIME type used when the caller does not supply one.
    pub default_mime_type: String,

    /// Maximum concurrent segment tag/verify workers.
    pub parallelism: usize,
}

impl Default for TdfConfig {
    fn default() -> Self {
        Self {
            platform_endpoint: "http://localhost:8080".to_string(),
            client_id: None,
            client_secret: None,
            token_endpoint: None,
            request_timeout_secs: 30,
            tls_no_verify: false,
            segment_size: DEFAULT_SEGMENT_SIZE,
            kas_key_algorithm: "rsa:2048".to_string(),
            default_mime_type: "application/octet-stream".to_string(),
            parallelism: 4,
        }
    }
}

impl TdfConfig {
    /// Creates a config pointing at `platform_endpoint` with defaults elsewhere.
    pub fn for_platform(platform_endpoint: impl Into<String>) -> Self {
        Self {
            platform_endpoint: platform_endpoint.into(),
            ..Self::default()
        }
    }

    /// Platform endpoint without a trailing slash.
    pub fn platform_base(&self) -> &str {
        self.platform_endpoint.trim_end_matches('/')
    }

    /// Origin of the platform's KAS.
    pub fn kas_url(&self) -> String {
        format!("{}/kas", self.platform_base())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolved token endpoint, if client credentials are configured.
    pub fn resolved_token_endpoint(&self) -> Option<String> {
        self.client_id.as_ref()?;
        Some(
            self.token_endpoint
                .clone()
                .unwrap_or_else(|| format!("{}/auth/token", self.platform_base())),
        )
    }

    /// Worker limit, never below one.
    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.max(1)
    }
}
