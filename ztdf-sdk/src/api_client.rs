//! HTTP client for the platform: well-known configuration, KAS public key
//! and attribute lookup.
//!
//! Every call honours the configured timeout and is attempted exactly once.
//! When client credentials are configured, a bearer token is fetched with
//! the OAuth2 client-credentials grant and cached for the client's lifetime.

use crate::config::TdfConfig;
use crate::error::{TdfError, TdfResult};
use crate::types::*;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const WELL_KNOWN_PATH: &str = "/.well-known/opentdf-configuration";
const KAS_PUBLIC_KEY_PATH: &str = "/kas/v2/kas_public_key";
const ATTRIBUTE_VALUES_PATH: &str =
    "/policy.attributes.AttributesService/GetAttributeValuesByFqns";

/// HTTP client for the platform endpoints.
pub struct PlatformClient {
    client: Client,
    config: TdfConfig,
    token: Arc<RwLock<Option<String>>>,
}

impl PlatformClient {
    pub fn new(config: TdfConfig) -> TdfResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.tls_no_verify)
            .build()?;

        Ok(Self {
            client,
            config,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn config(&self) -> &TdfConfig {
        &self.config
    }

    // ── Auth ──

    async fn bearer_token(&self) -> TdfResult<Option<String>> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(Some(token));
        }
        let Some(endpoint) = self.config.resolved_token_endpoint() else {
            return Ok(None);
        };
        let client_id = self.config.client_id.clone().unwrap_or_default();
        let client_secret = self.config.client_secret.clone().unwrap_or_default();

        debug!("requesting client-credentials token from {endpoint}");
        let resp: TokenResponse = self
            .client
            .post(&endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| TdfError::Api(format!("token request failed: {e}")))?
            .json()
            .await?;

        *self.token.write().await = Some(resp.access_token.clone());
        Ok(Some(resp.access_token))
    }

    async fn authorize(&self, request: RequestBuilder) -> TdfResult<RequestBuilder> {
        Ok(match self.bearer_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> TdfResult<T> {
        let url = format!("{}{}", self.config.platform_base(), path);
        let request = self.authorize(self.client.get(&url).query(query)).await?;
        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TdfError::Api(format!("GET {url} returned {status}")));
        }
        Ok(resp.json().await?)
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> TdfResult<T> {
        let url = format!("{}{}", self.config.platform_base(), path);
        let request = self.authorize(self.client.post(&url).json(body)).await?;
        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TdfError::Api(format!("POST {url} returned {status}")));
        }
        Ok(resp.json().await?)
    }

    // ── Key access ──

    /// Fetches the platform's well-known configuration.
    pub async fn well_known_configuration(&self) -> TdfResult<WellKnownConfiguration> {
        self.get_json(WELL_KNOWN_PATH, &[]).await
    }

    /// Fetches the KAS's current public key for `algorithm`.
    pub async fn kas_public_key(&self, algorithm: &str) -> TdfResult<KasPublicKeyResponse> {
        self.get_json(KAS_PUBLIC_KEY_PATH, &[("algorithm", algorithm)])
            .await
    }

    // ── Policy ──

    /// Batched lookup of attribute values by fully-qualified name.
    pub async fn attribute_values_by_fqns(
        &self,
        fqns: &[String],
    ) -> TdfResult<HashMap<String, FqnAttributeValue>> {
        let resp: AttributeValuesResponse = self
            .post_json(ATTRIBUTE_VALUES_PATH, &AttributeValuesRequest { fqns })
            .await?;
        Ok(resp.fqn_attribute_values)
    }
}
