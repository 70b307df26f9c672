//! Assertions: typed metadata statements bound to an envelope.
//!
//! An assertion's identifying fields and statement are canonicalized
//! (compact JSON, keys sorted) and hashed with SHA-256. The binding is a
//! compact JWS over `{assertionHash, assertionSig}` where `assertionSig`
//! covers the envelope's root signature followed by that digest, so an
//! assertion cannot be lifted onto another payload.
//!
//! Verification resolves a key per assertion id, falling back to the
//! registry's default key. Each assertion is checked independently.

use crate::error::{TdfError, TdfResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use ztdf_crypto::{KeyMaterial, SigningAlgorithm, jws};

/// Binding method recorded for JWS-bound assertions.
pub const BINDING_METHOD_JWS: &str = "jws";

/// Opaque statement payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub format: String,
    #[serde(default)]
    pub schema: String,
    pub value: String,
}

/// An assertion as recorded in the manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub scope: String,
    pub applies_to_state: String,
    pub statement: Statement,
    pub binding: AssertionBinding,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionBinding {
    pub method: String,
    pub signature: String,
}

/// An assertion to attach at finalize time.
///
/// Without a signing key the assertion is bound with the envelope's
/// content key under HS256.
#[derive(Clone, Debug)]
pub struct AssertionConfig {
    pub id: String,
    pub kind: String,
    pub scope: String,
    pub applies_to_state: String,
    pub statement: Statement,
    pub signing_key: Option<KeyMaterial>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BindingClaims {
    assertion_hash: String,
    assertion_sig: String,
}

fn canonical_bytes(
    id: &str,
    kind: &str,
    scope: &str,
    applies_to_state: &str,
    statement: &Statement,
) -> TdfResult<Vec<u8>> {
    // Keys in lexicographic order; statement fields already are.
    let value = serde_json::json!({
        "appliesToState": applies_to_state,
        "id": id,
        "scope": scope,
        "statement": statement,
        "type": kind,
    });
    Ok(serde_json::to_vec(&value)?)
}

fn digest(canonical: &[u8]) -> Vec<u8> {
    Sha256::digest(canonical).to_vec()
}

fn binding_claims(canonical: &[u8], root_signature: &[u8]) -> BindingClaims {
    let hash = digest(canonical);
    let mut sig_input = Vec::with_capacity(root_signature.len() + hash.len());
    sig_input.extend_from_slice(root_signature);
    sig_input.extend_from_slice(&hash);
    BindingClaims {
        assertion_hash: hex::encode(&hash),
        assertion_sig: BASE64.encode(sig_input),
    }
}

impl AssertionConfig {
    fn canonical_bytes(&self) -> TdfResult<Vec<u8>> {
        canonical_bytes(
            &self.id,
            &self.kind,
            &self.scope,
            &self.applies_to_state,
            &self.statement,
        )
    }

    /// Signs this assertion for the envelope with `root_signature`.
    pub fn sign(&self, default_key: &KeyMaterial, root_signature: &[u8]) -> TdfResult<Assertion> {
        let key = self.signing_key.as_ref().unwrap_or(default_key);
        let claims = binding_claims(&self.canonical_bytes()?, root_signature);
        let signature = jws::sign(&claims, key)?;
        debug!(assertion_id = %self.id, alg = %key.algorithm(), "signed assertion");

        Ok(Assertion {
            id: self.id.clone(),
            kind: self.kind.clone(),
            scope: self.scope.clone(),
            applies_to_state: self.applies_to_state.clone(),
            statement: self.statement.clone(),
            binding: AssertionBinding {
                method: BINDING_METHOD_JWS.to_string(),
                signature,
            },
        })
    }
}

impl Assertion {
    fn canonical_bytes(&self) -> TdfResult<Vec<u8>> {
        canonical_bytes(
            &self.id,
            &self.kind,
            &self.scope,
            &self.applies_to_state,
            &self.statement,
        )
    }

    /// Verifies the binding against `key` and the envelope's root signature.
    pub fn verify(&self, key: &KeyMaterial, root_signature: &[u8]) -> TdfResult<()> {
        let failed = || TdfError::AssertionVerificationFailed(self.id.clone());

        if self.binding.method != BINDING_METHOD_JWS {
            return Err(failed());
        }
        let claims: BindingClaims = jws::verify(&self.binding.signature, key).map_err(|e| {
            debug!(assertion_id = %self.id, "assertion signature rejected: {e}");
            failed()
        })?;

        let expected = binding_claims(&self.canonical_bytes()?, root_signature);
        if claims.assertion_hash != expected.assertion_hash
            || claims.assertion_sig != expected.assertion_sig
        {
            return Err(failed());
        }
        Ok(())
    }
}

/// Verification keys by assertion id, plus an optional default.
#[derive(Clone, Debug, Default)]
pub struct VerificationKeyRegistry {
    default_key: Option<KeyMaterial>,
    keys: HashMap<String, KeyMaterial>,
}

impl VerificationKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(key: KeyMaterial) -> Self {
        Self {
            default_key: Some(key),
            keys: HashMap::new(),
        }
    }

    pub fn set_default(&mut self, key: KeyMaterial) {
        self.default_key = Some(key);
    }

    pub fn insert(&mut self, assertion_id: impl Into<String>, key: KeyMaterial) {
        self.keys.insert(assertion_id.into(), key);
    }

    /// Per-id key first, then the default.
    pub fn key_for(&self, assertion_id: &str) -> Option<&KeyMaterial> {
        self.keys.get(assertion_id).or(self.default_key.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.default_key.is_none() && self.keys.is_empty()
    }
}

/// Read-time result for one assertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssertionOutcome {
    Verified,
    /// Only produced when the reader tolerates per-assertion failures.
    VerificationFailed(String),
    VerificationSkipped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssertionReport {
    pub id: String,
    pub outcome: AssertionOutcome,
}

/// How the reader treats assertions.
#[derive(Clone, Copy, Debug, Default)]
pub struct VerificationPolicy {
    /// Skip verification entirely; every assertion is `VerificationSkipped`.
    pub disabled: bool,
    /// Record failures instead of failing the read.
    pub tolerate_failures: bool,
}

/// Verifies each assertion independently, in manifest order.
pub fn verify_assertions(
    assertions: &[Assertion],
    registry: &VerificationKeyRegistry,
    root_signature: &[u8],
    policy: VerificationPolicy,
    cancel: &CancellationToken,
) -> TdfResult<Vec<AssertionReport>> {
    let mut reports = Vec::with_capacity(assertions.len());
    for assertion in assertions {
        if cancel.is_cancelled() {
            return Err(TdfError::Cancelled);
        }
        let outcome = if policy.disabled {
            AssertionOutcome::VerificationSkipped
        } else {
            let result = match registry.key_for(&assertion.id) {
                Some(key) => assertion.verify(key, root_signature),
                None => Err(TdfError::AssertionKeyMissing(assertion.id.clone())),
            };
            match result {
                Ok(()) => AssertionOutcome::Verified,
                Err(e) if policy.tolerate_failures => {
                    debug!(assertion_id = %assertion.id, "tolerating assertion failure: {e}");
                    AssertionOutcome::VerificationFailed(e.to_string())
                }
                Err(e) => return Err(e),
            }
        };
        reports.push(AssertionReport {
            id: assertion.id.clone(),
            outcome,
        });
    }
    Ok(reports)
}

// ── JSON loading ──

#[derive(Deserialize)]
struct KeyJson {
    alg: String,
    key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssertionJson {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    scope: String,
    applies_to_state: String,
    statement: Statement,
    #[serde(default)]
    signing_key: Option<KeyJson>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryJson {
    #[serde(default)]
    default_key: Option<KeyJson>,
    #[serde(default)]
    keys: HashMap<String, KeyJson>,
}

/// Returns the file contents if `input` names an existing file, else `input`.
fn literal_or_file(input: &str) -> TdfResult<String> {
    let path = Path::new(input);
    if path.is_file() {
        Ok(std::fs::read_to_string(path)?)
    } else {
        Ok(input.to_string())
    }
}

fn key_context(context: String) -> impl FnOnce(TdfError) -> TdfError {
    move |err| match err {
        TdfError::KeyLoad(detail) => TdfError::KeyLoad(format!("{context}: {detail}")),
        other => other,
    }
}

/// Builds key material from an `{alg, key}` pair. RS256 keys may be a
/// PEM literal or a path to one; HS256 keys are the literal string bytes.
pub fn load_key(alg: &str, key: &str) -> TdfResult<KeyMaterial> {
    let alg: SigningAlgorithm = alg
        .parse()
        .map_err(|e: ztdf_crypto::CryptoError| TdfError::KeyLoad(e.to_string()))?;
    let material = match alg {
        SigningAlgorithm::Hs256 => KeyMaterial::from_parts(alg, key),
        SigningAlgorithm::Rs256 => KeyMaterial::from_parts(alg, &literal_or_file(key)?),
    };
    material.map_err(|e| TdfError::KeyLoad(e.to_string()))
}

/// Parses an assertion list from a JSON literal or a path to a JSON file.
pub fn load_assertion_configs(input: &str) -> TdfResult<Vec<AssertionConfig>> {
    let raw = literal_or_file(input)?;
    let entries: Vec<AssertionJson> = serde_json::from_str(&raw)?;

    entries
        .into_iter()
        .map(|entry| {
            let signing_key = match entry.signing_key {
                Some(k) if !k.key.is_empty() => Some(
                    load_key(&k.alg, &k.key)
                        .map_err(key_context(format!("signing key for assertion {}", entry.id)))?,
                ),
                _ => None,
            };
            Ok(AssertionConfig {
                id: entry.id,
                kind: entry.kind,
                scope: entry.scope,
                applies_to_state: entry.applies_to_state,
                statement: entry.statement,
                signing_key,
            })
        })
        .collect()
}

impl VerificationKeyRegistry {
    /// Parses `{defaultKey?, keys}` from a JSON literal or a path to a JSON file.
    pub fn load(input: &str) -> TdfResult<Self> {
        let raw = literal_or_file(input)?;
        let parsed: RegistryJson = serde_json::from_str(&raw)?;

        let mut registry = Self::new();
        if let Some(k) = parsed.default_key {
            let key = load_key(&k.alg, &k.key)
                .map_err(key_context("default verification key".to_string()))?;
            registry.set_default(key);
        }
        for (id, k) in parsed.keys {
            let key = load_key(&k.alg, &k.key)
                .map_err(key_context(format!("verification key for {id}")))?;
            registry.insert(id, key);
        }
        Ok(registry)
    }
}
