//! Policy binding: attribute resolution and the embedded policy object.
//!
//! `AttributeAuthority` is the narrow seam to whatever service resolves
//! attribute FQNs; `PlatformClient` implements it over the platform's
//! attribute service. Resolution is all-or-nothing: duplicates are
//! rejected before the lookup, and any FQN the authority cannot resolve
//! fails the whole call.

use crate::api_client::PlatformClient;
use crate::error::{TdfError, TdfResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

/// A resolved attribute value bound into an envelope's policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAttributeValue {
    /// Fully-qualified name the value was resolved from.
    pub fqn: String,
    /// Opaque identifier assigned by the authority.
    pub id: String,
    /// Display value (e.g. "secret").
    pub value: String,
    /// Owning attribute's display name, when the authority supplies one.
    pub attribute_name: Option<String>,
}

/// Resolves attribute FQNs into policy values.
#[async_trait]
pub trait AttributeAuthority: Send + Sync {
    /// Single batched lookup. An FQN missing from the map, or mapped to
    /// `None`, is unresolved.
    async fn lookup(&self, fqns: &[String])
    -> TdfResult<HashMap<String, Option<PolicyAttributeValue>>>;
}

#[async_trait]
impl AttributeAuthority for PlatformClient {
    async fn lookup(
        &self,
        fqns: &[String],
    ) -> TdfResult<HashMap<String, Option<PolicyAttributeValue>>> {
        let found = self.attribute_values_by_fqns(fqns).await?;
        Ok(found
            .into_iter()
            .map(|(fqn, entry)| {
                let attribute_name = entry
                    .attribute
                    .as_ref()
                    .map(|a| a.name.clone())
                    .filter(|n| !n.is_empty());
                let value = entry.value.map(|v| PolicyAttributeValue {
                    fqn: fqn.clone(),
                    id: v.id,
                    value: v.value,
                    attribute_name,
                });
                (fqn, value)
            })
            .collect())
    }
}

/// Splits a comma-separated FQN list, trimming entries and dropping empties.
pub fn parse_fqn_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves `fqns` through `authority`, preserving input order.
pub async fn resolve_attributes(
    authority: &dyn AttributeAuthority,
    fqns: &[String],
) -> TdfResult<Vec<PolicyAttributeValue>> {
    let mut seen = HashSet::with_capacity(fqns.len());
    for fqn in fqns {
        if !seen.insert(fqn.as_str()) {
            return Err(TdfError::DuplicateAttribute(fqn.clone()));
        }
    }
    if fqns.is_empty() {
        return Ok(Vec::new());
    }

    debug!(count = fqns.len(), "resolving attribute values");
    let mut found = authority.lookup(fqns).await?;

    fqns.iter()
        .map(|fqn| match found.remove(fqn) {
            Some(Some(value)) => Ok(value),
            _ => Err(TdfError::AttributeResolutionFailed(fqn.clone())),
        })
        .collect()
}

/// Policy object embedded (base64) in the manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyObject {
    pub uuid: String,
    pub body: PolicyBody,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyBody {
    #[serde(default)]
    pub data_attributes: Vec<DataAttribute>,
    #[serde(default)]
    pub dissem: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataAttribute {
    pub attribute: String,
}

impl PolicyObject {
    /// Builds a fresh policy over the resolved values.
    pub fn new(values: &[PolicyAttributeValue]) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            body: PolicyBody {
                data_attributes: values
                    .iter()
                    .map(|v| DataAttribute {
                        attribute: v.fqn.clone(),
                    })
                    .collect(),
                dissem: Vec::new(),
            },
        }
    }

    /// FQNs bound into this policy.
    pub fn attribute_fqns(&self) -> Vec<&str> {
        self.body
            .data_attributes
            .iter()
            .map(|a| a.attribute.as_str())
            .collect()
    }
}
