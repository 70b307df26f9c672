//! Wire types for the platform endpoints.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of `/.well-known/opentdf-configuration`.
///
/// Only the base key is read; other configuration keys are ignored.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WellKnownConfiguration {
    #[serde(default)]
    pub configuration: WellKnownBody,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WellKnownBody {
    #[serde(default)]
    pub base_key: Option<BaseKey>,
}

/// The platform's declared default wrapping key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BaseKey {
    pub kas_uri: String,
    pub public_key: BaseKeyPublicKey,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BaseKeyPublicKey {
    #[serde(default)]
    pub algorithm: String,
    #[serde(default)]
    pub kid: String,
    pub pem: String,
}

/// Response of `/kas/v2/kas_public_key`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KasPublicKeyResponse {
    pub public_key: String,
    #[serde(default)]
    pub kid: String,
}

/// Request body for `GetAttributeValuesByFqns`.
#[derive(Clone, Debug, Serialize)]
pub struct AttributeValuesRequest<'a> {
    pub fqns: &'a [String],
}

/// Response of `GetAttributeValuesByFqns`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValuesResponse {
    #[serde(default)]
    pub fqn_attribute_values: HashMap<String, FqnAttributeValue>,
}

/// One entry of the FQN lookup. `value` is absent when the attribute
/// exists but the requested value does not.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FqnAttributeValue {
    #[serde(default)]
    pub attribute: Option<AttributeRecord>,
    #[serde(default)]
    pub value: Option<ValueRecord>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AttributeRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fqn: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValueRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub fqn: String,
}

#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
}
