//! Compact JWS signing and verification for assertion bindings.

use crate::error::{CryptoError, CryptoResult};
use crate::key::KeyMaterial;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Signs `claims` as a compact JWS with the algorithm implied by `key`.
pub fn sign<T: Serialize>(claims: &T, key: &KeyMaterial) -> CryptoResult<String> {
    let (alg, encoding_key) = match key {
        KeyMaterial::SharedSecret(secret) => (Algorithm::HS256, EncodingKey::from_secret(secret)),
        KeyMaterial::RsaPrivate(private) => {
            let der = private
                .to_pkcs1_der()
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
            (Algorithm::RS256, EncodingKey::from_rsa_der(der.as_bytes()))
        }
        KeyMaterial::RsaPublic(_) => {
            return Err(CryptoError::InvalidKey(
                "RS256 signing requires a private key".to_string(),
            ));
        }
    };

    jsonwebtoken::encode(&Header::new(alg), claims, &encoding_key)
        .map_err(|e| CryptoError::Signature(format!("jws sign failed: {e}")))
}

/// Verifies a compact JWS and returns its claims.
///
/// The token header must carry the algorithm implied by `key`. No
/// registered claims (`exp`, `aud`, ...) are required or checked.
pub fn verify<T: DeserializeOwned>(token: &str, key: &KeyMaterial) -> CryptoResult<T> {
    let (alg, decoding_key) = match key {
        KeyMaterial::SharedSecret(secret) => (Algorithm::HS256, DecodingKey::from_secret(secret)),
        KeyMaterial::RsaPrivate(_) | KeyMaterial::RsaPublic(_) => {
            let public = key
                .rsa_public_key()
                .ok_or_else(|| CryptoError::InvalidKey("not an RSA key".to_string()))?;
            let n = URL_SAFE_NO_PAD.encode(public.n().to_bytes_be());
            let e = URL_SAFE_NO_PAD.encode(public.e().to_bytes_be());
            let decoding_key = DecodingKey::from_rsa_components(&n, &e)
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
            (Algorithm::RS256, decoding_key)
        }
    };

    let mut validation = Validation::new(alg);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_aud = false;

    jsonwebtoken::decode::<T>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| CryptoError::Signature(format!("jws verify failed: {e}")))
}
