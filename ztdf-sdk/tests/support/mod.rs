//! Shared helpers: a cached KAS keypair and envelope builders.

#![allow(dead_code)]

use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::rand_core::OsRng;
use std::sync::OnceLock;
use ztdf_sdk::writer::{EnvelopeWriter, FinalizeOptions, WriterConfig};
use ztdf_sdk::{Envelope, LocalRsaUnwrapper, WrappingKeyReference};

pub const TRUSTED_KAS: &str = "https://trusted.example/kas";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ztdf_sdk=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// KAS keypair shared by every test in the binary.
pub fn kas_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 2048).unwrap())
}

pub fn kas_public_pem() -> String {
    kas_key()
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap()
}

pub fn wrapping_key(kas_uri: &str) -> WrappingKeyReference {
    WrappingKeyReference {
        kas_uri: kas_uri.to_string(),
        kid: "r1".to_string(),
        algorithm: "rsa:2048".to_string(),
        public_key_pem: kas_public_pem(),
    }
}

pub fn unwrapper() -> LocalRsaUnwrapper {
    LocalRsaUnwrapper::new(kas_key().clone())
}

pub fn writer_config(segment_size: usize) -> WriterConfig {
    WriterConfig {
        segment_size,
        ..WriterConfig::default()
    }
}

/// Seals `plaintext` in `segment_size` chunks and finalizes with `options`.
pub async fn build_envelope(
    plaintext: &[u8],
    segment_size: usize,
    options: FinalizeOptions,
) -> Envelope {
    let mut writer = EnvelopeWriter::new(writer_config(segment_size));
    for (index, chunk) in plaintext.chunks(segment_size).enumerate() {
        writer.write_segment(index, chunk).unwrap();
    }
    writer.finalize(options).await.unwrap()
}

pub async fn build_bytes(plaintext: &[u8], segment_size: usize) -> Vec<u8> {
    build_envelope(
        plaintext,
        segment_size,
        FinalizeOptions::new(wrapping_key(TRUSTED_KAS)),
    )
    .await
    .to_bytes()
    .unwrap()
}
