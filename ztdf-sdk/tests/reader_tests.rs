mod support;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use pretty_assertions::assert_eq;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use support::{TRUSTED_KAS, build_bytes, build_envelope, unwrapper, wrapping_key};
use tokio_util::sync::CancellationToken;
use ztdf_crypto::ContentKey;
use ztdf_sdk::manifest::KeyAccessObject;
use ztdf_sdk::{
    Envelope, EnvelopeReader, FinalizeOptions, KasAllowlist, KeyUnwrapper, ReaderOptions,
    TdfError, TdfResult,
};

fn trusted() -> ReaderOptions {
    ReaderOptions::with_allowlist(KasAllowlist::from_origins([TRUSTED_KAS]))
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Byte offset of segment `index` within the payload.
fn segment_offset(envelope: &Envelope, index: usize) -> usize {
    envelope.segment_infos()[..index]
        .iter()
        .map(|s| s.encrypted_segment_size as usize)
        .sum()
}

fn flip_declared_tag(envelope: &mut Envelope, index: usize) {
    let segment = &mut envelope
        .manifest
        .encryption_information
        .integrity_information
        .segments[index];
    let mut tag = BASE64.decode(&segment.hash).unwrap();
    tag[0] ^= 0x01;
    segment.hash = BASE64.encode(tag);
}

/// Counts unwrap attempts and delegates to the local KAS key.
struct CountingUnwrapper(AtomicUsize);

#[async_trait]
impl KeyUnwrapper for CountingUnwrapper {
    async fn unwrap_key(&self, access: &KeyAccessObject) -> TdfResult<ContentKey> {
        self.0.fetch_add(1, Ordering::SeqCst);
        unwrapper().unwrap_key(access).await
    }
}

async fn open(bytes: &[u8], options: ReaderOptions) -> TdfResult<EnvelopeReader> {
    EnvelopeReader::open(bytes, &unwrapper(), options).await
}

#[tokio::test]
async fn round_trip_multi_segment() {
    support::init_tracing();
    let plaintext = payload(1000);
    let bytes = build_bytes(&plaintext, 64).await;

    let reader = open(&bytes, trusted()).await.unwrap();
    assert_eq!(reader.manifest().encryption_information.integrity_information.segments.len(), 16);
    assert_eq!(reader.read_to_vec().unwrap(), plaintext);
}

#[tokio::test]
async fn round_trip_empty_payload() {
    let bytes = build_bytes(b"", 64).await;
    let reader = open(&bytes, trusted()).await.unwrap();
    assert!(reader.read_to_vec().unwrap().is_empty());
}

#[tokio::test]
async fn stream_reads_in_small_chunks() {
    let plaintext = payload(300);
    let bytes = build_bytes(&plaintext, 100).await;
    let mut stream = open(&bytes, trusted()).await.unwrap().into_plaintext();

    let mut out = Vec::new();
    let mut buf = [0u8; 7];
    loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, plaintext);
}

#[tokio::test]
async fn flipped_ciphertext_fails_at_that_segment() {
    let plaintext = payload(300);
    for index in 0..3 {
        let mut envelope = build_envelope(
            &plaintext,
            100,
            FinalizeOptions::new(wrapping_key(TRUSTED_KAS)),
        )
        .await;
        let offset = segment_offset(&envelope, index) + 20;
        envelope.payload[offset] ^= 0xff;

        let err = open(&envelope.to_bytes().unwrap(), trusted()).await.unwrap_err();
        assert!(
            matches!(err, TdfError::SegmentIntegrityMismatch { index: i } if i == index),
            "segment {index}: {err}"
        );
    }
}

#[tokio::test]
async fn flipped_tag_fails_at_that_segment() {
    let mut envelope = build_envelope(
        &payload(300),
        100,
        FinalizeOptions::new(wrapping_key(TRUSTED_KAS)),
    )
    .await;
    flip_declared_tag(&mut envelope, 2);

    let err = open(&envelope.to_bytes().unwrap(), trusted()).await.unwrap_err();
    assert!(matches!(err, TdfError::SegmentIntegrityMismatch { index: 2 }));
}

#[tokio::test]
async fn reordered_segments_fail_the_aggregate() {
    // Each segment still matches its own tag; only the order changed.
    let mut envelope = build_envelope(
        &payload(200),
        100,
        FinalizeOptions::new(wrapping_key(TRUSTED_KAS)),
    )
    .await;
    let len = envelope.segment_infos()[0].encrypted_segment_size as usize;
    let (first, second) = envelope.payload.split_at_mut(len);
    first.swap_with_slice(second);
    envelope
        .manifest
        .encryption_information
        .integrity_information
        .segments
        .swap(0, 1);

    let err = open(&envelope.to_bytes().unwrap(), trusted()).await.unwrap_err();
    assert!(matches!(err, TdfError::AggregateIntegrityMismatch));
}

#[tokio::test]
async fn tampered_root_signature_fails_the_aggregate() {
    let mut envelope = build_envelope(
        &payload(200),
        100,
        FinalizeOptions::new(wrapping_key(TRUSTED_KAS)),
    )
    .await;
    let root = &mut envelope
        .manifest
        .encryption_information
        .integrity_information
        .root_signature;
    let mut sig = BASE64.decode(&root.sig).unwrap();
    sig[5] ^= 0x80;
    root.sig = BASE64.encode(sig);

    let err = open(&envelope.to_bytes().unwrap(), trusted()).await.unwrap_err();
    assert!(matches!(err, TdfError::AggregateIntegrityMismatch));
}

#[tokio::test]
async fn untrusted_origin_fails_before_key_access_and_integrity() {
    let mut envelope = build_envelope(
        &payload(200),
        100,
        FinalizeOptions::new(wrapping_key("https://evil.example/kas")),
    )
    .await;
    envelope.payload[10] ^= 0xff;
    let bytes = envelope.to_bytes().unwrap();

    let unwrapper = CountingUnwrapper(AtomicUsize::new(0));
    let err = EnvelopeReader::open(&bytes, &unwrapper, trusted())
        .await
        .unwrap_err();
    assert!(
        matches!(err, TdfError::UntrustedKeyAccessOrigin(ref o) if o == "https://evil.example/kas")
    );
    assert_eq!(unwrapper.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wildcard_allowlist_passes_origin_check() {
    let plaintext = payload(50);
    let bytes = build_envelope(
        &plaintext,
        100,
        FinalizeOptions::new(wrapping_key("https://evil.example/kas")),
    )
    .await
    .to_bytes()
    .unwrap();

    let options = ReaderOptions::with_allowlist(KasAllowlist::parse("*").unwrap());
    let reader = open(&bytes, options).await.unwrap();
    assert_eq!(reader.read_to_vec().unwrap(), plaintext);
}

#[tokio::test]
async fn default_options_trust_nothing() {
    let bytes = build_bytes(b"data", 16).await;
    let err = open(&bytes, ReaderOptions::default()).await.unwrap_err();
    assert!(matches!(err, TdfError::UntrustedKeyAccessOrigin(_)));
}

#[tokio::test]
async fn swapped_policy_fails_the_binding() {
    let mut envelope = build_envelope(
        b"data",
        16,
        FinalizeOptions::new(wrapping_key(TRUSTED_KAS)),
    )
    .await;
    let other = build_envelope(
        b"data",
        16,
        FinalizeOptions::new(wrapping_key(TRUSTED_KAS)),
    )
    .await;
    envelope.manifest.encryption_information.policy =
        other.manifest.encryption_information.policy.clone();

    let err = open(&envelope.to_bytes().unwrap(), trusted()).await.unwrap_err();
    assert!(matches!(err, TdfError::PolicyBindingMismatch));
}

#[tokio::test]
async fn wrong_kas_key_cannot_unwrap() {
    let mut envelope = build_envelope(
        b"data",
        16,
        FinalizeOptions::new(wrapping_key(TRUSTED_KAS)),
    )
    .await;
    let other = build_envelope(
        b"data",
        16,
        FinalizeOptions::new(wrapping_key(TRUSTED_KAS)),
    )
    .await;
    // Another envelope's wrapped key unwraps to a different content key.
    envelope.manifest.encryption_information.key_access[0].wrapped_key =
        other.key_access()[0].wrapped_key.clone();

    let err = open(&envelope.to_bytes().unwrap(), trusted()).await.unwrap_err();
    assert!(matches!(err, TdfError::PolicyBindingMismatch));
}

#[tokio::test]
async fn garbage_is_malformed() {
    let err = open(b"not an envelope at all", trusted()).await.unwrap_err();
    assert!(matches!(err, TdfError::MalformedEnvelope(_)));
}

#[tokio::test]
async fn cancelled_read_returns_cancelled() {
    let bytes = build_bytes(&payload(300), 100).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let options = ReaderOptions {
        cancel,
        ..trusted()
    };

    let err = open(&bytes, options).await.unwrap_err();
    assert!(matches!(err, TdfError::Cancelled));
}

#[tokio::test]
async fn single_worker_gives_same_result() {
    let plaintext = payload(500);
    let bytes = build_bytes(&plaintext, 50).await;
    let options = ReaderOptions {
        parallelism: 1,
        ..trusted()
    };
    let reader = open(&bytes, options).await.unwrap();
    assert_eq!(reader.read_to_vec().unwrap(), plaintext);
}
