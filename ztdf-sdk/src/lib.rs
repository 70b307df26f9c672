//! Segmented, policy-bound data envelopes.
//!
//! Provides the write and read pipelines for ZTDF envelopes:
//! - Segment sealing with per-segment and aggregate integrity tags
//! - Wrapping-key resolution (well-known base key, KAS public key fallback)
//! - Attribute resolution into an embedded, key-bound policy
//! - Signed assertions with per-id verification keys
//! - KAS origin allowlist enforced before key access
//! - Platform HTTP client for the above

pub mod allowlist;
pub mod api_client;
pub mod assertions;
pub mod client;
pub mod config;
pub mod error;
pub mod features;
pub mod key_resolution;
pub mod manifest;
mod pipeline;
pub mod policy;
pub mod reader;
pub mod types;
pub mod writer;

pub use allowlist::KasAllowlist;
pub use assertions::{
    Assertion, AssertionConfig, AssertionOutcome, AssertionReport, Statement,
    VerificationKeyRegistry,
};
pub use client::{EncryptOptions, TdfClient};
pub use config::TdfConfig;
pub use error::{TdfError, TdfResult};
pub use key_resolution::{KeyResolver, WrappingKeyReference};
pub use manifest::{Envelope, Manifest};
pub use policy::{AttributeAuthority, PolicyAttributeValue, PolicyObject};
pub use reader::{EnvelopeReader, KeyUnwrapper, LocalRsaUnwrapper, ReaderOptions};
pub use writer::{EnvelopeWriter, FinalizeOptions, WriterConfig, WriterState};
pub use ztdf_crypto::{KeyMaterial, SigningAlgorithm};
