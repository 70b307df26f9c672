//! KAS trust allowlist.
//!
//! Origins are matched exactly. The wildcard must be requested explicitly;
//! an empty allowlist trusts nothing.

use crate::error::{TdfError, TdfResult};
use std::collections::BTreeSet;

/// Token that disables the allowlist.
pub const WILDCARD: &str = "*";

/// Set of KAS origins a reader will trust.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KasAllowlist {
    /// Explicit opt-out: every origin is trusted.
    TrustAll,
    /// Only these origins are trusted.
    Origins(BTreeSet<String>),
}

impl Default for KasAllowlist {
    fn default() -> Self {
        KasAllowlist::Origins(BTreeSet::new())
    }
}

impl KasAllowlist {
    pub fn trust_all() -> Self {
        KasAllowlist::TrustAll
    }

    pub fn from_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KasAllowlist::Origins(origins.into_iter().map(Into::into).collect())
    }

    /// Parses a comma-separated list. A lone `*` means trust all; `*` mixed
    /// with origins is rejected.
    pub fn parse(input: &str) -> TdfResult<Self> {
        let entries: Vec<&str> = input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        match entries.as_slice() {
            [WILDCARD] => Ok(KasAllowlist::TrustAll),
            _ if entries.contains(&WILDCARD) => Err(TdfError::Config(format!(
                "wildcard '{WILDCARD}' must be the only allowlist entry"
            ))),
            _ => Ok(Self::from_origins(entries)),
        }
    }

    pub fn is_trusted(&self, origin: &str) -> bool {
        match self {
            KasAllowlist::TrustAll => true,
            KasAllowlist::Origins(origins) => origins.contains(origin),
        }
    }

    /// Fails with `UntrustedKeyAccessOrigin` unless `origin` is trusted.
    pub fn check(&self, origin: &str) -> TdfResult<()> {
        if self.is_trusted(origin) {
            Ok(())
        } else {
            Err(TdfError::UntrustedKeyAccessOrigin(origin.to_string()))
        }
    }
}
