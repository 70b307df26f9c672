//! Capability probe.

/// Capabilities this SDK implements.
pub const SUPPORTED: &[&str] = &[
    "assertions",
    "assertion_verification",
    "autoconfigure",
    "kasallowlist",
    "connectrpc",
];

/// Whether the named capability is supported.
pub fn supports(name: &str) -> bool {
    SUPPORTED.contains(&name)
}
