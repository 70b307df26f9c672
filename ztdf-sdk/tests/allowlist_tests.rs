use ztdf_sdk::{KasAllowlist, TdfError};

#[test]
fn empty_allowlist_trusts_nothing() {
    let allowlist = KasAllowlist::default();
    assert!(!allowlist.is_trusted("https://trusted.example/kas"));
    assert!(!allowlist.is_trusted(""));
}

#[test]
fn empty_string_parses_to_trust_nothing() {
    assert_eq!(KasAllowlist::parse("").unwrap(), KasAllowlist::default());
    assert_eq!(KasAllowlist::parse(" , ").unwrap(), KasAllowlist::default());
}

#[test]
fn parse_trims_entries() {
    let allowlist =
        KasAllowlist::parse(" https://a.example/kas ,https://b.example/kas").unwrap();
    assert!(allowlist.is_trusted("https://a.example/kas"));
    assert!(allowlist.is_trusted("https://b.example/kas"));
    assert!(!allowlist.is_trusted("https://c.example/kas"));
}

#[test]
fn matching_is_exact() {
    let allowlist = KasAllowlist::from_origins(["https://trusted.example/kas"]);
    assert!(!allowlist.is_trusted("https://trusted.example/kas/"));
    assert!(!allowlist.is_trusted("https://trusted.example"));
    assert!(!allowlist.is_trusted("HTTPS://TRUSTED.EXAMPLE/KAS"));
}

#[test]
fn lone_wildcard_trusts_all() {
    let allowlist = KasAllowlist::parse("*").unwrap();
    assert_eq!(allowlist, KasAllowlist::TrustAll);
    assert!(allowlist.is_trusted("https://anything.example/kas"));
}

#[test]
fn wildcard_mixed_with_origins_is_rejected() {
    let err = KasAllowlist::parse("https://a.example/kas,*").unwrap_err();
    assert!(matches!(err, TdfError::Config(_)));
}

#[test]
fn check_names_the_untrusted_origin() {
    let allowlist = KasAllowlist::from_origins(["https://trusted.example/kas"]);
    let err = allowlist.check("https://evil.example/kas").unwrap_err();
    assert!(
        matches!(err, TdfError::UntrustedKeyAccessOrigin(ref o) if o == "https://evil.example/kas")
    );
    assert!(allowlist.check("https://trusted.example/kas").is_ok());
}
