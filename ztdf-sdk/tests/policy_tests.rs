use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use ztdf_sdk::api_client::PlatformClient;
use ztdf_sdk::policy::{AttributeAuthority, PolicyObject, parse_fqn_list, resolve_attributes};
use ztdf_sdk::{PolicyAttributeValue, TdfConfig, TdfError, TdfResult};

const ATTRIBUTES_PATH: &str = "/policy.attributes.AttributesService/GetAttributeValuesByFqns";

fn fqns(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn value_entry(id: &str, value: &str) -> serde_json::Value {
    serde_json::json!({
        "attribute": { "id": format!("attr-{id}"), "name": "classification", "fqn": "" },
        "value": { "id": id, "value": value, "fqn": "" }
    })
}

/// Authority that counts lookups and answers from a fixed table.
struct TableAuthority {
    table: HashMap<String, Option<PolicyAttributeValue>>,
    calls: AtomicUsize,
}

impl TableAuthority {
    fn new(entries: &[&str]) -> Self {
        let table = entries
            .iter()
            .map(|fqn| {
                let value = PolicyAttributeValue {
                    fqn: fqn.to_string(),
                    id: format!("id-{fqn}"),
                    value: fqn.rsplit('/').next().unwrap_or_default().to_string(),
                    attribute_name: None,
                };
                (fqn.to_string(), Some(value))
            })
            .collect();
        Self {
            table,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AttributeAuthority for TableAuthority {
    async fn lookup(
        &self,
        fqns: &[String],
    ) -> TdfResult<HashMap<String, Option<PolicyAttributeValue>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(fqns
            .iter()
            .filter_map(|f| self.table.get(f).map(|v| (f.clone(), v.clone())))
            .collect())
    }
}

#[test]
fn parse_fqn_list_trims_and_drops_empties() {
    assert_eq!(
        parse_fqn_list(" attr/a ,, attr/b,"),
        vec!["attr/a".to_string(), "attr/b".to_string()]
    );
    assert!(parse_fqn_list("").is_empty());
}

#[tokio::test]
async fn resolves_in_input_order() {
    let authority = TableAuthority::new(&["attr/a", "attr/b"]);
    let values = resolve_attributes(&authority, &fqns(&["attr/b", "attr/a"]))
        .await
        .unwrap();
    let order: Vec<&str> = values.iter().map(|v| v.fqn.as_str()).collect();
    assert_eq!(order, vec!["attr/b", "attr/a"]);
    assert_eq!(authority.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_fqn_fails_naming_it() {
    let authority = TableAuthority::new(&["attr/a"]);
    let err = resolve_attributes(&authority, &fqns(&["attr/a", "attr/b"]))
        .await
        .unwrap_err();
    assert!(matches!(err, TdfError::AttributeResolutionFailed(ref f) if f == "attr/b"));
}

#[tokio::test]
async fn duplicates_rejected_before_lookup() {
    let authority = TableAuthority::new(&["attr/a"]);
    let err = resolve_attributes(&authority, &fqns(&["attr/a", "attr/a"]))
        .await
        .unwrap_err();
    assert!(matches!(err, TdfError::DuplicateAttribute(ref f) if f == "attr/a"));
    assert_eq!(authority.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_input_skips_lookup() {
    let authority = TableAuthority::new(&[]);
    assert!(resolve_attributes(&authority, &[]).await.unwrap().is_empty());
    assert_eq!(authority.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn platform_lookup_maps_values() {
    let server = MockServer::start().await;
    let a = "https://example.com/attr/level/value/secret";
    Mock::given(method("POST"))
        .and(path(ATTRIBUTES_PATH))
        .and(body_json(serde_json::json!({ "fqns": [a] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "fqnAttributeValues": { a: value_entry("v-1", "secret") }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PlatformClient::new(TdfConfig::for_platform(server.uri())).unwrap();
    let values = resolve_attributes(&client, &fqns(&[a])).await.unwrap();

    assert_eq!(
        values,
        vec![PolicyAttributeValue {
            fqn: a.to_string(),
            id: "v-1".to_string(),
            value: "secret".to_string(),
            attribute_name: Some("classification".to_string()),
        }]
    );
}

#[tokio::test]
async fn platform_entry_without_value_is_unresolved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ATTRIBUTES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "fqnAttributeValues": {
                "attr/a": value_entry("v-a", "a"),
                "attr/b": { "attribute": { "id": "x", "name": "b", "fqn": "" } }
            }
        })))
        .mount(&server)
        .await;

    let client = PlatformClient::new(TdfConfig::for_platform(server.uri())).unwrap();
    let err = resolve_attributes(&client, &fqns(&["attr/a", "attr/b"]))
        .await
        .unwrap_err();
    assert!(matches!(err, TdfError::AttributeResolutionFailed(ref f) if f == "attr/b"));
}

#[tokio::test]
async fn platform_error_status_surfaces_as_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ATTRIBUTES_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = PlatformClient::new(TdfConfig::for_platform(server.uri())).unwrap();
    let err = resolve_attributes(&client, &fqns(&["attr/a"]))
        .await
        .unwrap_err();
    assert!(matches!(err, TdfError::Api(_)));
}

#[test]
fn policy_object_lists_bound_fqns() {
    let values = vec![PolicyAttributeValue {
        fqn: "attr/a".into(),
        id: "1".into(),
        value: "a".into(),
        attribute_name: None,
    }];
    let policy = PolicyObject::new(&values);
    assert_eq!(policy.attribute_fqns(), vec!["attr/a"]);

    let json = serde_json::to_value(&policy).unwrap();
    assert_eq!(json["body"]["dataAttributes"][0]["attribute"], "attr/a");
    assert_eq!(json["body"]["dissem"], serde_json::json!([]));
}
