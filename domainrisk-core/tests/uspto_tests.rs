//! USPTO client tests against a mock HTTP server.

use serde_json::json;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use domainrisk_common::Error;
use domainrisk_core::uspto::{UsptoClient, UsptoConfig};

fn client_for(server: &MockServer) -> UsptoClient {
    UsptoClient::new(UsptoConfig {
        api_key: "test-key".to_string(),
        base_url: server.uri(),
        ..Default::default()
    })
    .unwrap()
}

fn search_body() -> serde_json::Value {
    json!({
        "results": [
            {
                "serialNumber": "111",
                "registrationNumber": "222",
                "markIdentification": "ACME",
                "markCurrentStatus": "LIVE",
                "markCurrentStatusCode": "700",
                "markCurrentStatusCategory": "LIVE Registration",
                "ownerName": "Acme Corp",
                "internationalClasses": ["009", "042"]
            },
            {
                "serialNumber": "333",
                "registrationNumber": "",
                "markIdentification": "ACME WIDGETS",
                "markCurrentStatus": "DEAD",
                "markCurrentStatusCode": "900",
                "markCurrentStatusCategory": "DEAD Application",
                "ownerName": "Widgets LLC",
                "internationalClasses": "009, 016"
            },
            {
                "serialNumber": "444",
                "registrationNumber": "",
                "markIdentification": "",
                "markCurrentStatus": "LIVE",
                "markCurrentStatusCode": "700",
                "markCurrentStatusCategory": "LIVE",
                "ownerName": "Empty Mark Co",
                "internationalClasses": null
            }
        ]
    })
}

#[tokio::test]
async fn lookup_splits_exact_and_similar_matches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("rows", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.lookup_exact("acme").await.unwrap();

    assert!(result.checked);
    assert_eq!(result.exact_matches.len(), 1);
    let exact = &result.exact_matches[0];
    assert_eq!(exact.mark, "ACME");
    assert!(exact.is_live);
    assert_eq!(exact.classes, vec!["009", "042"]);

    assert_eq!(result.similar.len(), 1);
    let similar = &result.similar[0];
    assert_eq!(similar.mark, "ACME WIDGETS");
    assert!(!similar.is_live);
    assert_eq!(similar.classes, vec!["009", "016"]);
}

#[tokio::test]
async fn lookup_results_are_cached_by_term() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let first = client.lookup_exact("ACME").await.unwrap();
    // same sanitized term, no second request (expect(1) verifies on drop)
    let second = client.lookup_exact(" acme ").await.unwrap();
    assert_eq!(first.exact_matches.len(), second.exact_matches.len());
}

#[tokio::test]
async fn empty_term_short_circuits_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.lookup_exact("   ").await.unwrap();
    assert!(!result.checked);
}

#[tokio::test]
async fn upstream_failure_is_typed_by_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.lookup_exact("acme").await.unwrap_err();
    assert!(matches!(err, Error::UpstreamStatus { status: 404, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.lookup_exact("acme").await.unwrap_err();
    assert!(err.is_transient());
}
