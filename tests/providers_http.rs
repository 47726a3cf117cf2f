// tests/providers_http.rs
//
// PageAdapter against a local mock server: status classification, markup checks,
// and recovery through the retry wrapper.

use std::time::Duration;

use pricing_intel::ingest::providers::page::{PageAdapter, TierSpec};
use pricing_intel::ingest::retry::retry;
use pricing_intel::{RetryPolicy, SourceAdapter, SourceFailure};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<html><body>
<h1>Pricing</h1>
<table><tr><td>Starter</td><td>&#36;5 / month</td></tr></table>
</body></html>"#;

fn tiers() -> Vec<TierSpec> {
    vec![
        TierSpec::monthly("Starter", 5.0, "", "30k chars/month", "  Commercial   license "),
        TierSpec::usage("API", "$0.30 / 1k chars", "Pay as you go", "All voices"),
    ]
}

fn adapter(server: &MockServer) -> PageAdapter {
    PageAdapter::new("Acme", &format!("{}/pricing", server.uri()), "pricing", tiers())
        .with_timeout(5)
}

#[tokio::test]
async fn page_with_marker_yields_tier_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pricing"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .mount(&server)
        .await;

    let recs = adapter(&server).fetch("Acme").await.expect("fetch");
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].source, "Acme");
    assert_eq!(recs[0].variant, "Starter");
    assert_eq!(recs[0].monthly_price, Some(5.0));
    assert_eq!(recs[0].usage_price, None);
    assert_eq!(recs[0].features, "Commercial license");
    assert_eq!(recs[1].usage_price.as_deref(), Some("$0.30 / 1k chars"));
    assert!(recs[1].reference_url.ends_with("/pricing"));
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = adapter(&server).fetch("Acme").await.unwrap_err();
    assert!(err.transient, "{err}");
    assert!(err.cause.contains("503"));
}

#[tokio::test]
async fn rate_limit_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    assert!(adapter(&server).fetch("Acme").await.unwrap_err().transient);
}

#[tokio::test]
async fn not_found_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = adapter(&server).fetch("Acme").await.unwrap_err();
    assert!(!err.transient);
    assert_eq!(err.source_id, "Acme");
}

#[tokio::test]
async fn missing_marker_is_markup_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Maintenance</html>"))
        .mount(&server)
        .await;

    let err = adapter(&server).fetch("Acme").await.unwrap_err();
    assert!(!err.transient);
    assert!(err.cause.contains("markup mismatch"), "{}", err.cause);
}

#[tokio::test]
async fn refused_connection_is_transient() {
    let server = MockServer::start().await;
    let url = format!("{}/pricing", server.uri());
    drop(server);

    let a = PageAdapter::new("Acme", &url, "pricing", tiers()).with_timeout(2);
    let err = a.fetch("Acme").await.unwrap_err();
    assert!(err.transient, "{err}");
}

#[tokio::test]
async fn retry_recovers_after_two_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let a = adapter(&server);
    let policy = RetryPolicy::new(3, Duration::from_millis(10));
    let out = retry("Acme", &policy, || a.fetch("Acme")).await.expect("recovered");
    assert_eq!(out.attempts, 3);
    assert_eq!(out.value.len(), 2);
}

#[tokio::test]
async fn retry_stops_on_first_permanent_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let a = adapter(&server);
    let policy = RetryPolicy::new(3, Duration::from_millis(10));
    let err = retry("Acme", &policy, || a.fetch("Acme")).await.unwrap_err();
    assert!(matches!(err, SourceFailure::NonTransient { attempts: 1, .. }));
}
