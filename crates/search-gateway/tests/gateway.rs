//! End-to-end request handling against mocked key, tenant and backend services

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::{EMAIL, ISSUER, Upstreams, admin_hash, claims_for, now_secs, sign};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, ResponseTemplate};

const SEARCH_PATH: &str = "/api/v1/_elastic/_msearch";

fn search_body() -> String {
    let header = json!({"index": "logs"});
    let query = json!({
        "query": {"bool": {"filter": [
            {"range": {"": {"gte": "now-1h"}}}
        ]}},
        "aggs": {"over_time": {"date_histogram": {"field": "", "fixed_interval": "1m"}}}
    });
    format!("{header}\n{query}\n")
}

fn search_request(token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(SEARCH_PATH)
        .header("x-grafana-id", token)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from(search_body()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_probe_without_credential_never_reaches_backend() {
    let upstreams = Upstreams::start().await;
    upstreams.backend_ok(&json!({})).await;
    let config = upstreams.config().build().unwrap();
    let app = upstreams.app(&config).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/_elastic")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"status": "ok", "authenticated": false})
    );
    assert!(Upstreams::received(&upstreams.backend).await.is_empty());
}

#[tokio::test]
async fn test_search_is_scoped_and_forwarded() {
    let upstreams = Upstreams::start().await;
    upstreams
        .tenant_record(
            EMAIL,
            &json!({
                "name": "LU-0001",
                "owner": "Administrator",
                "company": "acme",
                "region": null,
                "team": "ops"
            }),
        )
        .await;
    upstreams.backend_ok(&json!({"responses": []})).await;
    let config = upstreams.config().build().unwrap();
    let app = upstreams.app(&config).await;

    let token = sign(&claims_for(EMAIL));
    let response = app.oneshot(search_request(&token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"responses": []}));

    let received = Upstreams::received(&upstreams.backend).await;
    assert_eq!(received.len(), 1);
    let forwarded = &received[0];
    assert_eq!(forwarded.url.path(), SEARCH_PATH);
    assert!(forwarded.headers.get("x-grafana-id").is_none());

    let text = String::from_utf8(forwarded.body.clone()).unwrap();
    let lines: Vec<&str> = text.split('\n').collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], json!({"index": "logs"}).to_string());
    assert_eq!(lines[2], "");

    let query: Value = serde_json::from_str(lines[1]).unwrap();
    let filter = query["query"]["bool"]["filter"].as_array().unwrap();
    assert_eq!(filter.len(), 3);
    assert_eq!(filter[0], json!({"range": {"time": {"gte": "now-1h"}}}));
    assert!(filter.contains(&json!({"term": {"company": "acme"}})));
    assert!(filter.contains(&json!({"term": {"team": "ops"}})));
    assert_eq!(
        query["aggs"]["over_time"]["date_histogram"]["field"],
        json!("time")
    );
}

#[tokio::test]
async fn test_tenant_service_receives_caller_token() {
    let upstreams = Upstreams::start().await;
    upstreams.tenant_record(EMAIL, &json!({"company": "acme"})).await;
    upstreams.backend_ok(&json!({})).await;
    let config = upstreams.config().build().unwrap();
    let app = upstreams.app(&config).await;

    let token = sign(&claims_for(EMAIL));
    let response = app.oneshot(search_request(&token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let lookups = Upstreams::received(&upstreams.tenants).await;
    assert_eq!(lookups.len(), 1);
    assert_eq!(
        lookups[0].headers.get("x-grafana-id").unwrap().to_str().unwrap(),
        token
    );
}

#[tokio::test]
async fn test_tenant_record_is_cached_across_requests() {
    let upstreams = Upstreams::start().await;
    upstreams.tenant_record(EMAIL, &json!({"company": "acme"})).await;
    upstreams.backend_ok(&json!({})).await;
    let config = upstreams.config().build().unwrap();
    let app = upstreams.app(&config).await;

    let token = sign(&claims_for(EMAIL));
    for _ in 0..3 {
        let response = app.clone().oneshot(search_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(Upstreams::received(&upstreams.tenants).await.len(), 1);
    assert_eq!(Upstreams::received(&upstreams.backend).await.len(), 3);
}

#[tokio::test]
async fn test_expired_token_is_unauthorized() {
    let upstreams = Upstreams::start().await;
    upstreams.backend_ok(&json!({})).await;
    let config = upstreams.config().build().unwrap();
    let app = upstreams.app(&config).await;

    let mut claims = claims_for(EMAIL);
    claims["exp"] = json!(now_secs() - 60);
    let response = app.oneshot(search_request(&sign(&claims))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(Upstreams::received(&upstreams.tenants).await.is_empty());
    assert!(Upstreams::received(&upstreams.backend).await.is_empty());
}

#[tokio::test]
async fn test_unconfigured_issuer_fetches_no_keys() {
    let upstreams = Upstreams::start().await;
    let config = upstreams.config().build().unwrap();
    let app = upstreams.app(&config).await;
    let fetches_after_load = Upstreams::received(&upstreams.keys).await.len();

    let mut claims = claims_for(EMAIL);
    claims["iss"] = json!("https://rogue.example.com");
    let response = app.oneshot(search_request(&sign(&claims))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        Upstreams::received(&upstreams.keys).await.len(),
        fetches_after_load
    );
}

#[tokio::test]
async fn test_blocked_path_is_forbidden() {
    let upstreams = Upstreams::start().await;
    upstreams.tenant_record(EMAIL, &json!({"company": "acme"})).await;
    upstreams.backend_ok(&json!({})).await;
    let config = upstreams.config().build().unwrap();
    let app = upstreams.app(&config).await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri("/api/v1/indexes/logs")
                .header("x-grafana-id", sign(&claims_for(EMAIL)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(Upstreams::received(&upstreams.tenants).await.is_empty());
    assert!(Upstreams::received(&upstreams.backend).await.is_empty());
}

#[tokio::test]
async fn test_dot_segment_paths_to_admin_surface_are_forbidden() {
    let upstreams = Upstreams::start().await;
    upstreams.tenant_record(EMAIL, &json!({"company": "acme"})).await;
    upstreams.backend_ok(&json!({})).await;
    let config = upstreams.config().build().unwrap();
    let app = upstreams.app(&config).await;
    let token = sign(&claims_for(EMAIL));

    for path in [
        "/api/v1/_elastic/../indexes/logs",
        "/api/v1/_elastic/%2e%2e/indexes",
        "/api/v1/_elastic/%2E%2E/cluster",
        "/api/v1/./splits/abc",
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri(path)
                    .header("x-grafana-id", &token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{path}");
    }

    assert!(Upstreams::received(&upstreams.tenants).await.is_empty());
    assert!(Upstreams::received(&upstreams.backend).await.is_empty());
}

#[tokio::test]
async fn test_search_through_dot_segments_is_scoped() {
    let upstreams = Upstreams::start().await;
    upstreams.tenant_record(EMAIL, &json!({"company": "acme"})).await;
    upstreams.backend_ok(&json!({"responses": []})).await;
    let config = upstreams.config().build().unwrap();
    let app = upstreams.app(&config).await;
    let token = sign(&claims_for(EMAIL));

    for path in [
        "/api/v1/_elastic/logs/../_msearch",
        "/api/v1/_elastic/logs/%2e%2e/_msearch",
        "/api/v1/_elastic/_msearch/x/..",
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(path)
                    .header("x-grafana-id", &token)
                    .header(header::CONTENT_TYPE, "application/x-ndjson")
                    .body(Body::from(search_body()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }

    let received = Upstreams::received(&upstreams.backend).await;
    assert_eq!(received.len(), 3);
    assert_eq!(received[0].url.path(), SEARCH_PATH);
    assert_eq!(received[1].url.path(), SEARCH_PATH);
    assert_eq!(received[2].url.path(), "/api/v1/_elastic/_msearch/");

    for forwarded in &received {
        let text = String::from_utf8(forwarded.body.clone()).unwrap();
        let query: Value = serde_json::from_str(text.split('\n').nth(1).unwrap()).unwrap();
        let filter = query["query"]["bool"]["filter"].as_array().unwrap();
        assert!(filter.contains(&json!({"term": {"company": "acme"}})));
    }
}

#[tokio::test]
async fn test_tenant_service_failure_is_upstream_error() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&upstreams.tenants)
        .await;
    upstreams.backend_ok(&json!({})).await;
    let config = upstreams.config().build().unwrap();
    let app = upstreams.app(&config).await;

    let response = app
        .clone()
        .oneshot(search_request(&sign(&claims_for(EMAIL))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(Upstreams::received(&upstreams.backend).await.is_empty());

    // Failures are not cached
    let response = app
        .oneshot(search_request(&sign(&claims_for(EMAIL))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(Upstreams::received(&upstreams.tenants).await.len(), 2);
}

#[tokio::test]
async fn test_admin_bypass_forwards_unscoped() {
    let upstreams = Upstreams::start().await;
    upstreams.backend_ok(&json!({"responses": []})).await;
    let config = upstreams
        .config()
        .admin_username("admin".to_string())
        .admin_password_hash(admin_hash("s3cret"))
        .build()
        .unwrap();
    let app = upstreams.app(&config).await;

    let basic = format!("Basic {}", STANDARD.encode("admin:s3cret"));
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(SEARCH_PATH)
                .header(header::AUTHORIZATION, basic)
                .body(Body::from(search_body()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(Upstreams::received(&upstreams.tenants).await.is_empty());

    let received = Upstreams::received(&upstreams.backend).await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body, search_body().into_bytes());
    assert!(received[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_non_search_request_forwarded_verbatim() {
    let upstreams = Upstreams::start().await;
    upstreams.tenant_record(EMAIL, &json!({"company": "acme"})).await;
    upstreams.backend_ok(&json!({"version": "0.8"})).await;
    let config = upstreams.config().build().unwrap();
    let app = upstreams.app(&config).await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/v1/version?verbose=true")
                .header("x-grafana-id", sign(&claims_for(EMAIL)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"version": "0.8"}));

    let received = Upstreams::received(&upstreams.backend).await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url.path(), "/api/v1/version");
    assert_eq!(received[0].url.query(), Some("verbose=true"));
}

#[tokio::test]
async fn test_backend_status_is_relayed() {
    let upstreams = Upstreams::start().await;
    upstreams.tenant_record(EMAIL, &json!({"company": "acme"})).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "bad query"})))
        .mount(&upstreams.backend)
        .await;
    let config = upstreams.config().build().unwrap();
    let app = upstreams.app(&config).await;

    let response = app
        .oneshot(search_request(&sign(&claims_for(EMAIL))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({"message": "bad query"}));
}

#[tokio::test]
async fn test_startup_fails_when_keys_unavailable() {
    use std::sync::Arc;
    use std::time::Duration;

    use search_gateway::auth::{HttpKeySource, IssuerConfig, KeyRegistry};
    use url::Url;

    let upstreams = Upstreams::start().await;
    let missing = Url::parse(&format!("{}/missing", upstreams.keys.uri())).unwrap();
    let source = Arc::new(HttpKeySource::new(Duration::from_secs(2)).unwrap());

    let result = KeyRegistry::load(
        vec![IssuerConfig::new(ISSUER, missing)],
        source,
        Duration::from_secs(2),
    )
    .await;

    let err = result.unwrap_err();
    assert!(err.is_key_load_error());
}
