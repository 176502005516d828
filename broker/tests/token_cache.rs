use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rp_broker::TokenCache;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cache_for(server: &MockServer, margin_secs: u64) -> TokenCache {
    let endpoint =
        Url::parse(&format!("{}/oauth/token", server.uri())).expect("invalid token endpoint");
    TokenCache::new(
        reqwest::Client::new(),
        endpoint,
        "rp-broker",
        "s3cret",
        Duration::from_secs(margin_secs),
    )
}

fn token_response(token: &str, expires_in: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": token,
        "token_type": "Bearer",
        "expires_in": expires_in,
    }))
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let _ = tracing_subscriber::fmt::try_init();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=rp-broker"))
        .respond_with(token_response("tok-1", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(cache_for(&server, 120));
    let calls = (0..8).map(|_| {
        let cache = cache.clone();
        async move { cache.obtain_token().await }
    });

    for result in join_all(calls).await {
        assert_eq!(result.expect("token refresh failed"), "tok-1");
    }
}

#[tokio::test]
async fn token_inside_margin_is_refreshed_outside_is_reused() {
    let _ = tracing_subscriber::fmt::try_init();
    let server = MockServer::start().await;

    // First issue a token with less lifetime than the margin, then a
    // long-lived one.
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(token_response("tok-short", 60))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(token_response("tok-long", 180))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_for(&server, 120);

    // A fresh refresh hands out its token even when short-lived.
    assert_eq!(cache.obtain_token().await.expect("refresh failed"), "tok-short");
    // 60s of validity is inside the 120s margin, so this refreshes.
    assert_eq!(cache.obtain_token().await.expect("refresh failed"), "tok-long");
    // 180s is outside the margin; served from cache, no third request.
    assert_eq!(cache.obtain_token().await.expect("refresh failed"), "tok-long");
}

#[tokio::test]
async fn concurrent_callers_share_one_failure() {
    let _ = tracing_subscriber::fmt::try_init();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(cache_for(&server, 120));
    let calls = (0..8).map(|_| {
        let cache = cache.clone();
        async move { cache.obtain_token().await }
    });

    for result in join_all(calls).await {
        assert!(result.is_err());
    }
}

#[tokio::test]
async fn callers_after_a_failure_try_again() {
    let _ = tracing_subscriber::fmt::try_init();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(token_response("tok-1", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_for(&server, 120);

    assert!(cache.obtain_token().await.is_err());
    // The failure concluded before this call began, so it gets its own
    // attempt rather than the recorded outcome.
    assert_eq!(cache.obtain_token().await.expect("refresh failed"), "tok-1");
}
