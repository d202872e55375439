//! Integration tests for the API client's retry and rate-limit handling.
//!
//! Each test points a client at a local mock server and checks how a response
//! class turns into a fetch outcome, and how many requests that took.

use core::time::Duration;
use issue_miner_lib::mining::{ApiClient, ClientConfig, Fetch, RetryPolicy, SilentProgress};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    let config = ClientConfig {
        base_url: server.uri(),
        retry: RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        },
        max_rate_limit_wait: Duration::from_secs(5),
        ..ClientConfig::default()
    };
    ApiClient::new(config, Arc::new(SilentProgress)).expect("client")
}

fn found(fetch: Fetch<Vec<u8>>) -> Vec<u8> {
    match fetch {
        Fetch::Found(bytes) => bytes,
        Fetch::Missing => panic!("expected a body, got Missing"),
        Fetch::Failed(e) => panic!("expected a body, got {e:#}"),
    }
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/foo/bar"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/foo/bar"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"stargazers_count": 500}"#))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let body = found(client.get_bytes("/repos/foo/bar").await);
    assert_eq!(body, br#"{"stargazers_count": 500}"#);

    // The retry stays inside the one call.
    assert_eq!(client.requests_sent(), 1);
    assert_eq!(server.received_requests().await.map_or(0, |r| r.len()), 2);
}

#[tokio::test]
async fn test_persistent_server_error_fails_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/foo/bar"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let fetch = client(&server).get_bytes("/repos/foo/bar").await;
    assert!(matches!(fetch, Fetch::Failed(_)));
}

#[tokio::test]
async fn test_not_found_is_missing_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/gone/away"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetch = client(&server).get_bytes("/repos/gone/away").await;
    assert!(matches!(fetch, Fetch::Missing));
}

#[tokio::test]
async fn test_other_client_errors_fail_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/foo/bar/issues/42"))
        .respond_with(ResponseTemplate::new(422))
        .expect(1)
        .mount(&server)
        .await;

    let fetch = client(&server).get_bytes("/repos/foo/bar/issues/42").await;
    assert!(matches!(fetch, Fetch::Failed(_)));
}

#[tokio::test]
async fn test_too_many_requests_honours_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/foo/bar"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/foo/bar"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let _ = found(client(&server).get_bytes("/repos/foo/bar").await);
}

#[tokio::test]
async fn test_exhausted_rate_limit_pauses_until_reset() {
    let server = MockServer::start().await;
    let reset = chrono::Utc::now().timestamp() + 1;
    Mock::given(method("GET"))
        .and(path("/repos/foo/bar"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", reset.to_string().as_str()),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/foo/bar"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let _ = found(client.get_bytes("/repos/foo/bar").await);
    assert_eq!(client.requests_sent(), 2);
}

#[tokio::test]
async fn test_forbidden_without_rate_limit_headers_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/secret/repo"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let fetch = client(&server).get_bytes("/repos/secret/repo").await;
    assert!(matches!(fetch, Fetch::Failed(_)));
}

#[tokio::test]
async fn test_listing_walks_pages_until_empty() {
    let server = MockServer::start().await;
    for (page, body) in [("1", r#"[{"number": 1}, {"number": 2}]"#), ("2", r#"[{"number": 3}]"#), ("3", "[]")] {
        Mock::given(method("GET"))
            .and(path("/repos/foo/bar/pulls"))
            .and(query_param("state", "all"))
            .and(query_param("per_page", "100"))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let Fetch::Found(items) = client(&server).get_all_pages("/repos/foo/bar/pulls?state=all").await else {
        panic!("expected the listing");
    };
    let numbers: Vec<u64> = items.iter().filter_map(|item| item["number"].as_u64()).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_listing_stops_at_last_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/foo/bar/issues/42/timeline"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", r#"<https://api.example.com/x?page=1>; rel="first""#)
                .set_body_string(r#"[{"event": "labeled"}]"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let Fetch::Found(items) = client(&server).get_all_pages("/repos/foo/bar/issues/42/timeline").await else {
        panic!("expected the listing");
    };
    assert_eq!(items.len(), 1);
}
