//! Forge client and retrieval against a mock forge.

use commit_scan::config::{parse_config, RetrieveConfig};
use commit_scan::github::{ForgeClient, ForgeError};
use commit_scan::progress::NoProgress;
use commit_scan::retrieve::{checkpoint_key, run_retrieve, RetrieveOptions};
use commit_scan::{db, store};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn retrieve_config(server: &MockServer) -> RetrieveConfig {
    RetrieveConfig {
        org: "acme".to_string(),
        api_base: server.uri(),
        token_env: "CSCAN_TEST_TOKEN_NOT_SET".to_string(),
        per_page: 2,
        page_delay_ms: 0,
        max_retries: 2,
        timeout_secs: 5,
    }
}

fn client(server: &MockServer) -> ForgeClient {
    ForgeClient::new(&retrieve_config(server))
        .unwrap()
        .with_token(Some("t0ken".to_string()))
        .with_backoff_unit(Duration::from_millis(10))
}

fn commit(sha: &str, message: &str) -> serde_json::Value {
    json!({
        "sha": sha,
        "commit": {
            "message": message,
            "committer": {"name": "Jo", "email": "jo@example.com", "date": "2024-01-02T00:00:00Z"}
        }
    })
}

async fn mount_page(server: &MockServer, url: &str, page: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(url))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn repositories_are_paginated_until_empty_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme/repos"))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "2"))
        .and(header("authorization", "Bearer t0ken"))
        .and(header("accept", "application/vnd.github.v3+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "zeta"}, {"name": "alpha"}])))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/orgs/acme/repos", "2", json!([{"name": "mid"}, {"id": 9}])).await;
    mount_page(&server, "/orgs/acme/repos", "3", json!([])).await;

    let names = client(&server).list_repositories().await.unwrap();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/core/commits"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/repos/acme/core/commits", "1", json!([commit("c1", "first")])).await;
    mount_page(&server, "/repos/acme/core/commits", "2", json!([])).await;

    let pages = client(&server).list_commits("core", None).await;
    assert!(pages.incomplete.is_none());
    assert_eq!(pages.commits, vec![commit("c1", "first")]);
}

#[tokio::test]
async fn exhausted_rate_limit_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme/repos"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .set_body_string("API rate limit exceeded"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/orgs/acme/repos", "1", json!([{"name": "core"}])).await;
    mount_page(&server, "/orgs/acme/repos", "2", json!([])).await;

    let names = client(&server).list_repositories().await.unwrap();
    assert_eq!(names, vec!["core"]);
}

#[tokio::test]
async fn client_errors_fail_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme/repos"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).list_repositories().await.unwrap_err();
    match err {
        ForgeError::Status { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Not Found");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn empty_repository_yields_no_commits() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/empty/commits"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"message": "Git Repository is empty."})),
        )
        .mount(&server)
        .await;

    let pages = client(&server).list_commits("empty", None).await;
    assert!(pages.commits.is_empty());
    assert!(pages.incomplete.is_none());
}

#[tokio::test]
async fn failed_page_keeps_earlier_commits() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/repos/acme/core/commits",
        "1",
        json!([commit("c2", "second"), commit("c1", "first")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/core/commits"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(422))
        .expect(1)
        .mount(&server)
        .await;

    let pages = client(&server).list_commits("core", None).await;
    assert_eq!(pages.commits.len(), 2);
    assert!(matches!(
        pages.incomplete,
        Some(ForgeError::Status { status: 422, .. })
    ));
}

#[tokio::test]
async fn since_is_forwarded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/core/commits"))
        .and(query_param("since", "2024-01-01T00:00:00Z"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([commit("c9", "new")])))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/repos/acme/core/commits", "2", json!([])).await;

    let pages = client(&server)
        .list_commits("core", Some("2024-01-01T00:00:00Z"))
        .await;
    assert_eq!(pages.commits.len(), 1);
}

#[tokio::test]
async fn retrieve_writes_store_and_checkpoint() {
    let server = MockServer::start().await;

    mount_page(&server, "/orgs/acme/repos", "1", json!([{"name": "zeta"}, {"name": "alpha"}])).await;
    mount_page(&server, "/orgs/acme/repos", "2", json!([])).await;
    mount_page(
        &server,
        "/repos/acme/zeta/commits",
        "1",
        json!([commit("z2", "add coin"), commit("z1", "init")]),
    )
    .await;
    mount_page(&server, "/repos/acme/zeta/commits", "2", json!([])).await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/alpha/commits"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let config = parse_config(&format!(
        r#"
[db]
path = "{}/store.sqlite"

[retrieve]
org = "acme"
api_base = "{}"
token_env = "CSCAN_TEST_TOKEN_NOT_SET"
page_delay_ms = 0

[search]
keywords = ["coin"]
"#,
        tmp.path().display(),
        server.uri()
    ))
    .unwrap();

    run_retrieve(&config, &RetrieveOptions::default(), &NoProgress)
        .await
        .unwrap();

    let pool = db::connect(&config).await.unwrap();
    let groups = store::load_groups(&pool).await.unwrap();
    let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["zeta", "alpha"]);
    let shas: Vec<&str> = groups[0].records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(shas, vec!["z2", "z1"]);
    assert!(groups[1].records.is_empty());

    let checkpoint = store::get_checkpoint(&pool, &checkpoint_key("acme"))
        .await
        .unwrap();
    assert!(checkpoint.is_some());
    pool.close().await;
}
