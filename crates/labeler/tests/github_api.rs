//! Integration tests for the GitHub label store adapter against a mock API.

use labeler::github::{GitHubError, LabelLookup, LabelStore};
use labeler::GitHubClient;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client(server: &MockServer) -> GitHubClient {
    GitHubClient::with_base_url(
        server.uri(),
        "test-token".to_string(),
        "octo".to_string(),
        "demo".to_string(),
    )
    .unwrap()
}

#[tokio::test]
async fn get_label_returns_found_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/labels/bug"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "bug",
            "color": "FF0000",
            "description": "Something is broken"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lookup = client(&server).await.get_label("bug").await.unwrap();
    let LabelLookup::Found(record) = lookup else {
        panic!("expected Found");
    };
    assert_eq!(record.name, "bug");
    assert_eq!(record.color, "FF0000");
    assert_eq!(record.description.as_deref(), Some("Something is broken"));
}

#[tokio::test]
async fn get_label_404_is_not_found_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/labels/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;

    let lookup = client(&server).await.get_label("ghost").await.unwrap();
    assert_eq!(lookup, LabelLookup::NotFound);
}

#[tokio::test]
async fn get_label_encodes_slashes_in_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/labels/ci%2Fcd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "ci/cd",
            "color": "00FF00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lookup = client(&server).await.get_label("ci/cd").await.unwrap();
    assert!(matches!(lookup, LabelLookup::Found(record) if record.name == "ci/cd"));
}

#[tokio::test]
async fn get_label_server_error_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/labels/bug"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "Server Error"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).await.get_label("bug").await.unwrap_err();
    assert!(matches!(err, GitHubError::Api { status: 500, .. }));
}

#[tokio::test]
async fn rate_limit_403_is_a_typed_error() {
    let server = MockServer::start().await;
    let reset = chrono::Utc::now().timestamp() + 120;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/labels/bug"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", reset.to_string().as_str())
                .set_body_json(json!({"message": "API rate limit exceeded"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).await.get_label("bug").await.unwrap_err();
    let GitHubError::RateLimited { reset_in } = err else {
        panic!("expected RateLimited, got {err}");
    };
    assert!(reset_in.as_secs() <= 120);
    assert!(reset_in.as_secs() > 60);
}

#[tokio::test]
async fn create_label_posts_name_color_and_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/demo/labels"))
        .and(body_json(json!({
            "name": "docs",
            "color": "ABC123",
            "description": "Documentation changes"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "name": "docs",
            "color": "ABC123",
            "description": "Documentation changes"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = client(&server)
        .await
        .create_label("docs", "ABC123", Some("Documentation changes"))
        .await
        .unwrap();
    assert_eq!(record.name, "docs");
}

#[tokio::test]
async fn create_label_conflict_with_racing_creator_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/demo/labels"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Validation Failed",
            "errors": [{"resource": "Label", "code": "already_exists", "field": "name"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = client(&server)
        .await
        .create_label("docs", "ABC123", None)
        .await
        .unwrap();
    assert_eq!(record.name, "docs");
}

#[tokio::test]
async fn create_label_validation_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/demo/labels"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Validation Failed",
            "errors": [{"resource": "Label", "code": "invalid", "field": "color"}]
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .create_label("docs", "not-a-color", None)
        .await
        .unwrap_err();
    assert!(matches!(err, GitHubError::Api { status: 422, .. }));
}

#[tokio::test]
async fn add_labels_posts_the_label_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/demo/issues/42/labels"))
        .and(body_json(json!({"labels": ["bug", "ci/cd"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .await
        .add_labels(42, &["bug".to_string(), "ci/cd".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn add_labels_with_empty_list_makes_no_request() {
    let server = MockServer::start().await;
    // No mock mounted: any request would 404 and fail the call.
    client(&server).await.add_labels(42, &[]).await.unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn list_changed_files_returns_paths_in_api_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/pulls/7/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"filename": "src/index.ts"},
            {"filename": ".github/workflows/ci.yml"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let files = client(&server).await.list_changed_files(7).await.unwrap();
    assert_eq!(files, vec!["src/index.ts", ".github/workflows/ci.yml"]);
}

#[tokio::test]
async fn list_changed_files_pages_until_a_short_page() {
    let server = MockServer::start().await;

    let full_page: Vec<serde_json::Value> = (0..100)
        .map(|i| json!({"filename": format!("src/file_{i}.rs")}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/pulls/7/files"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(full_page)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/pulls/7/files"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"filename": "docs/readme.md"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let files = client(&server).await.list_changed_files(7).await.unwrap();
    assert_eq!(files.len(), 101);
    assert_eq!(files[0], "src/file_0.rs");
    assert_eq!(files[100], "docs/readme.md");
}

#[tokio::test]
async fn list_changed_files_failure_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/pulls/7/files"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;

    let err = client(&server).await.list_changed_files(7).await.unwrap_err();
    assert!(matches!(err, GitHubError::Api { status: 404, .. }));
}
