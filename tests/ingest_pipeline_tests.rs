use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mailsink::api::GmailApi;
use mailsink::db::EmailStorage;
use mailsink::google_oauth::{GoogleOauthService, TokenStore};
use mailsink::router::{SinkState, build_http_client, sink_router};
use mailsink::service::run_ingestion;

async fn memory_storage() -> EmailStorage {
    // One connection, or every pool checkout would see its own empty
    // in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    let storage = EmailStorage::new(pool);
    storage.init_schema().await.expect("init schema");
    storage
}

fn mock_gmail(server: &MockServer) -> GmailApi {
    let base = Url::parse(&format!("{}/", server.uri())).expect("mock base url");
    GmailApi::with_base_url(build_http_client(), base)
}

fn scratch_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("mailsink-{}-{}-{}", name, std::process::id(), nanos));
    path
}

fn oauth_service(credentials_path: PathBuf) -> Arc<GoogleOauthService> {
    Arc::new(GoogleOauthService::with_paths(
        build_http_client(),
        credentials_path,
        TokenStore::new(scratch_path("token.json")),
    ))
}

fn message_fixture() -> serde_json::Value {
    json!({
        "id": "m1",
        "threadId": "t1",
        "labelIds": ["INBOX", "UNREAD"],
        "snippet": "hello there",
        "historyId": "4711",
        "internalDate": "1700000000000",
        "sizeEstimate": 2048,
        "payload": {
            "mimeType": "multipart/mixed",
            "headers": [
                { "name": "from", "value": "sender@example.com" },
                { "name": "Subject", "value": "greetings" }
            ],
            "parts": [
                { "mimeType": "text/plain", "body": { "data": URL_SAFE_NO_PAD.encode("A") } },
                { "mimeType": "image/png", "body": { "data": URL_SAFE_NO_PAD.encode("pixels") } },
                { "mimeType": "text/html", "body": { "data": URL_SAFE_NO_PAD.encode("<b>B</b>") } }
            ]
        }
    })
}

#[tokio::test]
async fn pipeline_ingests_one_page_and_skips_on_rerun() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me/messages"))
        .and(query_param("maxResults", "10"))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{ "id": "m1", "threadId": "t1" }],
            "resultSizeEstimate": 1
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/me/messages/m1"))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message_fixture()))
        .mount(&server)
        .await;

    let storage = memory_storage().await;
    let gmail = mock_gmail(&server);

    let report = run_ingestion(&gmail, "test-token", &storage, 10)
        .await
        .expect("first run");
    assert_eq!(report.listed, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 0);

    let record = storage
        .find_by_external_id("m1")
        .await
        .unwrap()
        .expect("record stored");
    assert_eq!(record.sender, "sender@example.com");
    assert_eq!(record.subject, "greetings");
    assert_eq!(record.body, "A<b>B</b>");
    assert_eq!(record.internal_date, "1700000000000");
    assert_eq!(record.label_ids, vec!["INBOX", "UNREAD"]);

    let rerun = run_ingestion(&gmail, "test-token", &storage, 10)
        .await
        .expect("second run");
    assert_eq!(rerun.inserted, 0);
    assert_eq!(rerun.skipped, 1);
    assert_eq!(storage.count().await.unwrap(), 1);
}

#[tokio::test]
async fn empty_listing_completes_without_message_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "resultSizeEstimate": 0 })),
        )
        .mount(&server)
        .await;
    // Any per-message fetch would be a contract violation here.
    Mock::given(method("GET"))
        .and(path("/users/me/messages/m1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let storage = memory_storage().await;
    let report = run_ingestion(&mock_gmail(&server), "test-token", &storage, 10)
        .await
        .expect("run succeeds");
    assert_eq!(report.listed, 0);
    assert_eq!(storage.count().await.unwrap(), 0);
}

#[tokio::test]
async fn index_page_is_served() {
    let storage = memory_storage().await;
    let state = SinkState::with_parts(
        storage,
        oauth_service(scratch_path("credentials.json")),
        GmailApi::new(build_http_client()),
        10,
    );
    let app = sink_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/")
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);

    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body_str = std::str::from_utf8(&body).unwrap();
    assert!(body_str.contains("Sign in with Google"));
}

#[tokio::test]
async fn auth_entry_fails_before_any_network_call_on_bad_config() {
    // Config file present but missing client_id; no mock server is mounted,
    // so reaching the network would fail the test differently.
    let credentials_path = scratch_path("credentials.json");
    fs::write(
        &credentials_path,
        r#"{"installed":{"client_secret":"secret","redirect_uris":["http://localhost:3000/auth/google/callback"]}}"#,
    )
    .unwrap();

    let storage = memory_storage().await;
    let state = SinkState::with_parts(
        storage,
        oauth_service(credentials_path.clone()),
        GmailApi::new(build_http_client()),
        10,
    );
    let app = sink_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/auth/google")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(std::str::from_utf8(&body).unwrap(), "Error generating auth URL");

    let _ = fs::remove_file(&credentials_path);
}

#[tokio::test]
async fn auth_entry_redirects_to_consent_url() {
    let credentials_path = scratch_path("credentials.json");
    fs::write(
        &credentials_path,
        r#"{"web":{"client_id":"id","client_secret":"secret","redirect_uris":["http://localhost:3000/auth/google/callback"]}}"#,
    )
    .unwrap();

    let storage = memory_storage().await;
    let state = SinkState::with_parts(
        storage,
        oauth_service(credentials_path.clone()),
        GmailApi::new(build_http_client()),
        10,
    );
    let app = sink_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/auth/google")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = resp
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("redirect location");
    assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth"));
    assert!(location.contains("access_type=offline"));
    assert!(location.contains("gmail.readonly"));
    assert!(location.contains("client_id=id"));

    let _ = fs::remove_file(&credentials_path);
}

#[tokio::test]
async fn callback_without_session_cookies_is_a_generic_500() {
    let storage = memory_storage().await;
    let state = SinkState::with_parts(
        storage,
        oauth_service(scratch_path("credentials.json")),
        GmailApi::new(build_http_client()),
        10,
    );
    let app = sink_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/auth/google/callback?code=abc&state=xyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        "Error during authentication"
    );
}
