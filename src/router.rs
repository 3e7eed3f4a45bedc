use crate::api::gmail_api::GmailApi;
use crate::config::CONFIG;
use crate::db::sqlite::EmailStorage;
use crate::google_oauth::service::GoogleOauthService;
use crate::handlers;

use axum::{Router, extract::FromRef, routing::get};
use axum_extra::extract::cookie::Key;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct SinkState {
    pub storage: EmailStorage,
    pub oauth: Arc<GoogleOauthService>,
    pub gmail: GmailApi,
    pub page_size: u32,
    cookie_key: Key,
}

impl SinkState {
    pub fn new(storage: EmailStorage) -> Self {
        let http_client = build_http_client();
        Self::with_parts(
            storage,
            Arc::new(GoogleOauthService::new(http_client.clone())),
            GmailApi::new(http_client),
            CONFIG.page_size,
        )
    }

    /// Injection seam: tests substitute fake paths and a mock API base.
    pub fn with_parts(
        storage: EmailStorage,
        oauth: Arc<GoogleOauthService>,
        gmail: GmailApi,
        page_size: u32,
    ) -> Self {
        Self {
            storage,
            oauth,
            gmail,
            page_size,
            cookie_key: Key::generate(),
        }
    }
}

// PrivateCookieJar derives its encryption key from the state.
impl FromRef<SinkState> for Key {
    fn from_ref(state: &SinkState) -> Self {
        state.cookie_key.clone()
    }
}

/// Shared HTTP client for the OAuth endpoints and the Gmail API.
pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("mailsink/0.1")
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(30))
        .build()
        .expect("FATAL: initialize HTTP client failed")
}

pub fn sink_router(state: SinkState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/auth/google", get(handlers::google_oauth::google_oauth_entry))
        .route(
            "/auth/google/callback",
            get(handlers::google_oauth::google_oauth_callback),
        )
        .with_state(state)
}
