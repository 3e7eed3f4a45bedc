use crate::error::SinkError;
use crate::router::SinkState;
use crate::service::ingest::run_ingestion;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use oauth2::{CsrfToken, PkceCodeChallenge, PkceCodeVerifier};
use serde::Deserialize;
use time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

const CSRF_COOKIE: &str = "oauth_csrf_token";
const PKCE_COOKIE: &str = "oauth_pkce_verifier";

/// GET /auth/google -> redirects to Google's OAuth2 consent page.
pub async fn google_oauth_entry(
    State(state): State<SinkState>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, SinkError> {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let pkce_verifier = verifier.secret().to_string();

    let (auth_url, csrf_token) = state.oauth.authorize_url(challenge)?;

    let jar = store_oauth_cookies(jar, &csrf_token, &pkce_verifier);

    info!("dispatching OAuth redirect");
    Ok((jar, Redirect::temporary(auth_url.as_ref())))
}

/// GET /auth/google/callback -> exchanges the code, persists the credential,
/// and runs one ingestion pass.
pub async fn google_oauth_callback(
    State(state): State<SinkState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    let (pkce_verifier, csrf_cookie, jar) = match load_oauth_session(jar) {
        Ok(data) => data,
        Err((jar, err)) => return respond_with_error(jar, err),
    };

    let state_param = match query.state.as_deref() {
        Some(s) => s,
        None => {
            return respond_with_error(
                jar,
                SinkError::AuthGrant("missing `state` in callback".to_string()),
            );
        }
    };

    if state_param != csrf_cookie {
        return respond_with_error(jar, SinkError::AuthGrant("CSRF token mismatch".to_string()));
    }

    let code = match query.code.as_deref() {
        Some(code) => code,
        None => {
            return respond_with_error(
                jar,
                SinkError::AuthGrant("missing `code` in callback".to_string()),
            );
        }
    };

    let mut credential = match state
        .oauth
        .exchange_code(code.to_owned(), PkceCodeVerifier::new(pkce_verifier))
        .await
    {
        Ok(cred) => cred,
        Err(err) => return respond_with_error(jar, err),
    };

    let access_token = match state.oauth.access_token(&mut credential).await {
        Ok(token) => token,
        Err(err) => return respond_with_error(jar, err),
    };

    if let Err(err) = run_ingestion(
        &state.gmail,
        &access_token,
        &state.storage,
        state.page_size,
    )
    .await
    {
        return respond_with_error(jar, err);
    }

    info!("OAuth callback stored credential and ran ingestion");
    (jar, "Emails fetched and saved to the database.").into_response()
}

fn store_oauth_cookies(
    jar: PrivateCookieJar,
    csrf: &CsrfToken,
    pkce_verifier: &str,
) -> PrivateCookieJar {
    jar.add(build_cookie(CSRF_COOKIE, csrf.secret().to_string()))
        .add(build_cookie(PKCE_COOKIE, pkce_verifier.to_string()))
}

fn load_oauth_session(
    jar: PrivateCookieJar,
) -> Result<(String, String, PrivateCookieJar), (PrivateCookieJar, SinkError)> {
    let Some(csrf_cookie) = jar.get(CSRF_COOKIE).map(|c| c.value().to_owned()) else {
        let jar = clear_oauth_cookies(jar);
        return Err((
            jar,
            SinkError::AuthGrant("missing CSRF token in cookie".to_string()),
        ));
    };

    let Some(pkce_cookie) = jar.get(PKCE_COOKIE).map(|c| c.value().to_owned()) else {
        let jar = clear_oauth_cookies(jar);
        return Err((
            jar,
            SinkError::AuthGrant("missing PKCE verifier in cookie".to_string()),
        ));
    };

    let jar = clear_oauth_cookies(jar);

    Ok((pkce_cookie, csrf_cookie, jar))
}

fn clear_oauth_cookies(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(CSRF_COOKIE))
        .remove(clear_cookie(PKCE_COOKIE))
}

fn build_cookie(name: &str, value: String) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn respond_with_error(jar: PrivateCookieJar, err: SinkError) -> Response {
    (jar, err.into_response()).into_response()
}
