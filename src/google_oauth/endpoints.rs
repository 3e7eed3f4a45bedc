use crate::config::{GMAIL_READONLY_SCOPE, GOOGLE_AUTH_URL, GOOGLE_TOKEN_URI};
use crate::error::SinkError;
use crate::google_oauth::client_config::ClientConfig;
use crate::google_oauth::credentials::Credential;

use chrono::{TimeDelta, Utc};
use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken,
    Scope, StandardRevocableToken, TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenResponse,
    },
};
use tracing::info;
use url::Url;

/// Stateless Google OAuth endpoints.
pub(super) struct GoogleOauthEndpoints;

impl GoogleOauthEndpoints {
    /// Build the consent URL: fixed read-only mail scope, offline access so
    /// a refresh token is issued, PKCE challenge attached.
    pub(super) fn build_authorize_url(
        cfg: &ClientConfig,
        redirect_uri: &str,
        challenge: PkceCodeChallenge,
    ) -> Result<(Url, CsrfToken), SinkError> {
        let client = build_oauth2_client(&cfg.client_id, &cfg.client_secret)?
            .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);
        let (auth_url, csrf_token) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(GMAIL_READONLY_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(challenge)
            .url();
        Ok((auth_url, csrf_token))
    }

    /// Exchange an authorization code for tokens via the same client
    /// configuration that produced the consent URL.
    pub(super) async fn exchange_authorization_code(
        cfg: &ClientConfig,
        redirect_uri: &str,
        code: AuthorizationCode,
        verifier: PkceCodeVerifier,
        http_client: reqwest::Client,
    ) -> Result<Credential, SinkError> {
        let client = build_oauth2_client(&cfg.client_id, &cfg.client_secret)?
            .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);
        let token_result: BasicTokenResponse = client
            .exchange_code(code)
            .set_pkce_verifier(verifier)
            .request_async(&http_client)
            .await?;
        info!("authorization code exchanged successfully");
        credential_from_token(cfg, &token_result)
    }

    /// Exchange the refresh token for a fresh access token.
    pub(super) async fn refresh_access_token(
        creds: &Credential,
        http_client: reqwest::Client,
    ) -> Result<BasicTokenResponse, SinkError> {
        let client = build_oauth2_client(&creds.client_id, &creds.client_secret)?;
        let token_result: BasicTokenResponse = client
            .exchange_refresh_token(&RefreshToken::new(creds.refresh_token.clone()))
            .request_async(&http_client)
            .await?;
        info!("access token refreshed successfully");
        Ok(token_result)
    }
}

/// Build the Google OAuth2 client for the given application keys.
fn build_oauth2_client(
    client_id: &str,
    client_secret: &str,
) -> Result<GoogleOauth2Client, SinkError> {
    let client = OAuth2Client::new(ClientId::new(client_id.to_string()))
        .set_client_secret(ClientSecret::new(client_secret.to_string()))
        .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.as_str().to_string())?)
        .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URI.as_str().to_string())?);
    Ok(client)
}

fn credential_from_token(
    cfg: &ClientConfig,
    token: &BasicTokenResponse,
) -> Result<Credential, SinkError> {
    let refresh_token = token
        .refresh_token()
        .map(|t| t.secret().clone())
        .unwrap_or_default();
    if refresh_token.is_empty() {
        return Err(SinkError::AuthGrant(
            "OAuth response missing refresh_token; ensure access_type=offline and prompt=consent \
             are allowed for this client/user"
                .to_string(),
        ));
    }
    Ok(Credential {
        client_id: cfg.client_id.clone(),
        client_secret: cfg.client_secret.clone(),
        refresh_token,
        access_token: Some(token.access_token().secret().clone()),
        expiry: expiry_from_now(token),
    })
}

pub(super) fn expiry_from_now(token: &BasicTokenResponse) -> Option<chrono::DateTime<Utc>> {
    token
        .expires_in()
        .and_then(|d| TimeDelta::from_std(d).ok())
        .map(|d| Utc::now() + d)
}

pub(super) type GoogleOauth2Client = OAuth2Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;
