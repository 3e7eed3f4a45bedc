use super::client_config::ClientConfig;
use super::credentials::{Credential, StoredToken, TokenStore};
use super::endpoints::{GoogleOauthEndpoints, expiry_from_now};
use super::flow;
use crate::config::CONFIG;
use crate::error::SinkError;

use chrono::Utc;
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, TokenResponse};
use std::path::PathBuf;
use tracing::warn;
use url::Url;

/// Service layer composing the authorization operations: load a saved
/// credential, drive a grant flow, refresh transparently on use.
pub struct GoogleOauthService {
    http_client: reqwest::Client,
    credentials_path: PathBuf,
    token_store: TokenStore,
}

impl GoogleOauthService {
    /// Create a new service with a preconfigured HTTP client and the
    /// configured file locations.
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_paths(
            http_client,
            CONFIG.credentials_path.clone(),
            TokenStore::new(CONFIG.token_path.clone()),
        )
    }

    /// Injection seam: tests point this at scratch files.
    pub fn with_paths(
        http_client: reqwest::Client,
        credentials_path: PathBuf,
        token_store: TokenStore,
    ) -> Self {
        Self {
            http_client,
            credentials_path,
            token_store,
        }
    }

    pub fn client_config(&self) -> Result<ClientConfig, SinkError> {
        ClientConfig::load(&self.credentials_path)
    }

    /// Saved-token half of credential acquisition. No expiry check here;
    /// refresh happens transparently on first use.
    pub fn load_saved_credential(&self) -> Result<Option<Credential>, SinkError> {
        let Some(stored) = self.token_store.load() else {
            return Ok(None);
        };
        let cred = stored.into_credential(|| self.client_config())?;
        if cred.is_none() {
            warn!("saved token has no refresh token; re-running the grant flow");
        }
        Ok(cred)
    }

    /// Load a saved credential or drive the interactive local grant flow,
    /// persisting the result.
    pub async fn obtain_credential(&self) -> Result<Credential, SinkError> {
        if let Some(cred) = self.load_saved_credential()? {
            return Ok(cred);
        }
        let cfg = self.client_config()?;
        let cred = flow::interactive_grant(&cfg, self.http_client.clone()).await?;
        self.token_store
            .save(&StoredToken::authorized_user(&cfg, cred.refresh_token.clone()))?;
        Ok(cred)
    }

    /// Entry half of the web redirect flow: the consent URL to send the
    /// browser to, plus the CSRF token the callback must echo.
    pub fn authorize_url(
        &self,
        challenge: PkceCodeChallenge,
    ) -> Result<(Url, CsrfToken), SinkError> {
        let cfg = self.client_config()?;
        GoogleOauthEndpoints::build_authorize_url(&cfg, cfg.primary_redirect(), challenge)
    }

    /// Callback half of the web redirect flow: exchange the code and persist
    /// the resulting credential.
    pub async fn exchange_code(
        &self,
        code: String,
        verifier: PkceCodeVerifier,
    ) -> Result<Credential, SinkError> {
        let cfg = self.client_config()?;
        let cred = GoogleOauthEndpoints::exchange_authorization_code(
            &cfg,
            cfg.primary_redirect(),
            AuthorizationCode::new(code),
            verifier,
            self.http_client.clone(),
        )
        .await?;
        self.token_store.save(&StoredToken::grant_response(&cred))?;
        Ok(cred)
    }

    /// Return a usable access token, refreshing when the held one is absent
    /// or expired, and re-persisting the refreshed credential.
    pub async fn access_token(&self, cred: &mut Credential) -> Result<String, SinkError> {
        if let Some(token) = cred.access_token.as_ref() {
            let expired = cred.expiry.is_some_and(|t| t <= Utc::now());
            if !expired {
                return Ok(token.clone());
            }
        }

        let token_result =
            GoogleOauthEndpoints::refresh_access_token(cred, self.http_client.clone()).await?;
        let access_token = token_result.access_token().secret().clone();
        cred.access_token = Some(access_token.clone());
        cred.expiry = expiry_from_now(&token_result);
        if let Some(rt) = token_result.refresh_token() {
            cred.refresh_token = rt.secret().clone();
        }
        self.token_store.save(&StoredToken::grant_response(cred))?;
        Ok(access_token)
    }
}
