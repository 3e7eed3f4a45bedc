//! The persisted token file and the in-memory credential it yields.

use super::client_config::ClientConfig;
use crate::error::SinkError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Bearer credential used to call the mail provider on the user's behalf.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub access_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

/// On-disk token shapes. The interactive flow writes the `authorized_user`
/// form; the web callback writes the raw grant-response form. Both are
/// accepted on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredToken {
    AuthorizedUser {
        #[serde(rename = "type")]
        kind: String,
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
    GrantResponse {
        refresh_token: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        access_token: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        expiry: Option<DateTime<Utc>>,
    },
}

impl StoredToken {
    pub fn authorized_user(cfg: &ClientConfig, refresh_token: String) -> Self {
        Self::AuthorizedUser {
            kind: "authorized_user".to_string(),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            refresh_token,
        }
    }

    pub fn grant_response(cred: &Credential) -> Self {
        Self::GrantResponse {
            refresh_token: cred.refresh_token.clone(),
            access_token: cred.access_token.clone(),
            expiry: cred.expiry,
        }
    }

    /// Resolve into a usable credential. The grant-response form borrows the
    /// client id/secret from the client configuration, loaded lazily.
    /// Returns `None` when the token is structurally invalid (no refresh
    /// token), which sends the caller back to the grant flow.
    pub fn into_credential(
        self,
        load_cfg: impl FnOnce() -> Result<ClientConfig, SinkError>,
    ) -> Result<Option<Credential>, SinkError> {
        match self {
            StoredToken::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                ..
            } => {
                if refresh_token.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Credential {
                    client_id,
                    client_secret,
                    refresh_token,
                    access_token: None,
                    expiry: None,
                }))
            }
            StoredToken::GrantResponse {
                refresh_token,
                access_token,
                expiry,
            } => {
                if refresh_token.is_empty() {
                    return Ok(None);
                }
                let cfg = load_cfg()?;
                Ok(Some(Credential {
                    client_id: cfg.client_id,
                    client_secret: cfg.client_secret,
                    refresh_token,
                    access_token,
                    expiry,
                }))
            }
        }
    }
}

/// Owner of the single process-wide token file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved token if present. An unreadable or unparseable file is
    /// treated as absent so the caller falls through to the grant flow.
    pub fn load(&self) -> Option<StoredToken> {
        let contents = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unparseable token file");
                None
            }
        }
    }

    pub fn save(&self, token: &StoredToken) -> Result<(), SinkError> {
        let payload = serde_json::to_string(token)?;
        fs::write(&self.path, payload)?;
        Ok(())
    }
}
