//! Operator-provided OAuth client configuration.
//!
//! The file carries a top-level `installed` or `web` key (two equivalent
//! shapes); both resolve at load time into one normalized record.

use crate::error::SinkError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ClientConfigFile {
    installed: Option<ClientKeys>,
    web: Option<ClientKeys>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientKeys {
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, SinkError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            SinkError::AuthConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self, SinkError> {
        let file: ClientConfigFile = serde_json::from_str(contents)
            .map_err(|e| SinkError::AuthConfig(format!("invalid JSON: {e}")))?;
        let keys = file.installed.or(file.web).ok_or_else(|| {
            SinkError::AuthConfig("expected a top-level `installed` or `web` key".to_string())
        })?;

        if keys.client_id.is_empty() {
            return Err(SinkError::AuthConfig("missing client_id".to_string()));
        }
        if keys.client_secret.is_empty() {
            return Err(SinkError::AuthConfig("missing client_secret".to_string()));
        }
        if keys.redirect_uris.is_empty() {
            return Err(SinkError::AuthConfig("missing redirect_uris".to_string()));
        }

        Ok(Self {
            client_id: keys.client_id,
            client_secret: keys.client_secret,
            redirect_uris: keys.redirect_uris,
        })
    }

    /// The redirect target used for both grant flows.
    pub fn primary_redirect(&self) -> &str {
        &self.redirect_uris[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_installed_shape() {
        let cfg = ClientConfig::parse(
            r#"{"installed":{"client_id":"id","client_secret":"secret",
                "redirect_uris":["http://localhost:3000/auth/google/callback"]}}"#,
        )
        .unwrap();
        assert_eq!(cfg.client_id, "id");
        assert_eq!(
            cfg.primary_redirect(),
            "http://localhost:3000/auth/google/callback"
        );
    }

    #[test]
    fn accepts_the_web_shape() {
        let cfg = ClientConfig::parse(
            r#"{"web":{"client_id":"id","client_secret":"secret",
                "redirect_uris":["http://localhost:3000/auth/google/callback"]}}"#,
        )
        .unwrap();
        assert_eq!(cfg.client_secret, "secret");
    }

    #[test]
    fn missing_client_id_is_a_config_error() {
        let err = ClientConfig::parse(
            r#"{"installed":{"client_secret":"secret","redirect_uris":["http://localhost:1/cb"]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SinkError::AuthConfig(_)));
    }

    #[test]
    fn both_keys_absent_is_a_config_error() {
        let err = ClientConfig::parse(r#"{"other":{}}"#).unwrap_err();
        assert!(matches!(err, SinkError::AuthConfig(_)));
    }

    #[test]
    fn empty_redirect_list_is_a_config_error() {
        let err = ClientConfig::parse(
            r#"{"web":{"client_id":"id","client_secret":"secret","redirect_uris":[]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SinkError::AuthConfig(_)));
    }
}
