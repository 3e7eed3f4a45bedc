use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use url::Url;

pub static GOOGLE_AUTH_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://accounts.google.com/o/oauth2/v2/auth").expect("invalid Google auth URL")
});

pub static GOOGLE_TOKEN_URI: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://oauth2.googleapis.com/token").expect("invalid Google token URL")
});

pub static GMAIL_API_BASE: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://gmail.googleapis.com/gmail/v1/").expect("invalid Gmail API base URL")
});

/// The one scope this system ever requests.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

pub static CONFIG: LazyLock<Config> = LazyLock::new(Config::load);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the web front end binds to.
    pub listen_addr: String,
    /// SQLite connection string for the email store.
    pub database_url: String,
    /// Operator-provided OAuth client configuration (`installed` or `web`).
    pub credentials_path: PathBuf,
    /// Persisted token file written after a successful grant.
    pub token_path: PathBuf,
    /// How many message ids one listing call requests.
    pub page_size: u32,
    pub loglevel: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            database_url: "sqlite:emails.sqlite".to_string(),
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            page_size: 10,
            loglevel: "info".to_string(),
        }
    }
}

impl Config {
    fn load() -> Self {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("MAILSINK_"))
            .extract()
            .expect("FATAL: invalid MAILSINK_* environment configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_setup() {
        let cfg = Config::default();
        assert_eq!(cfg.page_size, 10);
        assert_eq!(cfg.token_path, PathBuf::from("token.json"));
        assert_eq!(cfg.credentials_path, PathBuf::from("credentials.json"));
    }

    #[test]
    fn endpoint_statics_parse() {
        assert_eq!(GOOGLE_AUTH_URL.host_str(), Some("accounts.google.com"));
        assert_eq!(GMAIL_API_BASE.path(), "/gmail/v1/");
    }
}
