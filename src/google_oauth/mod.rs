pub mod client_config;
pub mod credentials;
mod endpoints;
pub mod flow;
pub mod service;

pub use client_config::ClientConfig;
pub use credentials::{Credential, StoredToken, TokenStore};
pub use service::GoogleOauthService;
