//! Interactive local grant: open the system browser and catch the loopback
//! redirect with a short-lived local listener.

use super::client_config::ClientConfig;
use super::credentials::Credential;
use super::endpoints::GoogleOauthEndpoints;
use crate::error::SinkError;

use oauth2::{AuthorizationCode, PkceCodeChallenge};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use tracing::{info, warn};
use url::Url;

const CALLBACK_WAIT: Duration = Duration::from_secs(120);

/// Drive the full browser-based grant and return the resulting credential.
pub async fn interactive_grant(
    cfg: &ClientConfig,
    http_client: reqwest::Client,
) -> Result<Credential, SinkError> {
    let redirect_uri = cfg.primary_redirect().to_string();
    let bind_addr = loopback_addr(&redirect_uri)?;

    // Listen before opening the browser so the redirect cannot race the bind.
    let server = Server::http(bind_addr).map_err(|e| {
        SinkError::AuthGrant(format!(
            "failed to bind callback listener on {bind_addr}: {e}"
        ))
    })?;

    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, _csrf_token) =
        GoogleOauthEndpoints::build_authorize_url(cfg, &redirect_uri, challenge)?;

    info!("open this URL in your browser: {auth_url}");
    if let Err(e) = open::that(auth_url.as_str()) {
        warn!(error = %e, "could not open browser automatically");
    }

    let code = tokio::task::spawn_blocking(move || wait_for_code(&server))
        .await
        .map_err(|e| SinkError::AuthGrant(format!("callback listener task failed: {e}")))??;

    GoogleOauthEndpoints::exchange_authorization_code(
        cfg,
        &redirect_uri,
        AuthorizationCode::new(code),
        verifier,
        http_client,
    )
    .await
}

/// The redirect target must resolve to a local address we can bind.
fn loopback_addr(redirect_uri: &str) -> Result<SocketAddr, SinkError> {
    let redirect = Url::parse(redirect_uri)?;
    let host = redirect.host_str().ok_or_else(|| {
        SinkError::AuthConfig(format!("redirect target missing host: {redirect_uri}"))
    })?;
    let port = redirect.port_or_known_default().ok_or_else(|| {
        SinkError::AuthConfig(format!("redirect target missing port: {redirect_uri}"))
    })?;
    let ip: IpAddr = match host {
        "localhost" | "127.0.0.1" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other.parse().map_err(|_| {
            SinkError::AuthConfig(format!(
                "redirect target host must be loopback or an IP: {other}"
            ))
        })?,
    };
    Ok(SocketAddr::new(ip, port))
}

fn wait_for_code(server: &Server) -> Result<String, SinkError> {
    let wait_until = Instant::now() + CALLBACK_WAIT;
    while Instant::now() < wait_until {
        let Ok(Some(request)) = server.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };

        // request.url() is a path+query like "/callback?code=...&state=...".
        let full = format!("http://localhost{}", request.url());
        let Ok(parsed) = Url::parse(&full) else {
            let _ = request.respond(Response::from_string("Bad redirect"));
            continue;
        };

        let code = parsed
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned());
        match code {
            Some(code) => {
                let _ = request.respond(Response::from_string(
                    "Authorization received. You can close this tab.",
                ));
                return Ok(code);
            }
            None => {
                let _ = request.respond(Response::from_string(
                    "No code found in redirect. You can close this tab.",
                ));
            }
        }
    }
    Err(SinkError::AuthGrant(
        "no authorization code received within the wait window".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_addr_accepts_localhost() {
        let addr = loopback_addr("http://localhost:3000/auth/google/callback").unwrap();
        assert_eq!(addr, SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000));
    }

    #[test]
    fn loopback_addr_rejects_remote_hosts() {
        let err = loopback_addr("https://example.com/callback").unwrap_err();
        assert!(matches!(err, SinkError::AuthConfig(_)));
    }
}
