use axum::http::StatusCode;
use axum::response::IntoResponse;
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

#[derive(Debug, ThisError)]
pub enum SinkError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed OAuth client configuration.
    #[error("invalid client configuration: {0}")]
    AuthConfig(String),

    /// The user denied the grant or the provider rejected the code.
    #[error("authorization grant failed: {0}")]
    AuthGrant(String),

    /// A fetched message is missing the structure normalization relies on.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("database error: {0}")]
    Database(#[from] SqlxError),

    #[error("upstream error with status: {0}")]
    UpstreamStatus(StatusCode),
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for SinkError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => {
                SinkError::AuthGrant(format!("provider rejected the grant: {}", err.error()))
            }
            RequestTokenError::Request(req_e) => {
                SinkError::AuthGrant(format!("token request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => SinkError::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => SinkError::AuthGrant(s),
        }
    }
}

/// All handler failures collapse to a generic plain-text 500; the detail
/// goes to the process log only.
impl IntoResponse for SinkError {
    fn into_response(self) -> axum::response::Response {
        error!(error = %self, "request failed");
        let body = match self {
            SinkError::AuthConfig(_) | SinkError::UrlParse(_) => "Error generating auth URL",
            _ => "Error during authentication",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
