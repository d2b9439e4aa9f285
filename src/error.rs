use reqwest::StatusCode;
use serde::Deserialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum AdminError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Config error: {0}")]
    Config(#[from] figment::Error),

    #[error("Auth API error ({status}): {message}")]
    Auth { status: StatusCode, message: String },

    #[error("REST API error ({status}): {message}")]
    Rest { status: StatusCode, message: String },

    #[error("No active session; sign in first")]
    MissingSession,

    #[error("Session changed while the request was in flight")]
    SessionSuperseded,

    #[error("Missing access token in auth response")]
    MissingAccessToken,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Ractor error: {0}")]
    RactorError(String),
}

impl AdminError {
    /// Build an auth error from a non-success response, reading the provider's error body.
    pub(crate) async fn from_auth_response(resp: reqwest::Response) -> Self {
        let status = resp.status();
        let message = read_error_message(resp).await;
        AdminError::Auth { status, message }
    }

    /// Build a REST error from a non-success response.
    pub(crate) async fn from_rest_response(resp: reqwest::Response) -> Self {
        let status = resp.status();
        let message = read_error_message(resp).await;
        AdminError::Rest { status, message }
    }
}

/// Error payloads differ between the auth service and the REST gateway;
/// take the first message-like field that is present.
#[derive(Deserialize, Debug, Default)]
struct BackendErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl BackendErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

async fn read_error_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    parse_error_message(&body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            body
        }
    })
}

fn parse_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<BackendErrorBody>(body)
        .ok()
        .and_then(BackendErrorBody::into_message)
}
