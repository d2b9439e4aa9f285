use crate::error::AdminError;
use crate::types::{Session, User};

use reqwest::header::ACCEPT;
use serde_json::json;
use tracing::info;
use url::Url;

/// Stateless calls against the auth service (`{backend}/auth/v1/`).
#[derive(Clone)]
pub(super) struct AuthEndpoints {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
}

impl AuthEndpoints {
    pub(super) fn new(http: reqwest::Client, base: Url, anon_key: String) -> Self {
        Self {
            http,
            base,
            anon_key,
        }
    }

    /// Exchange email and password for a session.
    pub(super) async fn password_grant(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AdminError> {
        let mut url = self.base.join("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .header(ACCEPT, "application/json")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AdminError::from_auth_response(resp).await);
        }
        let session = parse_session(resp).await?;
        info!(email, "signed in with password");
        Ok(session)
    }

    /// Trade the refresh token for a new session.
    pub(super) async fn refresh_grant(&self, refresh_token: &str) -> Result<Session, AdminError> {
        let mut url = self.base.join("token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .header(ACCEPT, "application/json")
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AdminError::from_auth_response(resp).await);
        }
        let session = parse_session(resp).await?;
        info!("access token refreshed");
        Ok(session)
    }

    /// Revoke the session server-side.
    pub(super) async fn logout(&self, access_token: &str) -> Result<(), AdminError> {
        let url = self.base.join("logout")?;
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AdminError::from_auth_response(resp).await);
        }
        Ok(())
    }

    pub(super) async fn fetch_user(&self, access_token: &str) -> Result<User, AdminError> {
        let url = self.base.join("user")?;
        let resp = self
            .http
            .get(url)
            .header("apikey", &self.anon_key)
            .header(ACCEPT, "application/json")
            .bearer_auth(access_token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AdminError::from_auth_response(resp).await);
        }
        Ok(resp.json::<User>().await?)
    }
}

async fn parse_session(resp: reqwest::Response) -> Result<Session, AdminError> {
    let session: Session = resp.json().await?;
    if session.access_token().is_none() {
        return Err(AdminError::MissingAccessToken);
    }
    Ok(session.normalized())
}
