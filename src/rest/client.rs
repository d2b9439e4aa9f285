use crate::auth::AuthClient;
use crate::config::Config;
use crate::error::AdminError;

use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

/// Table access through the REST gateway (`{backend}/rest/v1/{table}`).
///
/// Requests carry the anon key as `apikey`, and the signed-in user's access
/// token as bearer when an `AuthClient` is attached (anon key otherwise).
#[derive(Clone)]
pub struct TableClient {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
    auth: Option<AuthClient>,
}

impl TableClient {
    pub fn new(cfg: &Config) -> Result<Self, AdminError> {
        Ok(Self::with_parts(
            cfg.http_client()?,
            cfg.rest_base()?,
            cfg.anon_key.clone(),
        ))
    }

    pub fn with_parts(http: reqwest::Client, base: Url, anon_key: String) -> Self {
        Self {
            http,
            base,
            anon_key,
            auth: None,
        }
    }

    /// Send the session's access token instead of the anon key.
    pub fn with_auth(mut self, auth: AuthClient) -> Self {
        self.auth = Some(auth);
        self
    }

    pub async fn select_all<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, AdminError> {
        let url = self.select_url(table, None)?;
        self.fetch_rows(url).await
    }

    /// Rows where `column` equals `value`.
    pub async fn select_eq<T: DeserializeOwned>(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Vec<T>, AdminError> {
        let url = self.select_url(table, Some((column, value)))?;
        self.fetch_rows(url).await
    }

    pub async fn insert<B: Serialize>(&self, table: &str, rows: &[B]) -> Result<(), AdminError> {
        let url = self.table_url(table)?;
        let resp = self
            .request(Method::POST, url)
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AdminError::from_rest_response(resp).await);
        }
        debug!(table, rows = rows.len(), "rows inserted");
        Ok(())
    }

    pub async fn update_eq<B: Serialize>(
        &self,
        table: &str,
        column: &str,
        value: &str,
        patch: &B,
    ) -> Result<(), AdminError> {
        let url = self.filter_url(table, column, value)?;
        let resp = self
            .request(Method::PATCH, url)
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AdminError::from_rest_response(resp).await);
        }
        debug!(table, column, value, "rows updated");
        Ok(())
    }

    pub async fn delete_eq(&self, table: &str, column: &str, value: &str) -> Result<(), AdminError> {
        let url = self.filter_url(table, column, value)?;
        let resp = self.request(Method::DELETE, url).send().await?;
        if !resp.status().is_success() {
            return Err(AdminError::from_rest_response(resp).await);
        }
        debug!(table, column, value, "rows deleted");
        Ok(())
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, AdminError> {
        let resp = self
            .request(Method::GET, url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AdminError::from_rest_response(resp).await);
        }
        Ok(resp.json::<Vec<T>>().await?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self
            .auth
            .as_ref()
            .and_then(AuthClient::access_token)
            .unwrap_or_else(|| self.anon_key.clone());
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn table_url(&self, table: &str) -> Result<Url, AdminError> {
        Ok(self.base.join(table)?)
    }

    fn select_url(&self, table: &str, filter: Option<(&str, &str)>) -> Result<Url, AdminError> {
        let mut url = self.table_url(table)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "*");
            if let Some((column, value)) = filter {
                pairs.append_pair(column, &format!("eq.{value}"));
            }
        }
        Ok(url)
    }

    fn filter_url(&self, table: &str, column: &str, value: &str) -> Result<Url, AdminError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair(column, &format!("eq.{value}"));
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TableClient {
        TableClient::with_parts(
            reqwest::Client::new(),
            Url::parse("https://abc.supabase.co/rest/v1/").unwrap(),
            "anon".into(),
        )
    }

    #[test]
    fn select_url_without_filter() {
        let url = client().select_url("categories", None).unwrap();
        assert_eq!(
            url.as_str(),
            "https://abc.supabase.co/rest/v1/categories?select=*"
        );
    }

    #[test]
    fn select_url_encodes_filter_value() {
        let url = client()
            .select_url("profiles", Some(("email", "a+b@x.com")))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://abc.supabase.co/rest/v1/profiles?select=*&email=eq.a%2Bb%40x.com"
        );
    }

    #[test]
    fn filter_url_targets_single_column() {
        let url = client().filter_url("products", "id", "42").unwrap();
        assert_eq!(url.as_str(), "https://abc.supabase.co/rest/v1/products?id=eq.42");
    }

    #[test]
    fn anon_key_is_bearer_without_session() {
        let req = client()
            .request(Method::GET, Url::parse("https://abc.supabase.co/rest/v1/x").unwrap())
            .build()
            .unwrap();
        assert_eq!(req.headers()["apikey"], "anon");
        assert_eq!(req.headers()["authorization"], "Bearer anon");
    }
}
