use crate::error::AdminError;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Environment prefix for every configuration key, e.g. `ADMINBOARD_BACKEND_URL`.
pub const ENV_PREFIX: &str = "ADMINBOARD_";

/// Process-wide configuration used by the binary.
/// Library constructors take `&Config` so tests can build their own.
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::load().unwrap_or_else(|e| panic!("FATAL: invalid configuration: {e}"))
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the hosted backend project.
    pub backend_url: Url,
    /// Public anon key sent as `apikey` on every request.
    pub anon_key: String,
    pub profiles_table: String,
    /// SQLite URL for session persistence; `None` keeps the session in memory only.
    pub session_db_url: Option<String>,
    pub loglevel: String,
    pub auto_refresh: bool,
    pub refresh_margin_secs: u64,
    pub request_timeout_secs: u64,
    pub proxy: Option<Url>,
    /// Credentials used by the binary to sign in at startup.
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: Url::parse("https://your-project.supabase.co")
                .expect("static default URL is valid"),
            anon_key: "your-anon-key".to_string(),
            profiles_table: "profiles".to_string(),
            session_db_url: None,
            loglevel: "info".to_string(),
            auto_refresh: true,
            refresh_margin_secs: 60,
            request_timeout_secs: 15,
            proxy: None,
            email: None,
            password: None,
        }
    }
}

impl Config {
    /// Defaults overlaid with `ADMINBOARD_*` environment variables.
    pub fn load() -> Result<Self, AdminError> {
        Self::figment().extract().map_err(AdminError::from)
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn auth_base(&self) -> Result<Url, AdminError> {
        Ok(with_trailing_slash(&self.backend_url).join("auth/v1/")?)
    }

    pub fn rest_base(&self) -> Result<Url, AdminError> {
        Ok(with_trailing_slash(&self.backend_url).join("rest/v1/")?)
    }

    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Shared HTTP client settings for both the auth and the REST clients.
    pub fn http_client(&self) -> Result<reqwest::Client, AdminError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("adminboard/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(self.request_timeout());
        if let Some(proxy_url) = self.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        Ok(builder.build()?)
    }
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_under_project_url() {
        let cfg = Config {
            backend_url: Url::parse("https://abc.supabase.co").unwrap(),
            ..Config::default()
        };
        assert_eq!(
            cfg.auth_base().unwrap().as_str(),
            "https://abc.supabase.co/auth/v1/"
        );
        assert_eq!(
            cfg.rest_base().unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/"
        );
    }

    #[test]
    fn endpoints_keep_path_prefix() {
        let cfg = Config {
            backend_url: Url::parse("http://localhost:54321/project").unwrap(),
            ..Config::default()
        };
        assert_eq!(
            cfg.auth_base().unwrap().as_str(),
            "http://localhost:54321/project/auth/v1/"
        );
    }

    #[test]
    fn env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("ADMINBOARD_ANON_KEY", "anon-123");
            jail.set_env("ADMINBOARD_PROFILES_TABLE", "members");
            jail.set_env("ADMINBOARD_AUTO_REFRESH", "false");
            let cfg = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(cfg.anon_key, "anon-123");
            assert_eq!(cfg.profiles_table, "members");
            assert!(!cfg.auto_refresh);
            assert_eq!(cfg.refresh_margin_secs, 60);
            Ok(())
        });
    }
}
