use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Session issued by the auth service. Every link is optional; callers must
/// not assume a user, token or identity is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Session {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub identities: Vec<Identity>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Identity {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub identity_data: Option<Map<String, Value>>,
}

impl Identity {
    /// Provider-supplied full name, if the provider sent one as a string.
    pub fn full_name(&self) -> Option<&str> {
        self.identity_data
            .as_ref()?
            .get("full_name")
            .and_then(Value::as_str)
    }
}

impl User {
    /// Display name taken from the first linked identity only.
    pub fn display_name(&self) -> Option<&str> {
        self.identities.first().and_then(Identity::full_name)
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.is_empty())
    }
}

impl Session {
    /// Non-empty access token, if any.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    /// A session is authenticated when it carries both a user and an access token.
    pub fn authenticated_user(&self) -> Option<&User> {
        self.access_token()?;
        self.user.as_ref()
    }

    /// Fill `expires_at` from `expires_in`, falling back to the token's `exp` claim.
    pub fn normalized(mut self) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self
                .expires_in
                .map(|secs| Utc::now().timestamp() + secs)
                .or_else(|| self.access_token().and_then(jwt_expiry));
        }
        self
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }

    /// Time left until the session should be refreshed, zero when already due.
    /// `None` when the expiry is unknown.
    pub fn refresh_due_in(&self, margin: Duration, now: DateTime<Utc>) -> Option<Duration> {
        let expires_at = self.expires_at_utc()?;
        let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::zero());
        let due = expires_at - margin;
        Some((due - now).to_std().unwrap_or(Duration::ZERO))
    }
}

/// Read the `exp` claim from a JWT without verifying it.
pub fn jwt_expiry(token: &str) -> Option<i64> {
    let payload_b64 = token.split('.').nth(1)?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&decoded).ok()?;
    claims.get("exp")?.as_i64()
}

/// Kind of session change reported by the auth provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// One session-change notification. The session replaces whatever was held before.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

/// What presentation code reads: current user, current session, loading flag.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub loading: bool,
}

impl AuthSnapshot {
    /// State before the first session fetch has completed.
    pub fn initial() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
        }
    }

    /// Replace, never merge: user is always derived from the new session.
    pub fn replaced_with(session: Option<Session>) -> Self {
        Self {
            user: session.as_ref().and_then(|s| s.user.clone()),
            session,
            loading: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_with_exp(exp: i64) -> String {
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let header = engine.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = engine.encode(json!({ "sub": "u1", "exp": exp }).to_string());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn display_name_comes_from_first_identity() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "email": "a@x.com",
            "identities": [
                { "provider": "google", "identity_data": { "full_name": "A" } },
                { "provider": "github", "identity_data": { "full_name": "B" } }
            ]
        }))
        .unwrap();
        assert_eq!(user.display_name(), Some("A"));
    }

    #[test]
    fn display_name_absent_without_identity_data() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "identities": [{ "provider": "email" }]
        }))
        .unwrap();
        assert_eq!(user.display_name(), None);

        let user = User {
            id: "u2".into(),
            ..User::default()
        };
        assert_eq!(user.display_name(), None);
    }

    #[test]
    fn non_string_full_name_is_ignored() {
        let identity: Identity =
            serde_json::from_value(json!({ "identity_data": { "full_name": 42 } })).unwrap();
        assert_eq!(identity.full_name(), None);
    }

    #[test]
    fn authenticated_requires_user_and_token() {
        let user = User {
            id: "u1".into(),
            ..User::default()
        };
        let both = Session {
            access_token: Some("t".into()),
            user: Some(user.clone()),
            ..Session::default()
        };
        assert!(both.authenticated_user().is_some());

        let empty_token = Session {
            access_token: Some(String::new()),
            user: Some(user.clone()),
            ..Session::default()
        };
        assert!(empty_token.authenticated_user().is_none());

        let no_user = Session {
            access_token: Some("t".into()),
            ..Session::default()
        };
        assert!(no_user.authenticated_user().is_none());
    }

    #[test]
    fn normalized_prefers_expires_in_then_jwt() {
        let from_jwt = Session {
            access_token: Some(token_with_exp(1_900_000_000)),
            ..Session::default()
        }
        .normalized();
        assert_eq!(from_jwt.expires_at, Some(1_900_000_000));

        let before = Utc::now().timestamp();
        let from_expires_in = Session {
            access_token: Some(token_with_exp(1_900_000_000)),
            expires_in: Some(3600),
            ..Session::default()
        }
        .normalized();
        let at = from_expires_in.expires_at.unwrap();
        assert!(at >= before + 3600 && at <= Utc::now().timestamp() + 3600);
    }

    #[test]
    fn jwt_expiry_rejects_garbage() {
        assert_eq!(jwt_expiry("not-a-jwt"), None);
        assert_eq!(jwt_expiry("a.!!!.c"), None);
    }

    #[test]
    fn refresh_due_in_subtracts_margin() {
        let now = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        let session = Session {
            expires_at: Some(1_100),
            ..Session::default()
        };
        assert_eq!(
            session.refresh_due_in(Duration::from_secs(60), now),
            Some(Duration::from_secs(40))
        );
        assert_eq!(
            session.refresh_due_in(Duration::from_secs(200), now),
            Some(Duration::ZERO)
        );
        assert_eq!(
            Session::default().refresh_due_in(Duration::from_secs(60), now),
            None
        );
    }

    #[test]
    fn snapshot_replaces_user_from_session() {
        let snap = AuthSnapshot::replaced_with(None);
        assert!(snap.user.is_none() && snap.session.is_none());
        assert!(!snap.loading);
        assert!(AuthSnapshot::initial().loading);
    }
}
