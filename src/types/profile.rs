use super::RowId;
use super::session::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application-level user record, keyed by email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: Option<RowId>,
    #[serde(default)]
    pub username: Option<String>,
    pub email: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert payload for a profile row. A missing display name is omitted from the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub email: String,
}

impl NewProfile {
    /// Build from the session user; `None` when the user has no email to key on.
    pub fn from_user(user: &User) -> Option<Self> {
        Some(Self {
            username: user.display_name().map(str::to_string),
            email: user.email()?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_profile_from_user_with_name() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "email": "a@x.com",
            "identities": [{ "identity_data": { "full_name": "A" } }]
        }))
        .unwrap();
        let profile = NewProfile::from_user(&user).unwrap();
        assert_eq!(
            serde_json::to_value(&profile).unwrap(),
            json!({ "username": "A", "email": "a@x.com" })
        );
    }

    #[test]
    fn new_profile_omits_missing_name() {
        let user = User {
            id: "u1".into(),
            email: Some("b@x.com".into()),
            ..User::default()
        };
        let profile = NewProfile::from_user(&user).unwrap();
        assert_eq!(
            serde_json::to_value(&profile).unwrap(),
            json!({ "email": "b@x.com" })
        );
    }

    #[test]
    fn new_profile_requires_email() {
        let user = User {
            id: "u1".into(),
            ..User::default()
        };
        assert!(NewProfile::from_user(&user).is_none());
    }

    #[test]
    fn profile_row_accepts_uuid_or_serial_id() {
        let a: Profile =
            serde_json::from_value(json!({ "id": 7, "username": null, "email": "a@x.com" }))
                .unwrap();
        assert_eq!(a.id, Some(RowId::Int(7)));
        let b: Profile = serde_json::from_value(json!({
            "id": "0b9c1f0e-4d5a-4a43-9a64-2b1f3f6c1b11",
            "email": "b@x.com",
            "created_at": "2024-05-01T10:00:00.123456+00:00"
        }))
        .unwrap();
        assert!(matches!(b.id, Some(RowId::Text(_))));
        assert!(b.created_at.is_some());
    }
}
