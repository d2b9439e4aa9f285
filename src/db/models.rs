use crate::error::AdminError;
use crate::types::Session;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbSession {
    pub id: i64,
    pub payload: String,
    pub updated_at: String,
}

impl DbSession {
    pub fn from_session(session: &Session) -> Result<Self, AdminError> {
        Ok(Self {
            id: 1,
            payload: serde_json::to_string(session)?,
            updated_at: Utc::now().to_rfc3339(),
        })
    }

    pub fn to_session(&self) -> Result<Session, AdminError> {
        Ok(serde_json::from_str(&self.payload)?)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.updated_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
