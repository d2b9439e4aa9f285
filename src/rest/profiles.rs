use super::client::TableClient;
use crate::error::AdminError;
use crate::service::traits::ProfileStore;
use crate::types::{NewProfile, Profile};

use async_trait::async_trait;

/// `ProfileStore` backed by the remote profiles table.
#[derive(Clone)]
pub struct RestProfileStore {
    tables: TableClient,
    table: String,
}

impl RestProfileStore {
    pub fn new(tables: TableClient, table: impl Into<String>) -> Self {
        Self {
            tables,
            table: table.into(),
        }
    }
}

#[async_trait]
impl ProfileStore for RestProfileStore {
    async fn find_by_email(&self, email: &str) -> Result<Vec<Profile>, AdminError> {
        self.tables.select_eq(&self.table, "email", email).await
    }

    async fn insert(&self, profile: NewProfile) -> Result<(), AdminError> {
        self.tables.insert(&self.table, &[profile]).await
    }
}
