use crate::db::models::DbSession;
use crate::db::schema::SQLITE_INIT;
use crate::error::AdminError;
use crate::types::Session;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::debug;

pub type SqlitePool = Pool<Sqlite>;

#[derive(Clone)]
pub struct SessionStorage {
    pool: SqlitePool,
}

impl SessionStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, AdminError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // One connection: `sqlite::memory:` databases are per-connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_opts)
            .await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), AdminError> {
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn load(&self) -> Result<Option<Session>, AdminError> {
        let row: Option<DbSession> =
            sqlx::query_as("SELECT id, payload, updated_at FROM auth_session WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        debug!(updated_at = ?row.updated_at(), "loaded persisted session");
        row.to_session().map(Some)
    }

    /// Replace the stored session. Uses `INSERT ... ON CONFLICT(id) DO UPDATE`.
    pub async fn save(&self, session: &Session) -> Result<(), AdminError> {
        let row = DbSession::from_session(session)?;
        sqlx::query(
            r#"
            INSERT INTO auth_session (id, payload, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                payload=excluded.payload,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(row.id)
        .bind(row.payload)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        debug!("session persisted");
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), AdminError> {
        sqlx::query("DELETE FROM auth_session")
            .execute(&self.pool)
            .await?;
        debug!("persisted session cleared");
        Ok(())
    }
}
