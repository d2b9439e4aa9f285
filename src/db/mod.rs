//! Local persistence of the auth session.
//!
//! Layout:
//! - `models.rs`: the stored row and its conversion to `Session`
//! - `schema.rs`: SQL DDL for initializing the database (SQLite)
//! - `sqlite.rs`: `SessionStorage` load/save/clear

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::DbSession;
pub use schema::SQLITE_INIT;
pub use sqlite::{SessionStorage, SqlitePool};
