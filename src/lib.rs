pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod rest;
pub mod service;
pub mod types;

pub use auth::AuthClient;
pub use error::AdminError;
pub use service::{SessionHandle, spawn};
