//! Client for the hosted auth service.

mod endpoints;
pub mod service;

pub use service::AuthClient;
