//! Remote tables behind the REST gateway.

pub mod catalog;
pub mod client;
pub mod profiles;

pub use catalog::CatalogStore;
pub use client::TableClient;
pub use profiles::RestProfileStore;
