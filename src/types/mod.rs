pub mod catalog;
pub mod profile;
pub mod session;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use catalog::{Category, Named, NewCategory, Product, ProductDraft, filter_by_name};
pub use profile::{NewProfile, Profile};
pub use session::{AuthChange, AuthChangeEvent, AuthSnapshot, Identity, Session, User};

/// Primary key of a remote row. Tables use either serial integers or uuids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(v) => write!(f, "{v}"),
            RowId::Text(v) => f.write_str(v),
        }
    }
}
