pub mod memory;
pub mod session_actor;
pub mod traits;

pub use session_actor::{SessionHandle, SessionMessage, spawn};
pub use traits::{AuthProvider, ProfileStore, SessionSubscription};
