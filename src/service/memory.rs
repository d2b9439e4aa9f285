//! In-memory backends for local development and tests.

use crate::error::AdminError;
use crate::service::traits::{AuthProvider, ProfileStore, SessionSubscription};
use crate::types::{AuthChange, AuthChangeEvent, NewProfile, Profile, Session};

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

/// Auth provider whose session is set directly by the caller.
pub struct MemoryAuth {
    session: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthChange>,
    sign_outs: AtomicUsize,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MemoryAuth {
    pub fn new(initial: Option<Session>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            session: Mutex::new(initial),
            events,
            sign_outs: AtomicUsize::new(0),
        }
    }

    /// Replace the session and notify subscribers.
    pub fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = session.clone();
        let _ = self.events.send(AuthChange { event, session });
    }

    pub fn sign_in(&self, session: Session) {
        self.emit(AuthChangeEvent::SignedIn, Some(session));
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn get_current_session(&self) -> Result<Option<Session>, AdminError> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn on_session_change(&self) -> SessionSubscription {
        SessionSubscription::new(self.events.subscribe())
    }

    async fn sign_out(&self) -> Result<(), AdminError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.emit(AuthChangeEvent::SignedOut, None);
        Ok(())
    }
}

/// Profile table kept in a `Vec`, recording every lookup and insert.
#[derive(Default)]
pub struct MemoryProfileStore {
    rows: Mutex<Vec<Profile>>,
    lookups: Mutex<Vec<String>>,
    inserts: Mutex<Vec<NewProfile>>,
    fail_lookup: AtomicBool,
    fail_insert: AtomicBool,
}

impl MemoryProfileStore {
    pub fn with_rows(rows: Vec<Profile>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    /// Make every following lookup fail.
    pub fn fail_lookups(&self) {
        self.fail_lookup.store(true, Ordering::SeqCst);
    }

    /// Make every following insert fail.
    pub fn fail_inserts(&self) {
        self.fail_insert.store(true, Ordering::SeqCst);
    }

    /// Emails passed to `find_by_email`, in call order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records passed to `insert`, in call order, including failed ones.
    pub fn inserts(&self) -> Vec<NewProfile> {
        self.inserts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn rows(&self) -> Vec<Profile> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn unavailable(op: &str) -> AdminError {
    AdminError::Rest {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: format!("{op} unavailable"),
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find_by_email(&self, email: &str) -> Result<Vec<Profile>, AdminError> {
        self.lookups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email.to_string());
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(unavailable("profile lookup"));
        }
        Ok(self
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|p| p.email == email)
            .cloned()
            .collect())
    }

    async fn insert(&self, profile: NewProfile) -> Result<(), AdminError> {
        self.inserts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(profile.clone());
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(unavailable("profile insert"));
        }
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Profile {
                id: None,
                username: profile.username,
                email: profile.email,
                created_at: None,
            });
        Ok(())
    }
}
