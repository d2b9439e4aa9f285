use super::endpoints::AuthEndpoints;
use crate::config::Config;
use crate::db::SessionStorage;
use crate::error::AdminError;
use crate::service::traits::{AuthProvider, SessionSubscription};
use crate::types::{AuthChange, AuthChangeEvent, Session, User};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const CHANGE_CHANNEL_CAPACITY: usize = 64;
/// Pause before trying again after a refresh failed for a transient reason.
const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Client for the hosted auth service. Holds the current session, persists it
/// when a session database is configured, and broadcasts every change.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    endpoints: AuthEndpoints,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthChange>,
    storage: Option<SessionStorage>,
    // Serializes store, persist and broadcast so subscribers see changes in order.
    change_lock: Mutex<()>,
}

impl AuthClient {
    /// Build from config: HTTP client, optional session database, persisted session.
    /// Starts the background refresher when `auto_refresh` is on.
    pub async fn new(cfg: &Config) -> Result<Self, AdminError> {
        let storage = match cfg.session_db_url.as_deref() {
            Some(url) => Some(SessionStorage::connect(url).await?),
            None => None,
        };
        let client = Self::with_parts(cfg.http_client()?, cfg.auth_base()?, cfg, storage).await?;
        if cfg.auto_refresh {
            client.spawn_refresher(cfg.refresh_margin());
        }
        Ok(client)
    }

    /// Build with an explicit HTTP client and storage; no background refresher.
    pub async fn with_parts(
        http: reqwest::Client,
        auth_base: url::Url,
        cfg: &Config,
        storage: Option<SessionStorage>,
    ) -> Result<Self, AdminError> {
        let restored = match storage.as_ref() {
            Some(storage) => storage.load().await.unwrap_or_else(|e| {
                warn!(error = %e, "failed to load persisted session; starting signed out");
                None
            }),
            None => None,
        };
        if let Some(session) = restored.as_ref() {
            info!(
                user_id = session.user.as_ref().map(|u| u.id.as_str()).unwrap_or("-"),
                "restored persisted session"
            );
        }
        let (events, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            inner: Arc::new(AuthInner {
                endpoints: AuthEndpoints::new(http, auth_base, cfg.anon_key.clone()),
                session: RwLock::new(restored),
                events,
                storage,
                change_lock: Mutex::new(()),
            }),
        })
    }

    /// Current session snapshot from memory.
    pub fn current_session(&self) -> Option<Session> {
        self.inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Access token of the current session, if signed in.
    pub fn access_token(&self) -> Option<String> {
        self.current_session()
            .and_then(|s| s.access_token().map(str::to_string))
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription::new(self.inner.events.subscribe())
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AdminError> {
        let session = self.inner.endpoints.password_grant(email, password).await?;
        self.inner
            .set_session(AuthChangeEvent::SignedIn, Some(session.clone()))
            .await;
        Ok(session)
    }

    /// Replace the current session using its refresh token.
    pub async fn refresh_session(&self) -> Result<Session, AdminError> {
        self.inner.refresh().await
    }

    /// Fetch the user behind the current session and fold it into the session.
    /// The session is left alone if it changed while the request was in flight.
    pub async fn get_user(&self) -> Result<User, AdminError> {
        let token = self.access_token().ok_or(AdminError::MissingSession)?;
        let user = self.inner.endpoints.fetch_user(&token).await?;
        let Some(mut session) = self.current_session() else {
            return Ok(user);
        };
        if session.user.as_ref() != Some(&user) {
            session.user = Some(user.clone());
            self.inner
                .set_session_if(AuthChangeEvent::UserUpdated, Some(session), |current| {
                    current.and_then(Session::access_token) == Some(token.as_str())
                })
                .await;
        }
        Ok(user)
    }

    /// Revoke remotely (best effort), then clear locally and notify subscribers.
    pub async fn sign_out(&self) -> Result<(), AdminError> {
        if let Some(token) = self.access_token()
            && let Err(e) = self.inner.endpoints.logout(&token).await
        {
            warn!(error = %e, "remote sign-out failed; clearing local session anyway");
        }
        self.inner.set_session(AuthChangeEvent::SignedOut, None).await;
        info!("signed out");
        Ok(())
    }

    /// Refresh `margin` before expiry until the client is dropped.
    fn spawn_refresher(&self, margin: Duration) {
        let weak = Arc::downgrade(&self.inner);
        let changes = self.inner.events.subscribe();
        tokio::spawn(refresh_loop(weak, changes, margin));
    }
}

impl AuthInner {
    async fn set_session(&self, event: AuthChangeEvent, session: Option<Session>) {
        self.set_session_if(event, session, |_| true).await;
    }

    /// Apply a change only if `still_current` accepts the stored session,
    /// checked under the change lock. Returns whether the change was applied.
    async fn set_session_if(
        &self,
        event: AuthChangeEvent,
        session: Option<Session>,
        still_current: impl FnOnce(Option<&Session>) -> bool,
    ) -> bool {
        let _guard = self.change_lock.lock().await;

        let accepted = still_current(
            self.session
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref(),
        );
        if !accepted {
            debug!(?event, "session changed underneath; dropping stale update");
            return false;
        }

        if let Some(storage) = self.storage.as_ref() {
            let persisted = match session.as_ref() {
                Some(s) => storage.save(s).await,
                None => storage.clear().await,
            };
            if let Err(e) = persisted {
                warn!(error = %e, ?event, "failed to persist session change");
            }
        }

        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session.clone();

        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(AuthChange { event, session });
        debug!(?event, "session change broadcast");
        true
    }

    fn refresh_token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
    }

    /// Trade the stored refresh token for a new session. Fails with
    /// `SessionSuperseded` if the session was replaced or cleared meanwhile.
    async fn refresh(&self) -> Result<Session, AdminError> {
        let refresh_token = self.refresh_token().ok_or(AdminError::MissingSession)?;
        let mut session = self.endpoints.refresh_grant(&refresh_token).await?;
        if session.user.is_none() {
            session.user = self
                .session
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .and_then(|s| s.user.clone());
        }
        let applied = self
            .set_session_if(
                AuthChangeEvent::TokenRefreshed,
                Some(session.clone()),
                |current| {
                    current.and_then(|s| s.refresh_token.as_deref())
                        == Some(refresh_token.as_str())
                },
            )
            .await;
        if !applied {
            return Err(AdminError::SessionSuperseded);
        }
        Ok(session)
    }

    /// Time until the stored session should be refreshed. `None` when there
    /// is nothing to refresh: no session, no refresh token or unknown expiry.
    fn refresh_due_in(&self, margin: Duration) -> Option<Duration> {
        let guard = self.session.read().unwrap_or_else(PoisonError::into_inner);
        let session = guard.as_ref()?;
        session.refresh_token.as_ref()?;
        session.refresh_due_in(margin, Utc::now())
    }
}

/// Whether a refresh failure means the refresh token is dead. Timeouts and
/// rate limits are client-error statuses too but are worth retrying.
fn refresh_rejected(status: StatusCode) -> bool {
    status.is_client_error()
        && status != StatusCode::REQUEST_TIMEOUT
        && status != StatusCode::TOO_MANY_REQUESTS
}

async fn refresh_loop(
    inner: Weak<AuthInner>,
    mut changes: broadcast::Receiver<AuthChange>,
    margin: Duration,
) {
    debug!(margin_secs = margin.as_secs(), "session refresher started");
    loop {
        let due = match inner.upgrade() {
            Some(inner) => inner.refresh_due_in(margin),
            None => break,
        };

        let Some(due) = due else {
            // Nothing to refresh until the session changes.
            match changes.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        };

        tokio::select! {
            changed = changes.recv() => {
                if matches!(changed, Err(RecvError::Closed)) {
                    break;
                }
                continue;
            }
            () = tokio::time::sleep(due) => {}
        }

        let Some(strong) = inner.upgrade() else {
            break;
        };
        let started = strong.refresh_token();
        match strong.refresh().await {
            Ok(_) => {}
            Err(AdminError::Auth { status, message }) if refresh_rejected(status) => {
                warn!(%status, reason = %message, "refresh token rejected; signing out locally");
                strong
                    .set_session_if(AuthChangeEvent::SignedOut, None, |current| {
                        current.and_then(|s| s.refresh_token.clone()) == started
                    })
                    .await;
            }
            // The session changed under us; the next pass reads the new one.
            Err(AdminError::MissingSession | AdminError::SessionSuperseded) => {}
            Err(e) => {
                warn!(error = %e, "session refresh failed; will try again");
                drop(strong);
                tokio::time::sleep(REFRESH_RETRY_DELAY).await;
            }
        }
        // Our own refresh shows up as a change; skip it so `due` is recomputed once.
        while changes.try_recv().is_ok() {}
    }
    debug!("session refresher stopped");
}

#[async_trait]
impl AuthProvider for AuthClient {
    async fn get_current_session(&self) -> Result<Option<Session>, AdminError> {
        Ok(self.current_session())
    }

    fn on_session_change(&self) -> SessionSubscription {
        self.subscribe()
    }

    async fn sign_out(&self) -> Result<(), AdminError> {
        AuthClient::sign_out(self).await
    }
}
