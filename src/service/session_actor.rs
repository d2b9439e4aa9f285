use crate::error::AdminError;
use crate::service::traits::{AuthProvider, ProfileStore};
use crate::types::{AuthChange, AuthChangeEvent, AuthSnapshot, NewProfile, Session, User};

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

/// Messages handled by the session actor.
#[derive(Debug)]
pub enum SessionMessage {
    /// A session change, either from the provider subscription or the initial fetch.
    SessionChanged(AuthChange),
    /// Whether the one-shot profile bootstrap has already run.
    ProfileChecked(RpcReplyPort<bool>),
}

/// Handle for reading session state and signing out.
#[derive(Clone)]
pub struct SessionHandle {
    actor: ActorRef<SessionMessage>,
    provider: Arc<dyn AuthProvider>,
    snapshot: watch::Receiver<AuthSnapshot>,
}

impl SessionHandle {
    pub fn snapshot(&self) -> AuthSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.snapshot.borrow().user.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.snapshot.borrow().session.clone()
    }

    pub fn loading(&self) -> bool {
        self.snapshot.borrow().loading
    }

    /// Receiver that is notified on every snapshot replacement.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.snapshot.clone()
    }

    /// Snapshot changes as a stream, starting with the current value.
    pub fn changes(&self) -> WatchStream<AuthSnapshot> {
        WatchStream::new(self.snapshot.clone())
    }

    /// Resolve once the initial session fetch has completed.
    pub async fn wait_until_loaded(&self) -> Result<AuthSnapshot, AdminError> {
        let mut rx = self.snapshot.clone();
        let snap = rx
            .wait_for(|s| !s.loading)
            .await
            .map_err(|e| AdminError::RactorError(format!("session actor gone: {e}")))?;
        Ok(snap.clone())
    }

    /// Sign out through the provider. Local state is cleared when the
    /// provider's sign-out notification arrives, not here.
    pub async fn sign_out(&self) -> Result<(), AdminError> {
        self.provider.sign_out().await
    }

    /// True once a profile check has been attempted by this controller.
    pub async fn is_profile_checked(&self) -> Result<bool, AdminError> {
        ractor::call!(self.actor, SessionMessage::ProfileChecked)
            .map_err(|e| AdminError::RactorError(format!("ProfileChecked RPC failed: {e}")))
    }

    /// Stop the controller and unsubscribe from the provider.
    pub fn stop(&self) {
        self.actor.stop(None);
    }
}

struct SessionActorState {
    profiles: Arc<dyn ProfileStore>,
    snapshot: watch::Sender<AuthSnapshot>,
    /// One-shot latch: set on the first authenticated session, never reset.
    profile_checked: bool,
    forwarder: JoinHandle<()>,
}

struct SessionActor;

struct SessionActorArgs {
    provider: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileStore>,
    snapshot: watch::Sender<AuthSnapshot>,
}

#[ractor::async_trait]
impl Actor for SessionActor {
    type Msg = SessionMessage;
    type State = SessionActorState;
    type Arguments = SessionActorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        // Subscribe before fetching so no change between the two is lost.
        let mut subscription = args.provider.on_session_change();

        let initial = match args.provider.get_current_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "initial session fetch failed; starting signed out");
                None
            }
        };
        ractor::cast!(
            myself,
            SessionMessage::SessionChanged(AuthChange {
                event: AuthChangeEvent::InitialSession,
                session: initial,
            })
        )
        .map_err(|e| ActorProcessingErr::from(format!("initial session enqueue failed: {e}")))?;

        let me = myself.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(change) = subscription.next().await {
                if ractor::cast!(me, SessionMessage::SessionChanged(change)).is_err() {
                    break;
                }
            }
            debug!("session change forwarder stopped");
        });

        info!("SessionActor started");
        Ok(SessionActorState {
            profiles: args.profiles,
            snapshot: args.snapshot,
            profile_checked: false,
            forwarder,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SessionMessage::SessionChanged(change) => {
                self.handle_session_changed(state, change).await;
            }
            SessionMessage::ProfileChecked(rp) => {
                let _ = rp.send(state.profile_checked);
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        // Dropping the forwarder drops the provider subscription.
        state.forwarder.abort();
        info!("SessionActor stopped");
        Ok(())
    }
}

impl SessionActor {
    async fn handle_session_changed(&self, state: &mut SessionActorState, change: AuthChange) {
        let AuthChange { event, session } = change;
        debug!(
            ?event,
            user_id = session
                .as_ref()
                .and_then(|s| s.user.as_ref())
                .map(|u| u.id.as_str())
                .unwrap_or("-"),
            "session changed"
        );

        state
            .snapshot
            .send_replace(AuthSnapshot::replaced_with(session.clone()));

        if let Some(session) = session.as_ref() {
            self.bootstrap_profile(state, session).await;
        }
    }

    /// Check for and create the user's profile, at most once per actor lifetime.
    /// Failures are logged and swallowed; the latch is set either way.
    async fn bootstrap_profile(&self, state: &mut SessionActorState, session: &Session) {
        if state.profile_checked {
            return;
        }
        let Some(user) = session.authenticated_user() else {
            return;
        };
        state.profile_checked = true;

        let Some(profile) = NewProfile::from_user(user) else {
            warn!(user_id = %user.id, "session user has no email; profile bootstrap skipped");
            return;
        };

        match state.profiles.find_by_email(&profile.email).await {
            Ok(rows) if !rows.is_empty() => {
                debug!(email = %profile.email, "profile already exists");
            }
            Ok(_) => {
                let email = profile.email.clone();
                match state.profiles.insert(profile).await {
                    Ok(()) => info!(%email, "profile created"),
                    Err(e) => warn!(%email, error = %e, "profile insert failed; not retrying"),
                }
            }
            Err(e) => {
                warn!(email = %profile.email, error = %e, "profile lookup failed; not retrying");
            }
        }
    }
}

/// Spawn a session controller over the given provider and profile store.
///
/// Each call creates an independent controller with its own latch.
pub async fn spawn(
    provider: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileStore>,
) -> Result<SessionHandle, AdminError> {
    let (tx, rx) = watch::channel(AuthSnapshot::initial());
    let args = SessionActorArgs {
        provider: provider.clone(),
        profiles,
        snapshot: tx,
    };
    let (actor, _jh) = Actor::spawn(None, SessionActor, args)
        .await
        .map_err(|e| AdminError::RactorError(format!("failed to spawn SessionActor: {e}")))?;
    Ok(SessionHandle {
        actor,
        provider,
        snapshot: rx,
    })
}
