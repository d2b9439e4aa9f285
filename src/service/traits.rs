use crate::error::AdminError;
use crate::types::{AuthChange, NewProfile, Profile, Session};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

/// The hosted auth service as seen by the session controller.
#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    /// Session currently held by the provider, if any.
    async fn get_current_session(&self) -> Result<Option<Session>, AdminError>;

    /// Start receiving session changes. Dropping the subscription unsubscribes.
    fn on_session_change(&self) -> SessionSubscription;

    async fn sign_out(&self) -> Result<(), AdminError>;
}

/// Remote `profiles` table.
#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    async fn find_by_email(&self, email: &str) -> Result<Vec<Profile>, AdminError>;

    async fn insert(&self, profile: NewProfile) -> Result<(), AdminError>;
}

/// Ordered stream of session changes from one provider.
#[derive(Debug)]
pub struct SessionSubscription {
    rx: broadcast::Receiver<AuthChange>,
}

impl SessionSubscription {
    pub fn new(rx: broadcast::Receiver<AuthChange>) -> Self {
        Self { rx }
    }

    /// Next change, or `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<AuthChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session subscriber lagged; older changes dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving changes. Same as dropping the subscription.
    pub fn unsubscribe(self) {
        drop(self.rx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AuthChangeEvent;

    #[tokio::test]
    async fn unsubscribe_releases_the_receiver() {
        let (tx, _) = broadcast::channel(4);
        let mut kept = SessionSubscription::new(tx.subscribe());
        let gone = SessionSubscription::new(tx.subscribe());
        assert_eq!(tx.receiver_count(), 2);

        gone.unsubscribe();
        assert_eq!(tx.receiver_count(), 1);

        tx.send(AuthChange {
            event: AuthChangeEvent::SignedOut,
            session: None,
        })
        .unwrap();
        assert_eq!(kept.next().await.unwrap().event, AuthChangeEvent::SignedOut);
    }
}
