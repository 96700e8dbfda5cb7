use crate::domain::Principal;
use async_trait::async_trait;
use tokio::sync::watch;

/// Session transitions the coordinator reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Principal),
    SignedOut,
}

impl From<Option<Principal>> for SessionEvent {
    fn from(principal: Option<Principal>) -> Self {
        match principal {
            Some(principal) => SessionEvent::SignedIn(principal),
            None => SessionEvent::SignedOut,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_principal(&self) -> Option<Principal>;

    /// Receiver that is notified every time the session is started, replaced or ended.
    fn subscribe(&self) -> watch::Receiver<Option<Principal>>;
}
