use super::RestClient;
use crate::{
    domain::Principal,
    ports::{AuthProvider, StoreResult},
};
use async_trait::async_trait;
use tokio::sync::watch;

/// Holds the current remote session and publishes every change to subscribers.
pub struct SessionAuth {
    client: RestClient,
    session: watch::Sender<Option<Principal>>,
}

impl SessionAuth {
    pub fn new(client: RestClient, session: Option<Principal>) -> Self {
        let (session, _) = watch::channel(session);
        Self { client, session }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> StoreResult<Principal> {
        let principal: Principal = self.client.sign_in(email, password).await?.into();
        tracing::info!("Signed in as {}", principal.user_id);

        self.session.send_replace(Some(principal.clone()));
        Ok(principal)
    }

    pub fn sign_out(&self) {
        if let Some(principal) = self.session.send_replace(None) {
            tracing::info!("Signed out {}", principal.user_id);
        }
    }

    /// Drop a session the backend no longer accepts.
    pub fn expire(&self) {
        if let Some(principal) = self.session.send_replace(None) {
            tracing::warn!("Session for {} expired", principal.user_id);
        }
    }
}

#[async_trait]
impl AuthProvider for SessionAuth {
    async fn current_principal(&self) -> Option<Principal> {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
        self.session.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    fn signed_in() -> SessionAuth {
        let client = RestClient::new("http://localhost:54321", "anon").unwrap();
        let principal = Principal {
            user_id: UserId::from("u1"),
            email: None,
            access_token: "t".to_string(),
        };
        SessionAuth::new(client, Some(principal))
    }

    #[tokio::test]
    async fn sign_out_clears_session_and_notifies_subscribers() {
        let auth = signed_in();
        let mut sessions = auth.subscribe();
        assert!(auth.current_principal().await.is_some());
        assert!(!sessions.has_changed().unwrap());

        auth.sign_out();

        assert_eq!(auth.current_principal().await, None);
        assert!(sessions.has_changed().unwrap());
        assert_eq!(*sessions.borrow_and_update(), None);
    }

    #[tokio::test]
    async fn expiry_is_published() {
        let auth = signed_in();
        let mut sessions = auth.subscribe();

        auth.expire();

        sessions.changed().await.unwrap();
        assert_eq!(*sessions.borrow(), None);
        assert_eq!(auth.current_principal().await, None);
    }
}
