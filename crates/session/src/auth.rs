// Anonymous session authentication and display-name reconciliation.

use std::sync::Arc;

use livecode_common::names::random_anonymous_name;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::IdentityError;
use crate::identity::{Identity, IdentityProvider};

/// The signed-in collaborator as seen by the rest of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub uid: String,
    pub name: String,
}

pub struct SessionAuthenticator<I> {
    provider: I,
    preferred_name: Option<String>,
    user: watch::Sender<Option<AuthenticatedUser>>,
}

impl<I: IdentityProvider> SessionAuthenticator<I> {
    pub fn new(provider: I) -> Self {
        let (user, _) = watch::channel(None);
        Self { provider, preferred_name: None, user }
    }

    /// Name used instead of a random animal when the provider has none stored.
    pub fn with_preferred_name(mut self, name: Option<String>) -> Self {
        self.set_preferred_name(name);
        self
    }

    pub fn set_preferred_name(&mut self, name: Option<String>) {
        self.preferred_name = name.filter(|name| !name.trim().is_empty());
    }

    pub fn provider(&self) -> &I {
        &self.provider
    }

    /// Sign in anonymously unless already signed in, then resolve the
    /// display name and publish the user.
    pub async fn ensure_identity(&self) -> Result<AuthenticatedUser, IdentityError> {
        let identity = match self.provider.current() {
            Some(identity) => identity,
            None => self.provider.sign_in_anonymously().await.inspect_err(|err| {
                warn!(code = %err.code, message = %err.message, "anonymous sign-in failed");
            })?,
        };
        let user = self.reconcile(identity).await;
        info!(user_id = %user.uid, name = %user.name, "identity available");
        self.publish(user.clone());
        Ok(user)
    }

    /// Latest resolved user; `None` until [`ensure_identity`](Self::ensure_identity)
    /// succeeds.
    pub fn watch_user(&self) -> watch::Receiver<Option<AuthenticatedUser>> {
        self.user.subscribe()
    }

    pub fn current_user(&self) -> Option<AuthenticatedUser> {
        self.user.borrow().clone()
    }

    async fn reconcile(&self, identity: Identity) -> AuthenticatedUser {
        if let Some(name) = identity.display_name.filter(|name| !name.trim().is_empty()) {
            return AuthenticatedUser { uid: identity.uid, name };
        }
        let name = self.preferred_name.clone().unwrap_or_else(random_anonymous_name);
        if let Err(err) = self.provider.update_display_name(&name).await {
            warn!(user_id = %identity.uid, error = %err, "failed to persist display name");
        }
        AuthenticatedUser { uid: identity.uid, name }
    }

    fn publish(&self, user: AuthenticatedUser) {
        self.user.send_if_modified(|slot| {
            if slot.as_ref() == Some(&user) {
                return false;
            }
            *slot = Some(user);
            true
        });
    }
}

impl<I: IdentityProvider> SessionAuthenticator<I> {
    /// Keep the published user in step with the provider for the rest of
    /// the session. The task ends when the provider goes away.
    pub fn follow_identity_changes(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut identities = this.provider.watch();
        identities.borrow_and_update();
        tokio::spawn(async move {
            while identities.changed().await.is_ok() {
                let identity = identities.borrow_and_update().clone();
                match identity {
                    Some(identity) => {
                        let user = this.reconcile(identity).await;
                        debug!(user_id = %user.uid, name = %user.name, "identity changed");
                        this.publish(user);
                    }
                    None => {
                        this.user.send_replace(None);
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentityProvider;
    use livecode_common::names::ANONYMOUS_PREFIX;

    #[tokio::test]
    async fn new_visitor_gets_persisted_animal_name() {
        let provider = MemoryIdentityProvider::new();
        let auth = SessionAuthenticator::new(provider.clone());

        let user = auth.ensure_identity().await.unwrap();
        assert!(user.name.starts_with(&format!("{ANONYMOUS_PREFIX} ")));
        assert_eq!(provider.stored_display_name().as_deref(), Some(user.name.as_str()));
        assert_eq!(auth.current_user(), Some(user));
    }

    #[tokio::test]
    async fn stored_name_is_reused() {
        let provider = MemoryIdentityProvider::with_profile("u1", "Anonymous Heron");
        let auth = SessionAuthenticator::new(provider);
        let user = auth.ensure_identity().await.unwrap();
        assert_eq!(user, AuthenticatedUser { uid: "u1".into(), name: "Anonymous Heron".into() });
    }

    #[tokio::test]
    async fn preferred_name_beats_random_animal() {
        let provider = MemoryIdentityProvider::with_uid("u1");
        let auth =
            SessionAuthenticator::new(provider.clone()).with_preferred_name(Some("Ada".into()));
        let user = auth.ensure_identity().await.unwrap();
        assert_eq!(user.name, "Ada");
        assert_eq!(provider.stored_display_name().as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn blank_preferred_name_is_ignored() {
        let auth = SessionAuthenticator::new(MemoryIdentityProvider::new())
            .with_preferred_name(Some("   ".into()));
        let user = auth.ensure_identity().await.unwrap();
        assert!(user.name.starts_with(ANONYMOUS_PREFIX));
    }

    #[tokio::test]
    async fn reuses_current_identity_without_signing_in_again() {
        let provider = MemoryIdentityProvider::new();
        let first = provider.sign_in_anonymously().await.unwrap();
        let auth = SessionAuthenticator::new(provider);
        let user = auth.ensure_identity().await.unwrap();
        assert_eq!(user.uid, first.uid);
    }

    #[tokio::test]
    async fn sign_in_failure_is_reported_and_nothing_published() {
        let auth = SessionAuthenticator::new(MemoryIdentityProvider::failing(
            "auth/admin-restricted-operation",
            "This operation is restricted to administrators only.",
        ));
        let error = auth.ensure_identity().await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "Error signing in: auth/admin-restricted-operation This operation is restricted to administrators only."
        );
        assert_eq!(auth.current_user(), None);
    }

    #[tokio::test]
    async fn follows_profile_renames() {
        let provider = MemoryIdentityProvider::with_profile("u1", "Anonymous Yak");
        let auth = Arc::new(SessionAuthenticator::new(provider.clone()));
        auth.ensure_identity().await.unwrap();

        let mut users = auth.watch_user();
        users.borrow_and_update();
        let task = auth.follow_identity_changes();

        provider.rename("Grace");
        users.changed().await.unwrap();
        assert_eq!(users.borrow().as_ref().map(|u| u.name.as_str()), Some("Grace"));
        task.abort();
    }
}
