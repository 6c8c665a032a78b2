// In-process identity provider. Clones share one "device": the same
// persisted uid and profile, as tabs of one browser do.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::error::IdentityError;
use crate::identity::{Identity, IdentityProvider};

#[derive(Debug, Clone)]
pub struct MemoryIdentityProvider {
    device: Arc<Device>,
}

#[derive(Debug)]
struct Device {
    persisted: Mutex<Persisted>,
    state: watch::Sender<Option<Identity>>,
}

#[derive(Debug, Default)]
struct Persisted {
    uid: Option<String>,
    display_name: Option<String>,
    sign_in_failure: Option<IdentityError>,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityProvider {
    /// A fresh device with no identity yet; the uid is minted on first
    /// sign-in.
    pub fn new() -> Self {
        Self::from_persisted(Persisted::default())
    }

    /// A device that already holds `uid` from an earlier visit.
    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self::from_persisted(Persisted { uid: Some(uid.into()), ..Persisted::default() })
    }

    /// A device whose stored profile already carries a display name.
    pub fn with_profile(uid: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::from_persisted(Persisted {
            uid: Some(uid.into()),
            display_name: Some(display_name.into()),
            sign_in_failure: None,
        })
    }

    /// A device whose sign-in attempts are rejected by the provider.
    pub fn failing(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_persisted(Persisted {
            sign_in_failure: Some(IdentityError::new(code, message)),
            ..Persisted::default()
        })
    }

    fn from_persisted(persisted: Persisted) -> Self {
        let (state, _) = watch::channel(None);
        Self { device: Arc::new(Device { persisted: Mutex::new(persisted), state }) }
    }

    /// Edit the stored profile name out of band (e.g. from account settings).
    pub fn rename(&self, display_name: impl Into<String>) {
        let identity = {
            let mut persisted = self.lock();
            persisted.display_name = Some(display_name.into());
            persisted.uid.clone().map(|uid| Identity {
                uid,
                display_name: persisted.display_name.clone(),
                is_anonymous: true,
            })
        };
        if self.device.state.borrow().is_some() {
            self.device.state.send_replace(identity);
        }
    }

    pub fn stored_display_name(&self) -> Option<String> {
        self.lock().display_name.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Persisted> {
        self.device.persisted.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    fn current(&self) -> Option<Identity> {
        self.device.state.borrow().clone()
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, IdentityError> {
        let identity = {
            let mut persisted = self.lock();
            if let Some(failure) = persisted.sign_in_failure.clone() {
                return Err(failure);
            }
            let uid =
                persisted.uid.get_or_insert_with(|| Uuid::new_v4().simple().to_string()).clone();
            Identity {
                uid,
                display_name: persisted.display_name.clone(),
                is_anonymous: true,
            }
        };
        debug!(uid = %identity.uid, "anonymous sign-in");
        self.device.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn update_display_name(&self, name: &str) -> Result<(), IdentityError> {
        let identity = {
            let mut persisted = self.lock();
            let Some(uid) = persisted.uid.clone() else {
                return Err(IdentityError::new("auth/no-current-user", "no user is signed in"));
            };
            persisted.display_name = Some(name.to_string());
            Identity { uid, display_name: Some(name.to_string()), is_anonymous: true }
        };
        self.device.state.send_replace(Some(identity));
        Ok(())
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.device.state.subscribe()
    }
}
