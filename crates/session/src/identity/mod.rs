// Identity provider abstraction (anonymous sign-in).

pub mod memory;

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::IdentityError;

pub use memory::MemoryIdentityProvider;

/// An identity issued by the provider. `uid` is opaque and stable across
/// reloads for the same device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

pub trait IdentityProvider: Send + Sync + 'static {
    /// The signed-in identity, if any.
    fn current(&self) -> Option<Identity>;

    /// Sign in anonymously, reusing the persisted identity when one exists.
    fn sign_in_anonymously(&self) -> impl Future<Output = Result<Identity, IdentityError>> + Send;

    /// Persist a display name on the current identity's profile.
    fn update_display_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<(), IdentityError>> + Send;

    /// Identity-state changes (sign-in, sign-out, profile updates).
    fn watch(&self) -> watch::Receiver<Option<Identity>>;
}
