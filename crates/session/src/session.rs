// Workspace session driver.
//
// Runs the join sequence exactly once:
//   resolve workspace -> authenticate -> resolve permission -> join presence
// and publishes each state transition over a watch channel. Repeat calls to
// `join` return the first outcome without touching the store again.

use std::sync::{Arc, Mutex};

use livecode_common::color::color_from_user_id;
use livecode_common::types::{AccessLevel, Language, OnlineUser, Permission};
use serde::Serialize;
use tokio::sync::{watch, OnceCell};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::auth::{AuthenticatedUser, SessionAuthenticator};
use crate::buffer::{BufferSet, CaretNamespace};
use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::identity::IdentityProvider;
use crate::lifecycle::ConnectionMarker;
use crate::permission::PermissionGate;
use crate::presence::{OnlineUsersWatch, PresenceTracker};
use crate::refs::WorkspaceRef;
use crate::resolver::{IdentityResolver, Location};
use crate::store::RealtimeStore;

/// Where refused visitors are sent.
pub const REFUSAL_REDIRECT: &str = "/";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unresolved,
    Authenticating,
    ResolvingPermission,
    Joined(Box<JoinedWorkspace>),
    Refused,
    Failed(SessionError),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unresolved => "UNRESOLVED",
            Self::Authenticating => "AUTHENTICATING",
            Self::ResolvingPermission => "RESOLVING_PERMISSION",
            Self::Joined(_) => "JOINED",
            Self::Refused => "REFUSED",
            Self::Failed(_) => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Joined(_) | Self::Refused | Self::Failed(_))
    }
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedWorkspace {
    pub workspace: WorkspaceRef,
    pub user: AuthenticatedUser,
    pub color: String,
    pub permission: Permission,
    pub default_permission: AccessLevel,
    pub marker: ConnectionMarker,
    pub first_join: bool,
    /// The workspace handle was minted by this session.
    pub minted: bool,
}

impl JoinedWorkspace {
    pub fn caret(&self) -> CaretNamespace {
        CaretNamespace { user_id: self.user.uid.clone(), color: self.color.clone() }
    }
}

/// UI-facing snapshot of a joined session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSurface {
    pub current_workspace_handle: String,
    pub effective_permission: Permission,
    pub default_permission: AccessLevel,
    pub user: AuthenticatedUser,
    pub online_users: Vec<OnlineUser>,
    pub buffers: Vec<BufferSurface>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferSurface {
    pub language: Language,
    pub content_ref: String,
    pub editable: bool,
}

pub struct WorkspaceSession<S, I, L> {
    store: S,
    location: L,
    auth: Arc<SessionAuthenticator<I>>,
    languages: Vec<Language>,
    default_language: Language,
    state: watch::Sender<SessionState>,
    outcome: OnceCell<Result<JoinedWorkspace, SessionError>>,
    identity_task: Mutex<Option<JoinHandle<()>>>,
}

impl<S, I, L> WorkspaceSession<S, I, L>
where
    S: RealtimeStore,
    I: IdentityProvider,
    L: Location,
{
    pub fn new(store: S, provider: I, location: L) -> Self {
        let (state, _) = watch::channel(SessionState::Unresolved);
        Self {
            store,
            location,
            auth: Arc::new(SessionAuthenticator::new(provider)),
            languages: Language::ALL.to_vec(),
            default_language: Language::Cpp,
            state,
            outcome: OnceCell::new(),
            identity_task: Mutex::new(None),
        }
    }

    /// Take the preferred name and buffer languages from client config.
    pub fn with_config(mut self, config: &ClientConfig) -> Self {
        if let Some(auth) = Arc::get_mut(&mut self.auth) {
            auth.set_preferred_name(config.display_name.clone());
        }
        self.languages = config.effective_languages();
        self.default_language = config.default_language;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    pub fn authenticator(&self) -> &Arc<SessionAuthenticator<I>> {
        &self.auth
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run the join sequence, or return the outcome of the run already made.
    pub async fn join(&self) -> Result<JoinedWorkspace, SessionError> {
        self.outcome.get_or_init(|| self.run_join()).await.clone()
    }

    async fn run_join(&self) -> Result<JoinedWorkspace, SessionError> {
        let result = self.join_sequence().await;
        match &result {
            Ok(joined) => {
                info!(
                    handle = %joined.workspace.handle(),
                    user_id = %joined.user.uid,
                    permission = %joined.permission,
                    first_join = joined.first_join,
                    "session joined"
                );
                self.transition(SessionState::Joined(Box::new(joined.clone())));
            }
            Err(SessionError::AccessRefused) => self.transition(SessionState::Refused),
            Err(err) => {
                error!(error = %err, "session failed");
                self.transition(SessionState::Failed(err.clone()));
            }
        }
        result
    }

    async fn join_sequence(&self) -> Result<JoinedWorkspace, SessionError> {
        let resolved = IdentityResolver::new(&self.store, &self.location).resolve()?;
        let workspace = resolved.workspace;

        self.transition(SessionState::Authenticating);
        let user = self.auth.ensure_identity().await?;
        self.follow_identity();

        self.transition(SessionState::ResolvingPermission);
        let decision =
            PermissionGate::new(&self.store).resolve_effective_permission(&workspace, &user.uid).await?;
        let Some(permission) = decision.effective() else {
            warn!(handle = %workspace.handle(), user_id = %user.uid, "refusing private workspace");
            self.location.assign(REFUSAL_REDIRECT);
            return Err(SessionError::AccessRefused);
        };

        let user_ref = workspace.user(&user.uid);
        let presence = PresenceTracker::new(&self.store);
        let first_join = decision.is_first_join();
        let marker = match decision.existing.as_ref().filter(|entry| !entry.is_first_join()) {
            Some(stored) => presence.join_returning(&user_ref, stored, &user.name).await?,
            None => presence.join_first_time(&user_ref, permission, &user.name).await?,
        };

        Ok(JoinedWorkspace {
            color: color_from_user_id(&user.uid),
            workspace,
            user,
            permission,
            default_permission: decision.default_permission,
            marker,
            first_join,
            minted: resolved.minted,
        })
    }

    fn transition(&self, next: SessionState) {
        info!(state = next.name(), "session state");
        self.state.send_replace(next);
    }

    fn follow_identity(&self) {
        let mut task = self.identity_task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if task.is_none() {
            *task = Some(self.auth.follow_identity_changes());
        }
    }

    /// The joined workspace, if the join succeeded.
    pub fn joined(&self) -> Result<&JoinedWorkspace, SessionError> {
        match self.outcome.get() {
            Some(Ok(joined)) => Ok(joined),
            _ => Err(SessionError::NotJoined),
        }
    }

    /// Owner settings action.
    pub async fn set_default_permission(&self, level: AccessLevel) -> Result<(), SessionError> {
        let joined = self.joined()?;
        PermissionGate::new(&self.store)
            .set_default_permission(&joined.workspace, joined.permission, level)
            .await
    }

    pub async fn online_users(&self) -> Result<Vec<OnlineUser>, SessionError> {
        let joined = self.joined()?;
        Ok(PresenceTracker::new(&self.store).online_users(&joined.workspace).await?)
    }

    pub async fn watch_online_users(&self) -> Result<OnlineUsersWatch, SessionError> {
        let joined = self.joined()?;
        Ok(PresenceTracker::new(&self.store).watch_online_users(&joined.workspace).await?)
    }

    /// One buffer coordinator per configured language.
    pub fn buffers(&self) -> Result<BufferSet, SessionError> {
        let joined = self.joined()?;
        Ok(BufferSet::new(
            Some(&joined.workspace),
            Some(joined.permission),
            joined.caret(),
            &self.languages,
            self.default_language,
        ))
    }

    pub async fn surface(&self) -> Result<SessionSurface, SessionError> {
        let joined = self.joined()?;
        let online_users = self.online_users().await?;
        let buffers = self
            .buffers()?
            .languages()
            .map(|language| BufferSurface {
                language,
                content_ref: joined.workspace.buffer(language).to_string(),
                editable: joined.permission.can_edit(),
            })
            .collect();
        Ok(SessionSurface {
            current_workspace_handle: joined.workspace.handle().to_string(),
            effective_permission: joined.permission,
            default_permission: joined.default_permission,
            user: joined.user.clone(),
            online_users,
            buffers,
        })
    }
}

impl<S, I, L> Drop for WorkspaceSession<S, I, L> {
    fn drop(&mut self) {
        let task = self.identity_task.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(task) = task.take() {
            task.abort();
        }
    }
}
