// livecode-session: workspace identity, access, presence and buffer
// coordination on top of a realtime replicated store.

pub mod auth;
pub mod buffer;
pub mod config;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod permission;
pub mod presence;
pub mod refs;
pub mod resolver;
pub mod runtime;
pub mod session;
pub mod store;

pub use error::{BufferError, IdentityError, SessionError, StoreError};
pub use session::{JoinedWorkspace, SessionState, SessionSurface, WorkspaceSession};
