//! Agent-execution backend abstraction.
//!
//! The [`AgentClient`] trait decouples the orchestrator from the agent
//! transport: connect, submit a prompt, pull events, cooperatively
//! interrupt, disconnect. [`AgentLauncher`] constructs clients for the
//! session registry; the production implementation spawns one backend
//! process per session ([`subprocess`]).

pub mod codec;
pub mod events;
pub mod subprocess;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

pub use events::{AgentEvent, ResultEvent, TurnMetrics, TurnUsage};
pub use subprocess::SubprocessLauncher;

use crate::models::session::PermissionMode;
use crate::Result;

/// Per-session backend configuration assembled by the registry.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Directory the backend operates in.
    pub working_directory: PathBuf,
    /// Permission mode, passed through unchanged.
    pub permission_mode: PermissionMode,
    /// Resume token of a previously suspended turn's backend context.
    pub resume_session_id: Option<String>,
}

/// Handle to one live agent backend session.
///
/// Shared between the request orchestrator (streaming a turn) and the
/// stop orchestrator (interrupting it), so every operation takes `&self`.
pub trait AgentClient: Send + Sync {
    /// Establish the backend connection.
    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Submit a prompt, starting the turn's event stream.
    fn query<'a>(&'a self, prompt: &'a str)
        -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Pull the next event; `None` means the stream ended.
    fn next_event(&self) -> Pin<Box<dyn Future<Output = Result<Option<AgentEvent>>> + Send + '_>>;

    /// Cooperatively cancel the in-flight turn.
    fn interrupt(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Release the backend connection.
    fn disconnect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Constructs backend clients for new sessions.
pub trait AgentLauncher: Send + Sync {
    /// Build a client configured with `options`. Construction is cheap;
    /// no connection is made until [`AgentClient::connect`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Agent` if the options cannot be realized.
    fn launch(&self, options: &AgentOptions) -> Result<Arc<dyn AgentClient>>;
}
