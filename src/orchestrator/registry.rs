//! In-process registry of live agent execution sessions.
//!
//! Maps a session id to its metadata and live backend handle. The
//! registry is constructed once at process start and shared by
//! reference into the orchestrators; exactly one orchestrator process
//! owns all live sessions system-wide. Metadata entries persist for
//! the process lifetime; only the live handle is released on close.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{info, warn};

use crate::agent::{AgentClient, AgentLauncher, AgentOptions};
use crate::models::session::{ExecutionSession, PermissionMode, SessionStatus};
use crate::Result;

/// Registry of live sessions and their backend clients.
pub struct SessionRegistry {
    launcher: Arc<dyn AgentLauncher>,
    sessions: Mutex<HashMap<String, ExecutionSession>>,
    clients: Mutex<HashMap<String, Arc<dyn AgentClient>>>,
}

impl SessionRegistry {
    /// Create an empty registry backed by `launcher`.
    #[must_use]
    pub fn new(launcher: Arc<dyn AgentLauncher>) -> Self {
        Self {
            launcher,
            sessions: Mutex::new(HashMap::new()),
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn sessions_lock(&self) -> MutexGuard<'_, HashMap<String, ExecutionSession>> {
        // A poisoned mutex means a panic mid-update; continuing with the
        // inner map is still coherent for these single-key operations.
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn clients_lock(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn AgentClient>>> {
        self.clients
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Allocate a fresh session and its configured backend handle.
    ///
    /// The backend is constructed with the working directory, the
    /// translated permission mode, and the resume token when the turn
    /// continues a previously suspended one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Agent` if the backend client cannot be built.
    pub fn create(
        &self,
        project_id: &str,
        working_directory: PathBuf,
        task_id: Option<String>,
        permission_mode: PermissionMode,
        resume_session_id: Option<String>,
    ) -> Result<ExecutionSession> {
        let session =
            ExecutionSession::new(project_id.to_owned(), working_directory.clone(), task_id);
        let client = self.launcher.launch(&AgentOptions {
            working_directory,
            permission_mode,
            resume_session_id,
        })?;

        self.sessions_lock()
            .insert(session.id.clone(), session.clone());
        self.clients_lock().insert(session.id.clone(), client);
        info!(session_id = %session.id, project_id, "session created");
        Ok(session)
    }

    /// Look up session metadata; `None` when the id is unknown.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<ExecutionSession> {
        self.sessions_lock().get(session_id).cloned()
    }

    /// Look up the live backend handle; `None` when released or unknown.
    #[must_use]
    pub fn client(&self, session_id: &str) -> Option<Arc<dyn AgentClient>> {
        self.clients_lock().get(session_id).cloned()
    }

    /// Signal the live handle to cancel and mark the session
    /// interrupted. Returns `Ok(false)` for an unknown id rather than
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Agent` if the interrupt signal fails.
    pub async fn interrupt_session(&self, session_id: &str) -> Result<bool> {
        let client = self.clients_lock().get(session_id).cloned();
        let Some(client) = client else {
            return Ok(false);
        };
        if self.get(session_id).is_none() {
            return Ok(false);
        }

        client.interrupt().await?;
        if let Some(session) = self.sessions_lock().get_mut(session_id) {
            session.status = SessionStatus::Interrupted;
        }
        info!(session_id, "session interrupted");
        Ok(true)
    }

    /// Disconnect and release the live handle, mark the session
    /// completed, and stamp its end time. The metadata entry stays in
    /// the registry.
    pub async fn close_session(&self, session_id: &str) {
        let client = self.clients_lock().remove(session_id);
        if let Some(client) = client {
            if let Err(err) = client.disconnect().await {
                warn!(session_id, %err, "agent disconnect failed");
            }
        }

        if let Some(session) = self.sessions_lock().get_mut(session_id) {
            session.status = SessionStatus::Completed;
            session.ended_at = Some(Utc::now());
        }
        info!(session_id, "session closed");
    }

    /// All sessions currently in `Active` status.
    #[must_use]
    pub fn active_sessions(&self) -> Vec<ExecutionSession> {
        self.sessions_lock()
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .cloned()
            .collect()
    }

    /// The active session for a project, if any.
    ///
    /// Session uniqueness per project is not guaranteed; when several
    /// are active the most recently created wins.
    #[must_use]
    pub fn session_by_project(&self, project_id: &str) -> Option<ExecutionSession> {
        self.sessions_lock()
            .values()
            .filter(|s| s.project_id == project_id && s.status == SessionStatus::Active)
            .max_by_key(|s| s.started_at)
            .cloned()
    }
}
