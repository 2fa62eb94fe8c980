//! Subprocess-backed agent client.
//!
//! Spawns one backend process per session with `kill_on_drop(true)`,
//! an environment allowlist (broker URLs and other secrets never leak
//! into the child), and the session's working directory. The prompt is
//! written as an NDJSON line to stdin; turn events arrive as NDJSON
//! lines on stdout. A suspended turn's backend context is reattached by
//! relaunching the process with `--resume <token>`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{info, warn};

use super::codec::EventCodec;
use super::{AgentClient, AgentEvent, AgentLauncher, AgentOptions};
use crate::config::AgentConfig;
use crate::{AppError, Result};

/// Environment variables inherited by the spawned backend process.
///
/// Every other variable is stripped via `env_clear()` before launch.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "RUST_LOG",
    // Windows-specific variables.
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
];

type EventReader = FramedRead<ChildStdout, EventCodec>;
type CommandWriter = FramedWrite<ChildStdin, EventCodec>;

/// Launcher producing [`SubprocessClient`] handles.
pub struct SubprocessLauncher {
    config: AgentConfig,
}

impl SubprocessLauncher {
    /// Create a launcher with the configured host CLI.
    #[must_use]
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }
}

impl AgentLauncher for SubprocessLauncher {
    fn launch(&self, options: &AgentOptions) -> Result<Arc<dyn AgentClient>> {
        Ok(Arc::new(SubprocessClient::new(
            self.config.clone(),
            options.clone(),
        )))
    }
}

/// One live backend process driven over stdio.
///
/// Writer and reader sit behind separate locks so an interrupt can be
/// written while the orchestrator is blocked pulling the next event.
pub struct SubprocessClient {
    config: AgentConfig,
    options: AgentOptions,
    child: Mutex<Option<Child>>,
    writer: Mutex<Option<CommandWriter>>,
    reader: Mutex<Option<EventReader>>,
}

impl SubprocessClient {
    /// Build an unconnected client; [`AgentClient::connect`] spawns the
    /// process.
    #[must_use]
    pub fn new(config: AgentConfig, options: AgentOptions) -> Self {
        Self {
            config,
            options,
            child: Mutex::new(None),
            writer: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    async fn spawn(&self) -> Result<()> {
        let mut cmd = Command::new(&self.config.command);
        for arg in &self.config.args {
            cmd.arg(arg);
        }
        cmd.arg("--permission-mode")
            .arg(self.options.permission_mode.as_str());
        if let Some(ref token) = self.options.resume_session_id {
            cmd.arg("--resume").arg(token);
        }

        cmd.env_clear();
        for &key in ALLOWED_ENV_VARS {
            if let Ok(val) = std::env::var(key) {
                cmd.env(key, val);
            }
        }

        cmd.current_dir(&self.options.working_directory)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| AppError::Agent(format!("failed to spawn agent: {err}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Agent("failed to capture agent stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Agent("failed to capture agent stdout".into()))?;

        *self.writer.lock().await = Some(FramedWrite::new(stdin, EventCodec::new()));
        *self.reader.lock().await = Some(FramedRead::new(stdout, EventCodec::new()));
        *self.child.lock().await = Some(child);
        Ok(())
    }

    async fn send_line(&self, line: String) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| AppError::Agent("agent not connected".into()))?;
        writer.send(line).await
    }
}

impl AgentClient for SubprocessClient {
    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.spawn())
    }

    fn query<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let line = json!({ "type": "prompt", "prompt": prompt }).to_string();
            self.send_line(line).await
        })
    }

    fn next_event(&self) -> Pin<Box<dyn Future<Output = Result<Option<AgentEvent>>> + Send + '_>> {
        Box::pin(async move {
            let mut guard = self.reader.lock().await;
            let reader = guard
                .as_mut()
                .ok_or_else(|| AppError::Agent("agent not connected".into()))?;
            match reader.next().await {
                None => Ok(None),
                Some(Err(err)) => Err(err),
                Some(Ok(line)) => {
                    let event: AgentEvent = serde_json::from_str(&line)
                        .map_err(|err| AppError::Agent(format!("malformed agent event: {err}")))?;
                    Ok(Some(event))
                }
            }
        })
    }

    fn interrupt(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let line = json!({ "type": "interrupt" }).to_string();
            if let Err(err) = self.send_line(line).await {
                // Stdin gone; fall back to killing the process.
                warn!(%err, "interrupt write failed, killing agent process");
                let mut guard = self.child.lock().await;
                if let Some(child) = guard.as_mut() {
                    child
                        .start_kill()
                        .map_err(|kill_err| AppError::Agent(kill_err.to_string()))?;
                }
            }
            Ok(())
        })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            // Dropping the writer closes stdin, signalling EOF to the agent.
            self.writer.lock().await.take();
            self.reader.lock().await.take();

            let child = self.child.lock().await.take();
            let Some(mut child) = child else {
                return Ok(());
            };

            let grace = Duration::from_secs(self.config.shutdown_grace_seconds);
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(exit)) => {
                    info!(?exit, "agent process exited");
                }
                Ok(Err(err)) => {
                    warn!(%err, "error waiting for agent process");
                }
                Err(_) => {
                    warn!("agent process did not exit within grace period, forcing kill");
                    if let Err(err) = child.kill().await {
                        warn!(%err, "failed to force-kill agent process");
                    }
                }
            }
            Ok(())
        })
    }
}
