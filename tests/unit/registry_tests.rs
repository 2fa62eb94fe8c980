//! Unit tests for the live session registry.
//!
//! Covers:
//! - Creation wiring launcher options through
//! - Interrupt returning `Ok(false)` for unknown ids
//! - Close releasing the handle but retaining metadata
//! - Last-created-wins project lookup

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use agent_dispatch::agent::{AgentClient, AgentEvent, AgentLauncher, AgentOptions};
use agent_dispatch::models::session::{PermissionMode, SessionStatus};
use agent_dispatch::orchestrator::SessionRegistry;
use agent_dispatch::Result;

#[derive(Default)]
struct StubClient {
    interrupted: AtomicBool,
    disconnected: AtomicBool,
}

impl AgentClient for StubClient {
    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn query<'a>(&'a self, _prompt: &'a str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    fn next_event(&self) -> Pin<Box<dyn Future<Output = Result<Option<AgentEvent>>> + Send + '_>> {
        Box::pin(async { Ok(None) })
    }

    fn interrupt(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.interrupted.store(true, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.disconnected.store(true, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

#[derive(Default)]
struct StubLauncher {
    launched: Mutex<Vec<AgentOptions>>,
    clients: Mutex<Vec<Arc<StubClient>>>,
}

impl AgentLauncher for StubLauncher {
    fn launch(&self, options: &AgentOptions) -> Result<Arc<dyn AgentClient>> {
        let client = Arc::new(StubClient::default());
        self.launched.lock().expect("lock").push(options.clone());
        self.clients.lock().expect("lock").push(Arc::clone(&client));
        Ok(client)
    }
}

fn registry() -> (Arc<StubLauncher>, SessionRegistry) {
    let launcher = Arc::new(StubLauncher::default());
    let registry = SessionRegistry::new(Arc::clone(&launcher) as Arc<dyn AgentLauncher>);
    (launcher, registry)
}

// ─── Creation ─────────────────────────────────────────────────────────

#[test]
fn create_registers_session_and_passes_options_through() {
    let (launcher, registry) = registry();

    let session = registry
        .create(
            "proj-1",
            "/work/proj-1".into(),
            Some("task-1".into()),
            PermissionMode::Plan,
            Some("resume-token".into()),
        )
        .expect("create");

    assert_eq!(session.status, SessionStatus::Active);
    assert!(registry.get(&session.id).is_some());
    assert!(registry.client(&session.id).is_some());

    let launched = launcher.launched.lock().expect("lock");
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].permission_mode, PermissionMode::Plan);
    assert_eq!(launched[0].resume_session_id.as_deref(), Some("resume-token"));
}

// ─── Interrupt ────────────────────────────────────────────────────────

#[tokio::test]
async fn interrupt_unknown_session_is_ok_false() {
    let (_launcher, registry) = registry();
    let delivered = registry.interrupt_session("no-such-id").await.expect("interrupt");
    assert!(!delivered);
}

#[tokio::test]
async fn interrupt_signals_client_and_marks_session() {
    let (launcher, registry) = registry();
    let session = registry
        .create("proj-1", "/work".into(), None, PermissionMode::Default, None)
        .expect("create");

    let delivered = registry.interrupt_session(&session.id).await.expect("interrupt");
    assert!(delivered);

    let client = &launcher.clients.lock().expect("lock")[0];
    assert!(client.interrupted.load(Ordering::SeqCst));
    assert_eq!(
        registry.get(&session.id).expect("metadata").status,
        SessionStatus::Interrupted
    );
}

// ─── Close ────────────────────────────────────────────────────────────

#[tokio::test]
async fn close_releases_handle_but_retains_metadata() {
    let (launcher, registry) = registry();
    let session = registry
        .create("proj-1", "/work".into(), None, PermissionMode::Default, None)
        .expect("create");

    registry.close_session(&session.id).await;

    assert!(registry.client(&session.id).is_none(), "handle released");
    let metadata = registry.get(&session.id).expect("metadata retained");
    assert_eq!(metadata.status, SessionStatus::Completed);
    assert!(metadata.ended_at.is_some());

    let client = &launcher.clients.lock().expect("lock")[0];
    assert!(client.disconnected.load(Ordering::SeqCst));
}

// ─── Project lookup ───────────────────────────────────────────────────

#[tokio::test]
async fn session_by_project_filters_on_project_and_status() {
    let (_launcher, registry) = registry();
    let ours = registry
        .create("proj-1", "/work".into(), None, PermissionMode::Default, None)
        .expect("create");
    let theirs = registry
        .create("proj-2", "/work".into(), None, PermissionMode::Default, None)
        .expect("create");

    let found = registry.session_by_project("proj-1").expect("present");
    assert_eq!(found.id, ours.id);

    registry.close_session(&theirs.id).await;
    assert!(registry.session_by_project("proj-2").is_none());
}

#[tokio::test]
async fn session_by_project_prefers_the_most_recent() {
    let (_launcher, registry) = registry();
    let _older = registry
        .create("proj-1", "/work".into(), None, PermissionMode::Default, None)
        .expect("create");
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let newer = registry
        .create("proj-1", "/work".into(), None, PermissionMode::Default, None)
        .expect("create");

    let found = registry.session_by_project("proj-1").expect("present");
    assert_eq!(found.id, newer.id);
}

#[test]
fn active_sessions_lists_only_live_entries() {
    let (_launcher, registry) = registry();
    registry
        .create("proj-1", "/work".into(), None, PermissionMode::Default, None)
        .expect("create");
    registry
        .create("proj-2", "/work".into(), None, PermissionMode::Default, None)
        .expect("create");

    assert_eq!(registry.active_sessions().len(), 2);
}
