//! Integration tests for the cancellation flow.
//!
//! A stop request interrupts the project's active session when one
//! exists; otherwise it is a quiet no-op. Nothing is ever published
//! on the stop path.

use std::sync::atomic::Ordering;

use agent_dispatch::messages::StopRequest;
use agent_dispatch::models::session::{PermissionMode, SessionStatus};

use super::support::{Harness, ScriptedLauncher};

fn stop(project_id: &str) -> StopRequest {
    StopRequest {
        user_id: 42,
        project_id: project_id.into(),
    }
}

#[tokio::test]
async fn stop_without_active_session_is_a_noop() {
    let harness = Harness::new(ScriptedLauncher::default().into()).await;

    harness
        .stop_handler
        .process(stop("proj-idle"))
        .await
        .expect("noop");

    assert!(harness.responses().is_empty(), "stop publishes nothing");
}

#[tokio::test]
async fn stop_interrupts_the_projects_active_session() {
    let launcher = ScriptedLauncher::default();
    let launcher = std::sync::Arc::new(launcher);
    let harness = Harness::new(std::sync::Arc::clone(&launcher)).await;

    let session = harness
        .registry
        .create(
            "proj-1",
            "/work/proj-1".into(),
            None,
            PermissionMode::Default,
            None,
        )
        .expect("create");

    harness
        .stop_handler
        .process(stop("proj-1"))
        .await
        .expect("stop");

    let client = &launcher.clients.lock().expect("lock")[0];
    assert!(client.interrupted.load(Ordering::SeqCst));
    assert_eq!(
        harness.registry.get(&session.id).expect("metadata").status,
        SessionStatus::Interrupted
    );
    assert!(harness.responses().is_empty(), "stop publishes nothing");
}

#[tokio::test]
async fn stop_only_touches_its_own_project() {
    let launcher = std::sync::Arc::new(ScriptedLauncher::default());
    let harness = Harness::new(std::sync::Arc::clone(&launcher)).await;

    harness
        .registry
        .create("proj-1", "/work".into(), None, PermissionMode::Default, None)
        .expect("create");
    harness
        .registry
        .create("proj-2", "/work".into(), None, PermissionMode::Default, None)
        .expect("create");

    harness
        .stop_handler
        .process(stop("proj-2"))
        .await
        .expect("stop");

    let clients = launcher.clients.lock().expect("lock");
    assert!(!clients[0].interrupted.load(Ordering::SeqCst));
    assert!(clients[1].interrupted.load(Ordering::SeqCst));
}
