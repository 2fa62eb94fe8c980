//! Integration tests for failing turns and lock enforcement.
//!
//! An execution failure is absorbed: the job is marked failed, a
//! single `error` response is published, and held resources are
//! released.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use agent_dispatch::agent::AgentLauncher;
use agent_dispatch::messages::ResponsePayload;
use agent_dispatch::models::job::{Job, JobStatus};
use agent_dispatch::orchestrator::{RequestHandler, SessionRegistry, TurnSettings};
use agent_dispatch::persistence::db;
use agent_dispatch::persistence::dedupe_repo::DedupeRepo;
use agent_dispatch::persistence::job_repo::JobRepo;
use agent_dispatch::persistence::lock_repo::ProjectLockRepo;
use agent_dispatch::persistence::paused_turn_repo::PausedTurnRepo;
use agent_dispatch::persistence::turn_repo::TurnRepo;
use agent_dispatch::AppError;

use super::support::{text, work_request, FailingSink, Harness, ScriptStep, ScriptedLauncher};

fn enforced_lock_settings() -> TurnSettings {
    TurnSettings {
        lock_enforced: true,
        lock_ttl: Duration::from_secs(60),
        paused_turn_ttl: Duration::from_secs(3600),
    }
}

#[tokio::test]
async fn stream_failure_fails_the_job_and_reports_once() {
    let launcher = ScriptedLauncher::with_script(vec![
        text("starting"),
        ScriptStep::Fail("backend stream broke".into()),
    ]);
    let harness = Harness::new(launcher).await;

    let job = Job::new("proj-1".into());
    harness.jobs.create(&job).await.expect("job");
    let mut request = work_request("do something");
    request.job_id = Some(job.id);

    harness.handler.process(request).await.expect("absorbed");

    let responses = harness.responses();
    let errors: Vec<_> = responses
        .iter()
        .filter_map(|r| match &r.payload {
            ResponsePayload::Error { error_message } => Some(error_message.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("backend stream broke"));
    assert!(!responses
        .iter()
        .any(|r| matches!(r.payload, ResponsePayload::Completed)));

    let job = harness
        .jobs
        .get_by_id(job.id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn failure_without_job_still_reports_an_error() {
    let launcher = ScriptedLauncher::with_script(vec![ScriptStep::Fail("spawn denied".into())]);
    let harness = Harness::new(launcher).await;

    harness
        .handler
        .process(work_request("do something"))
        .await
        .expect("absorbed");

    let responses = harness.responses();
    assert_eq!(responses.len(), 1);
    assert!(matches!(responses[0].payload, ResponsePayload::Error { .. }));
}

#[tokio::test]
async fn unpublishable_outcome_still_closes_session_and_releases_lock() {
    // A failing turn whose error response also cannot be published: the
    // message stays unacknowledged, but the backend handle and the lock
    // must still be released.
    let launcher =
        ScriptedLauncher::with_script(vec![ScriptStep::Fail("backend stream broke".into())]);
    let database = Arc::new(db::connect_memory().await.expect("db"));
    let registry = Arc::new(SessionRegistry::new(
        Arc::clone(&launcher) as Arc<dyn AgentLauncher>
    ));
    let locks = ProjectLockRepo::new(Arc::clone(&database));
    let handler = RequestHandler::new(
        Arc::clone(&registry),
        Arc::new(FailingSink),
        JobRepo::new(Arc::clone(&database)),
        TurnRepo::new(Arc::clone(&database)),
        PausedTurnRepo::new(Arc::clone(&database)),
        locks.clone(),
        DedupeRepo::new(Arc::clone(&database)),
        enforced_lock_settings(),
    );

    let err = handler
        .process(work_request("doomed"))
        .await
        .expect_err("publish failure propagates");
    assert!(matches!(err, AppError::Bus(_)));

    let client = &launcher.clients.lock().expect("lock")[0];
    assert!(
        client.disconnected.load(Ordering::SeqCst),
        "session closed despite failed publish"
    );
    assert!(registry.active_sessions().is_empty());
    assert!(
        !locks.is_locked("proj-1").await.expect("is_locked"),
        "lock released despite failed publish"
    );
}

// ─── Lock enforcement ─────────────────────────────────────────────────

#[tokio::test]
async fn held_lock_rejects_a_concurrent_turn() {
    let launcher = ScriptedLauncher::default();
    let harness =
        Harness::with_settings(std::sync::Arc::new(launcher), enforced_lock_settings()).await;

    // Another turn already holds the project lock.
    assert!(harness
        .locks
        .acquire("proj-1", Duration::from_secs(60))
        .await
        .expect("pre-acquire"));

    let job = Job::new("proj-1".into());
    harness.jobs.create(&job).await.expect("job");
    let mut request = work_request("concurrent");
    request.job_id = Some(job.id);

    harness.handler.process(request).await.expect("absorbed");

    let responses = harness.responses();
    let ResponsePayload::Error { error_message } = &responses[0].payload else {
        panic!("expected error, got {:?}", responses[0].payload);
    };
    assert!(error_message.contains("project busy"));

    // The foreign lock must survive the rejected turn.
    assert!(harness.locks.is_locked("proj-1").await.expect("is_locked"));
}

#[tokio::test]
async fn lock_is_released_after_the_turn() {
    let launcher = ScriptedLauncher::with_script(vec![super::support::result(1, 1, "0")]);
    let harness = Harness::with_settings(launcher, enforced_lock_settings()).await;

    harness
        .handler
        .process(work_request("locked turn"))
        .await
        .expect("process");

    assert!(!harness.locks.is_locked("proj-1").await.expect("is_locked"));
    assert_eq!(
        harness.responses().last().expect("last").payload,
        ResponsePayload::Completed
    );
}
