//! Integration tests for question-suspended turns.
//!
//! A clarifying-question tool call suspends the turn: the question
//! objects are forwarded raw, the resume token is attached, and no
//! terminal event follows.

use std::sync::atomic::Ordering;

use agent_dispatch::messages::ResponsePayload;
use agent_dispatch::models::job::{Job, JobStatus};

use super::support::{text, tool_use, work_request, Harness, ScriptedLauncher};

#[tokio::test]
async fn question_suspends_with_resume_token() {
    let questions = serde_json::json!([
        { "id": "q1", "text": "Which database?", "options": ["sqlite", "postgres"] }
    ]);
    let launcher = ScriptedLauncher::with_script(vec![
        text("I need more detail"),
        tool_use("AskUserQuestion", serde_json::json!({ "questions": questions })),
    ]);
    let harness = Harness::new(launcher.clone()).await;

    let job = Job::new("proj-1".into());
    harness.jobs.create(&job).await.expect("job");
    let mut request = work_request("migrate the storage layer");
    request.job_id = Some(job.id);

    harness.handler.process(request).await.expect("process");

    let responses = harness.responses();
    assert_eq!(responses.len(), 2, "text then ask_question, nothing after");
    let ResponsePayload::AskQuestion { questions: sent } = &responses[1].payload else {
        panic!("expected ask_question, got {:?}", responses[1].payload);
    };
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["id"], "q1");
    assert!(responses[1].session_id.is_some(), "resume token attached");

    // No completed or error was published for the suspended turn.
    assert!(!responses.iter().any(|r| matches!(
        r.payload,
        ResponsePayload::Completed | ResponsePayload::Error { .. }
    )));

    // The live handle is released; resumption reattaches via the token.
    let session_id = responses[1].session_id.clone().expect("token");
    let client = &launcher.clients.lock().expect("lock")[0];
    assert!(client.disconnected.load(Ordering::SeqCst));
    assert!(harness.registry.client(&session_id).is_none());

    // Suspension recorded; job still open with no metrics yet.
    let recovered = harness
        .paused_turns
        .job_for_session(&session_id)
        .await
        .expect("lookup");
    assert_eq!(recovered, Some(job.id));
    let job = harness
        .jobs
        .get_by_id(job.id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.total_sessions, 0, "no result event, no metrics");
}

#[tokio::test]
async fn malformed_question_input_sends_empty_question_list() {
    let launcher = ScriptedLauncher::with_script(vec![tool_use(
        "AskUserQuestion",
        serde_json::json!({ "questions": "not-an-array" }),
    )]);
    let harness = Harness::new(launcher).await;

    harness
        .handler
        .process(work_request("ask away"))
        .await
        .expect("process");

    let responses = harness.responses();
    let ResponsePayload::AskQuestion { questions } = &responses[0].payload else {
        panic!("expected ask_question");
    };
    assert!(questions.is_empty());
}
