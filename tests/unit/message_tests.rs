//! Unit tests for wire message shapes.
//!
//! Covers:
//! - Effective-prompt synthesis from an answer map, in document order
//! - Hierarchical response routing keys
//! - Serde tagging and field defaults on requests and responses

use agent_dispatch::messages::{ClientType, ResponsePayload, WorkRequest, WorkResponse};
use agent_dispatch::models::session::PermissionMode;
use chrono::Utc;

fn sample_request(prompt: &str) -> WorkRequest {
    WorkRequest {
        request_id: "req-1".into(),
        client_type: ClientType::Bot,
        user_id: 42,
        project_id: "proj-1".into(),
        project_path: "/work/proj-1".into(),
        prompt: prompt.into(),
        permission_mode: PermissionMode::Default,
        session_id: None,
        job_id: None,
        answer_to_question: None,
        timestamp: Utc::now(),
    }
}

// ─── Effective prompt ─────────────────────────────────────────────────

#[test]
fn prompt_passes_through_without_answers() {
    let request = sample_request("fix the login bug");
    assert_eq!(request.effective_prompt(), "fix the login bug");
}

#[test]
fn empty_answer_map_falls_back_to_prompt() {
    let mut request = sample_request("original");
    request.answer_to_question = Some(serde_json::Map::new());
    assert_eq!(request.effective_prompt(), "original");
}

#[test]
fn answers_synthesize_lines_in_document_order() {
    let mut request = sample_request("ignored");
    let answers = serde_json::from_str(r#"{"q2": "use sqlite", "q1": "yes"}"#)
        .expect("answer map");
    request.answer_to_question = Some(answers);

    assert_eq!(request.effective_prompt(), "q2: use sqlite\nq1: yes");
}

#[test]
fn non_string_answers_render_as_json() {
    let mut request = sample_request("ignored");
    let answers = serde_json::from_str(r#"{"q1": 3, "q2": true}"#).expect("answer map");
    request.answer_to_question = Some(answers);

    assert_eq!(request.effective_prompt(), "q1: 3\nq2: true");
}

// ─── Request deserialization ──────────────────────────────────────────

#[test]
fn request_defaults_absent_optional_fields() {
    let json = r#"{
        "request_id": "req-2",
        "client_type": "taskmanager",
        "user_id": 7,
        "project_id": "proj-2",
        "project_path": "/work/proj-2",
        "prompt": "run the suite",
        "timestamp": "2026-08-29T12:00:00Z"
    }"#;
    let request: WorkRequest = serde_json::from_str(json).expect("request");

    assert_eq!(request.client_type, ClientType::TaskManager);
    assert_eq!(request.permission_mode, PermissionMode::Default);
    assert!(request.session_id.is_none());
    assert!(request.job_id.is_none());
    assert!(request.answer_to_question.is_none());
}

#[test]
fn permission_mode_uses_camel_case_wire_value() {
    let json = r#""acceptEdits""#;
    let mode: PermissionMode = serde_json::from_str(json).expect("mode");
    assert_eq!(mode, PermissionMode::AcceptEdits);
    assert_eq!(mode.as_str(), "acceptEdits");
}

// ─── Response routing and tagging ─────────────────────────────────────

#[test]
fn routing_key_combines_client_and_kind() {
    let response = WorkResponse {
        request_id: "req-3".into(),
        client_type: ClientType::Bot,
        user_id: 42,
        payload: ResponsePayload::Text {
            text: "hello".into(),
        },
        session_id: None,
        timestamp: Utc::now(),
    };
    assert_eq!(response.routing_key(), "response.bot.text");

    let response = WorkResponse {
        client_type: ClientType::TaskManager,
        payload: ResponsePayload::PlanReady {
            plan_content: "plan".into(),
            accumulated_text: String::new(),
        },
        ..response
    };
    assert_eq!(response.routing_key(), "response.taskmanager.plan_ready");
}

#[test]
fn every_payload_kind_is_a_snake_case_segment() {
    let kinds = [
        ResponsePayload::Text { text: String::new() }.kind(),
        ResponsePayload::AskQuestion { questions: vec![] }.kind(),
        ResponsePayload::PlanReady {
            plan_content: String::new(),
            accumulated_text: String::new(),
        }
        .kind(),
        ResponsePayload::Completed.kind(),
        ResponsePayload::Error {
            error_message: String::new(),
        }
        .kind(),
    ];
    assert_eq!(
        kinds,
        ["text", "ask_question", "plan_ready", "completed", "error"]
    );
}

#[test]
fn response_serializes_with_flattened_tag() {
    let response = WorkResponse {
        request_id: "req-4".into(),
        client_type: ClientType::Bot,
        user_id: 42,
        payload: ResponsePayload::Error {
            error_message: "agent: died".into(),
        },
        session_id: Some("sess-1".into()),
        timestamp: Utc::now(),
    };
    let value = serde_json::to_value(&response).expect("serialize");

    assert_eq!(value["response_type"], "error");
    assert_eq!(value["error_message"], "agent: died");
    assert_eq!(value["client_type"], "bot");
    assert_eq!(value["session_id"], "sess-1");
}
