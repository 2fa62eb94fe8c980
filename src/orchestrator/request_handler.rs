//! Work-request orchestrator: the per-turn state machine.
//!
//! One turn runs Starting → Streaming → {Suspended(ask-question) |
//! Suspended(plan-ready) | Completed | Failed}. Suspension publishes a
//! typed event carrying the live session id as the resume token and
//! records a durable session-to-job correlation; completion and failure
//! are terminal. The ledger row for the turn is created before
//! streaming and finalized once metrics are known. The execution
//! session is closed on every path; a suspended turn's backend context
//! is reattached later via its resume token.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agent::events::{ASK_QUESTION_TOOL, EXIT_PLAN_TOOL};
use crate::agent::{AgentClient, AgentEvent, ResultEvent};
use crate::bus::MessageHandler;
use crate::messages::{ResponsePayload, WorkRequest, WorkResponse};
use crate::models::job::JobStatus;
use crate::models::session::PermissionMode;
use crate::models::turn::TurnRecord;
use crate::persistence::dedupe_repo::DedupeRepo;
use crate::persistence::job_repo::JobRepo;
use crate::persistence::lock_repo::ProjectLockRepo;
use crate::persistence::paused_turn_repo::PausedTurnRepo;
use crate::persistence::turn_repo::TurnRepo;
use crate::{AppError, GlobalConfig, Result};

use super::registry::SessionRegistry;
use super::ResponseSink;

/// Tunables for turn execution, derived from [`GlobalConfig`].
#[derive(Debug, Clone)]
pub struct TurnSettings {
    /// Whether the per-project advisory lock is acquired per turn.
    pub lock_enforced: bool,
    /// Advisory lock TTL.
    pub lock_ttl: Duration,
    /// Paused-turn correlation TTL.
    pub paused_turn_ttl: Duration,
}

impl TurnSettings {
    /// Extract turn settings from the global configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            lock_enforced: config.lock.enforced,
            lock_ttl: Duration::from_secs(config.lock.ttl_seconds),
            paused_turn_ttl: Duration::from_secs(config.paused_turn_ttl_seconds),
        }
    }
}

/// Consumes work requests and drives one turn each.
pub struct RequestHandler {
    registry: Arc<SessionRegistry>,
    responses: Arc<dyn ResponseSink>,
    jobs: JobRepo,
    turns: TurnRepo,
    paused_turns: PausedTurnRepo,
    locks: ProjectLockRepo,
    dedupe: DedupeRepo,
    settings: TurnSettings,
}

/// Live resources held by an in-flight turn, released in the final step
/// regardless of outcome.
#[derive(Default)]
struct TurnContext {
    session_id: Option<String>,
    lock_held: bool,
}

impl RequestHandler {
    /// Assemble the orchestrator from its collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<SessionRegistry>,
        responses: Arc<dyn ResponseSink>,
        jobs: JobRepo,
        turns: TurnRepo,
        paused_turns: PausedTurnRepo,
        locks: ProjectLockRepo,
        dedupe: DedupeRepo,
        settings: TurnSettings,
    ) -> Self {
        Self {
            registry,
            responses,
            jobs,
            turns,
            paused_turns,
            locks,
            dedupe,
            settings,
        }
    }

    /// Process one work request end to end.
    ///
    /// An `Err` from this method leaves the message unacknowledged;
    /// execution failures inside the turn are caught, reported as an
    /// `error` response, and do not propagate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` when the ledger cannot record the turn
    /// before execution starts, or `AppError::Bus` when a response
    /// cannot be published.
    pub async fn process(&self, request: WorkRequest) -> Result<()> {
        if !self.dedupe.mark_processed(&request.request_id).await? {
            info!(
                request_id = %request.request_id,
                "duplicate delivery; skipping"
            );
            return Ok(());
        }

        info!(
            request_id = %request.request_id,
            user_id = request.user_id,
            project_id = %request.project_id,
            mode = request.permission_mode.as_str(),
            "processing work request"
        );

        let job_id = self.start_job(self.resolve_job_id(&request).await?).await?;

        // Ledger row first: one row per turn, written exactly once.
        let turn = TurnRecord::new(job_id.unwrap_or_else(Uuid::new_v4));
        self.turns.create(&turn).await?;

        let mut ctx = TurnContext::default();
        let outcome = self.run_turn(&request, job_id, turn.id, &mut ctx).await;

        // Release live resources on every path, before anything that can
        // still fail: an unpublishable outcome must not leak the backend
        // handle or the lock. A suspended turn reattaches through the
        // backend's own resume token.
        if let Some(ref session_id) = ctx.session_id {
            self.registry.close_session(session_id).await;
        }
        if ctx.lock_held {
            if let Err(err) = self.locks.release(&request.project_id).await {
                warn!(project_id = %request.project_id, %err, "lock release failed");
            }
        }

        if let Err(err) = outcome {
            error!(request_id = %request.request_id, %err, "turn execution failed");
            if let Some(job) = job_id {
                if let Err(status_err) = self.jobs.update_status(job, JobStatus::Failed).await {
                    error!(%job, %status_err, "failed to mark job failed");
                }
            }
            self.publish(
                &request,
                ResponsePayload::Error {
                    error_message: err.to_string(),
                },
                None,
            )
            .await?;
        }

        Ok(())
    }

    /// Move the owning job to `Running`, dropping the association when
    /// the job is missing or already terminal. A stale resume after the
    /// job closed still runs its turn; it just stops feeding the job's
    /// totals.
    async fn start_job(&self, job_id: Option<Uuid>) -> Result<Option<Uuid>> {
        let Some(job) = job_id else {
            return Ok(None);
        };
        match self.jobs.get_by_id(job).await? {
            Some(current) if current.can_transition_to(JobStatus::Running) => {
                self.jobs.update_status(job, JobStatus::Running).await?;
                Ok(Some(job))
            }
            Some(current) => {
                warn!(%job, status = ?current.status, "job not startable; running turn without it");
                Ok(None)
            }
            None => {
                warn!(%job, "job not found; running turn without it");
                Ok(None)
            }
        }
    }

    /// The job owning this turn: the request's own job id, or, for a
    /// resuming request that does not carry one, the id recorded when
    /// the turn suspended.
    async fn resolve_job_id(&self, request: &WorkRequest) -> Result<Option<Uuid>> {
        if request.job_id.is_some() {
            return Ok(request.job_id);
        }
        let Some(ref session_id) = request.session_id else {
            return Ok(None);
        };
        let recovered = self.paused_turns.job_for_session(session_id).await?;
        if let Some(job) = recovered {
            info!(session_id, %job, "recovered job for resumed turn");
        }
        Ok(recovered)
    }

    /// The fallible body of a turn: session creation, prompt
    /// submission, stream consumption, suspension or completion.
    async fn run_turn(
        &self,
        request: &WorkRequest,
        job_id: Option<Uuid>,
        turn_id: Uuid,
        ctx: &mut TurnContext,
    ) -> Result<()> {
        if self.settings.lock_enforced {
            if !self
                .locks
                .acquire(&request.project_id, self.settings.lock_ttl)
                .await?
            {
                return Err(AppError::ProjectBusy(format!(
                    "another turn is running for project {}",
                    request.project_id
                )));
            }
            ctx.lock_held = true;
        }

        let session = self.registry.create(
            &request.project_id,
            request.project_path.clone().into(),
            None,
            request.permission_mode,
            request.session_id.clone(),
        )?;
        ctx.session_id = Some(session.id.clone());

        let client = self
            .registry
            .client(&session.id)
            .ok_or_else(|| AppError::Agent("no live client for session".into()))?;

        client.connect().await?;
        client.query(&request.effective_prompt()).await?;

        self.stream_turn(request, job_id, turn_id, &session.id, client.as_ref())
            .await
    }

    /// Consume the backend event stream until a suspend point, the
    /// terminal result, or stream end.
    async fn stream_turn(
        &self,
        request: &WorkRequest,
        job_id: Option<Uuid>,
        turn_id: Uuid,
        session_id: &str,
        client: &dyn AgentClient,
    ) -> Result<()> {
        let mut accumulated: Vec<String> = Vec::new();
        let mut result: Option<ResultEvent> = None;

        while let Some(event) = client.next_event().await? {
            match event {
                AgentEvent::Result(r) => {
                    result = Some(r);
                    break;
                }
                AgentEvent::ToolUse { name, input } if name == ASK_QUESTION_TOOL => {
                    let questions = input
                        .get("questions")
                        .and_then(serde_json::Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    self.publish(
                        request,
                        ResponsePayload::AskQuestion { questions },
                        Some(session_id.to_owned()),
                    )
                    .await?;
                    self.record_suspension(session_id, job_id).await?;
                    self.finalize_metrics(turn_id, session_id, job_id, result.as_ref())
                        .await?;
                    info!(request_id = %request.request_id, session_id, "turn suspended on question");
                    return Ok(());
                }
                AgentEvent::ToolUse { name, input } if name == EXIT_PLAN_TOOL => {
                    let fallback = accumulated.join("\n");
                    let plan_content = input
                        .get("plan")
                        .and_then(serde_json::Value::as_str)
                        .map_or_else(|| fallback.clone(), str::to_owned);
                    self.publish(
                        request,
                        ResponsePayload::PlanReady {
                            plan_content,
                            accumulated_text: fallback,
                        },
                        Some(session_id.to_owned()),
                    )
                    .await?;
                    self.record_suspension(session_id, job_id).await?;
                    self.finalize_metrics(turn_id, session_id, job_id, result.as_ref())
                        .await?;
                    info!(request_id = %request.request_id, session_id, "turn suspended on plan");
                    return Ok(());
                }
                AgentEvent::ToolUse { .. } => {
                    // Ordinary tool activity; nothing to surface.
                }
                AgentEvent::Text { text } => {
                    if request.permission_mode == PermissionMode::Plan {
                        // Raw reasoning stays hidden in plan mode; it
                        // surfaces only as the plan-ready fallback text.
                        accumulated.push(text);
                    } else {
                        self.publish(request, ResponsePayload::Text { text }, None)
                            .await?;
                    }
                }
            }
        }

        self.finalize_metrics(turn_id, session_id, job_id, result.as_ref())
            .await?;
        if let Some(job) = job_id {
            self.jobs.update_status(job, JobStatus::Completed).await?;
        }
        self.publish(
            request,
            ResponsePayload::Completed,
            Some(session_id.to_owned()),
        )
        .await?;
        info!(request_id = %request.request_id, session_id, "turn completed");
        Ok(())
    }

    /// Durably correlate a suspended session with its owning job so a
    /// follow-up request can recover it.
    async fn record_suspension(&self, session_id: &str, job_id: Option<Uuid>) -> Result<()> {
        let Some(job) = job_id else {
            return Ok(());
        };
        self.paused_turns
            .save(session_id, job, self.settings.paused_turn_ttl)
            .await
    }

    /// Write the turn's metrics once to its ledger row and merge them
    /// into the owning job's totals. A turn that suspends before any
    /// result event leaves its row unfinalized.
    async fn finalize_metrics(
        &self,
        turn_id: Uuid,
        session_id: &str,
        job_id: Option<Uuid>,
        result: Option<&ResultEvent>,
    ) -> Result<()> {
        let Some(result) = result else {
            return Ok(());
        };
        let metrics = result.metrics();

        self.turns
            .finalize(
                turn_id,
                session_id,
                metrics.input_tokens,
                metrics.output_tokens,
                metrics.cost,
            )
            .await?;

        if let Some(job) = job_id {
            self.jobs
                .increment_metrics(job, metrics.input_tokens, metrics.output_tokens, metrics.cost)
                .await?;
        }
        Ok(())
    }

    async fn publish(
        &self,
        request: &WorkRequest,
        payload: ResponsePayload,
        session_id: Option<String>,
    ) -> Result<()> {
        let response = WorkResponse {
            request_id: request.request_id.clone(),
            client_type: request.client_type,
            user_id: request.user_id,
            payload,
            session_id,
            timestamp: Utc::now(),
        };
        self.responses.deliver(response).await
    }
}

impl MessageHandler for RequestHandler {
    type Message = WorkRequest;

    fn handle(
        &self,
        message: Self::Message,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.process(message))
    }
}
