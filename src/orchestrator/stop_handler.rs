//! Cancellation path: stop requests interrupt the project's live turn.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{info, warn};

use crate::bus::MessageHandler;
use crate::messages::StopRequest;
use crate::Result;

use super::registry::SessionRegistry;

/// Consumes stop requests and signals the matching live session.
///
/// Cancellation is best-effort and publishes nothing: the interrupted
/// turn's own error path reports the outcome.
pub struct StopHandler {
    registry: Arc<SessionRegistry>,
}

impl StopHandler {
    /// Create a handler over the shared session registry.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Interrupt the active session for the request's project, if one
    /// exists. A stop with no matching session is a logged no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Agent` if the interrupt signal fails.
    pub async fn process(&self, request: StopRequest) -> Result<()> {
        info!(
            user_id = request.user_id,
            project_id = %request.project_id,
            "processing stop request"
        );

        let Some(session) = self.registry.session_by_project(&request.project_id) else {
            warn!(project_id = %request.project_id, "stop for project with no active session");
            return Ok(());
        };

        if self.registry.interrupt_session(&session.id).await? {
            info!(session_id = %session.id, "stop delivered");
        } else {
            warn!(session_id = %session.id, "session vanished before interrupt");
        }
        Ok(())
    }
}

impl MessageHandler for StopHandler {
    type Message = StopRequest;

    fn handle(
        &self,
        message: Self::Message,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.process(message))
    }
}
