//! Turn orchestration: the session registry, the request state
//! machine, and the cancellation path.

pub mod registry;
pub mod request_handler;
pub mod stop_handler;

use std::future::Future;
use std::pin::Pin;

use crate::bus::Publisher;
use crate::messages::WorkResponse;
use crate::Result;

pub use registry::SessionRegistry;
pub use request_handler::{RequestHandler, TurnSettings};
pub use stop_handler::StopHandler;

/// Outbound seam for typed response events.
///
/// The production implementation publishes to the `responses` topic
/// exchange; tests substitute a collecting sink.
pub trait ResponseSink: Send + Sync {
    /// Deliver one response event to its routing destination.
    fn deliver(
        &self,
        response: WorkResponse,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

impl ResponseSink for Publisher {
    fn deliver(
        &self,
        response: WorkResponse,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let routing_key = response.routing_key();
            self.publish(&response, &routing_key).await
        })
    }
}
