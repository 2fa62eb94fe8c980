//! Wire messages exchanged over the bus.
//!
//! Requests travel on the `requests` exchange under `request.submit`
//! (work) and `request.cancel` (stop). Responses travel on the
//! `responses` exchange under `response.<client_type>.<response_type>`
//! so consumer groups can bind selectively.

pub mod request;
pub mod response;

pub use request::{ClientType, StopRequest, WorkRequest};
pub use response::{ResponsePayload, WorkResponse};

/// Durable topic exchange carrying work and cancellation requests.
pub const REQUEST_EXCHANGE: &str = "requests";
/// Durable topic exchange carrying response events.
pub const RESPONSE_EXCHANGE: &str = "responses";
/// Routing key for work-request submission.
pub const SUBMIT_ROUTING_KEY: &str = "request.submit";
/// Routing key for cancellation messages.
pub const CANCEL_ROUTING_KEY: &str = "request.cancel";
/// Queue bound to [`SUBMIT_ROUTING_KEY`].
pub const SUBMIT_QUEUE: &str = "requests.submit";
/// Queue bound to [`CANCEL_ROUTING_KEY`].
pub const CANCEL_QUEUE: &str = "requests.cancel";
