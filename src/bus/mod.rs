//! Durable topic-exchange messaging over AMQP.
//!
//! Three primitives: [`BusConnection`] (connection lifecycle),
//! [`Publisher`] (idempotent exchange declare + JSON publish), and
//! [`Consumer`] (durable queue bound under a routing key, prefetch
//! bound, scoped acknowledgment).

pub mod connection;
pub mod consumer;
pub mod publisher;

pub use connection::BusConnection;
pub use consumer::{Consumer, ConsumerConfig, MessageHandler};
pub use publisher::Publisher;
