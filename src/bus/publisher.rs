//! Topic-exchange publisher.

use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, ExchangeKind};
use serde::Serialize;

use super::connection::BusConnection;
use crate::Result;

/// Publishes JSON payloads to a durable topic exchange.
pub struct Publisher {
    channel: Channel,
    exchange: String,
}

impl Publisher {
    /// Open a channel and declare the durable topic exchange.
    ///
    /// The declare is idempotent; re-declaring an existing exchange
    /// with the same attributes is a no-op at the broker.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Bus` if the channel or declare fails.
    pub async fn new(connection: &BusConnection, exchange: &str) -> Result<Self> {
        let channel = connection.channel().await?;
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(Self {
            channel,
            exchange: exchange.to_owned(),
        })
    }

    /// Serialize `message` as JSON and publish it under `routing_key`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Bus` if serialization or the publish fails.
    pub async fn publish<T: Serialize>(&self, message: &T, routing_key: &str) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        let confirm = self
            .channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await?;
        confirm.await?;
        Ok(())
    }
}
