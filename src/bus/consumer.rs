//! Queue consumer with scoped acknowledgment.
//!
//! Each message is acknowledged only if the handler completes without
//! error. A handler error (or a payload that fails to deserialize)
//! rejects the message without requeue, leaving its fate to the
//! broker's dead-letter policy. No application-level retry counter is
//! kept.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::ExchangeKind;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::connection::BusConnection;
use crate::Result;

/// Handler invoked for each decoded message.
pub trait MessageHandler: Send + Sync + 'static {
    /// Decoded message type.
    type Message: DeserializeOwned + Send + 'static;

    /// Process one message. An `Err` leaves the message unacknowledged.
    fn handle(
        &self,
        message: Self::Message,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Static wiring for one consumer: where to bind and how much to prefetch.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Exchange the queue binds to (declared durable topic).
    pub exchange: String,
    /// Durable queue name.
    pub queue: String,
    /// Binding routing key or pattern.
    pub routing_key: String,
    /// Maximum in-flight unacknowledged messages.
    pub prefetch: u16,
}

/// Consumes a durable queue and dispatches messages to a handler.
pub struct Consumer;

impl Consumer {
    /// Declare the queue/exchange/binding and start consuming on a
    /// background task until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Bus` if any declare or the consume setup fails.
    pub async fn start<H: MessageHandler>(
        connection: &BusConnection,
        config: ConsumerConfig,
        handler: Arc<H>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        let channel = connection.channel().await?;
        channel
            .basic_qos(config.prefetch, BasicQosOptions::default())
            .await?;
        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                &config.queue,
                &config.exchange,
                &config.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let consumer_tag = format!("agent-dispatch.{}", config.queue);
        let mut stream = channel
            .basic_consume(
                &config.queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(
            queue = %config.queue,
            routing_key = %config.routing_key,
            prefetch = config.prefetch,
            "consumer started"
        );

        let queue = config.queue;
        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!(%queue, "consumer shutting down");
                        break;
                    }
                    delivery = stream.next() => {
                        let Some(delivery) = delivery else {
                            warn!(%queue, "consume stream ended");
                            break;
                        };
                        let delivery = match delivery {
                            Ok(d) => d,
                            Err(err) => {
                                error!(%queue, %err, "delivery error");
                                continue;
                            }
                        };
                        match serde_json::from_slice::<H::Message>(&delivery.data) {
                            Ok(message) => match handler.handle(message).await {
                                Ok(()) => {
                                    if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
                                        error!(%queue, %err, "ack failed");
                                    }
                                }
                                Err(err) => {
                                    error!(%queue, %err, "handler failed; rejecting message");
                                    if let Err(nack_err) = delivery
                                        .nack(BasicNackOptions {
                                            requeue: false,
                                            ..BasicNackOptions::default()
                                        })
                                        .await
                                    {
                                        error!(%queue, %nack_err, "nack failed");
                                    }
                                }
                            },
                            Err(err) => {
                                warn!(%queue, %err, "malformed message; rejecting");
                                if let Err(nack_err) = delivery
                                    .nack(BasicNackOptions {
                                        requeue: false,
                                        ..BasicNackOptions::default()
                                    })
                                    .await
                                {
                                    error!(%queue, %nack_err, "nack failed");
                                }
                            }
                        }
                    }
                }
            }
        }))
    }
}
