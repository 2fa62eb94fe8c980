//! AMQP connection lifecycle.

use lapin::{Channel, Connection, ConnectionProperties};

use crate::Result;

/// Shared broker connection; channels are created per publisher/consumer.
pub struct BusConnection {
    inner: Connection,
}

impl BusConnection {
    /// Connect to the broker.
    ///
    /// A connect failure propagates: the process is expected to crash
    /// and restart under external supervision rather than retry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Bus` if the broker is unreachable.
    pub async fn connect(url: &str) -> Result<Self> {
        let inner = Connection::connect(url, ConnectionProperties::default()).await?;
        Ok(Self { inner })
    }

    /// Open a new channel on the connection.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Bus` if the channel cannot be opened.
    pub async fn channel(&self) -> Result<Channel> {
        let channel = self.inner.create_channel().await?;
        Ok(channel)
    }

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Bus` if the close handshake fails.
    pub async fn close(&self) -> Result<()> {
        self.inner.close(200, "bye").await?;
        Ok(())
    }
}
