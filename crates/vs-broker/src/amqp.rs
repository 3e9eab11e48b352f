//! AMQP fanout publishing via lapin.

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use vs_core::{Error, Result};

use crate::Broadcaster;

const BROKER_SERVICE: &str = "broker";

/// Publishes every payload to a fanout exchange with an empty routing key.
pub struct AmqpBroadcaster {
    connection: Connection,
    channel: Channel,
    exchange: String,
}

impl AmqpBroadcaster {
    /// Connect, open a channel and assert the fanout exchange.
    ///
    /// The exchange is declared once here; publishing never re-declares.
    pub async fn connect(address: &str, exchange: &str) -> Result<Self> {
        let connection = Connection::connect(address, ConnectionProperties::default())
            .await
            .map_err(|e| Error::unavailable(BROKER_SERVICE, e))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| Error::unavailable(BROKER_SERVICE, format!("channel: {e}")))?;

        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::Broker(format!("failed to declare exchange {exchange}: {e}")))?;

        tracing::info!(exchange, "Connected to AMQP broker");

        Ok(Self {
            connection,
            channel,
            exchange: exchange.to_string(),
        })
    }
}

#[async_trait]
impl Broadcaster for AmqpBroadcaster {
    fn name(&self) -> &str {
        "amqp"
    }

    async fn publish(&self, payload: Vec<u8>) -> Result<()> {
        // No publisher confirms: one attempt, at-most-once.
        self.channel
            .basic_publish(
                &self.exchange,
                "",
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| Error::Broker(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.connection
            .close(200, "shutdown")
            .await
            .map_err(|e| Error::Broker(e.to_string()))
    }
}
