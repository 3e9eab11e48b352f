//! vs-broker: announcing views to other services.
//!
//! A [`Broadcaster`] delivers an already-serialized payload to every
//! interested consumer. Two implementations are provided: [`AmqpBroadcaster`]
//! publishes to a fanout exchange on an AMQP broker, and [`FanoutBus`] fans
//! out in-process for single-node deployments and tests.

pub mod amqp;
pub mod fanout;

use async_trait::async_trait;
use vs_core::Result;

pub use amqp::AmqpBroadcaster;
pub use fanout::FanoutBus;

/// A sink for view announcements.
///
/// Delivery is at-most-once: implementations make one attempt per call and
/// report failure, callers decide whether to care.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Short name used in logs (e.g. "amqp").
    fn name(&self) -> &str;

    /// Deliver one payload to all consumers.
    async fn publish(&self, payload: Vec<u8>) -> Result<()>;

    /// Release broker resources. The default is a no-op.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
