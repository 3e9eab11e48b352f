//! Fire-and-forget hand-off of view announcements.
//!
//! Request handlers call [`ViewPublisher::publish`], which serializes the
//! event and pushes it onto a bounded queue without awaiting anything. A
//! single background task ([`run_publisher`]) drains the queue into the
//! configured [`Broadcaster`]. Every failure on this path is logged and
//! counted, never returned to the request.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use vs_broker::Broadcaster;
use vs_core::ViewedEvent;

/// Cloneable sending half of the view queue.
#[derive(Clone, Debug)]
pub struct ViewPublisher {
    tx: mpsc::Sender<Vec<u8>>,
}

impl ViewPublisher {
    /// Create a publisher and the receiving half for [`run_publisher`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue one announcement. Returns whether it was accepted.
    pub fn publish(&self, event: &ViewedEvent) -> bool {
        let payload = match event.to_payload() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(video_id = %event.video_id, error = %e, "Dropping view event");
                dropped("encode");
                return false;
            }
        };

        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(video_id = %event.video_id, "View queue full, dropping event");
                dropped("queue_full");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(video_id = %event.video_id, "View queue closed, dropping event");
                dropped("queue_closed");
                false
            }
        }
    }
}

fn dropped(reason: &'static str) {
    metrics::counter!("vidstream_views_dropped_total", "reason" => reason).increment(1);
}

/// Drain the view queue into `broadcaster` until cancelled.
///
/// On cancellation the queue is closed and whatever is already in it is
/// still delivered before the broadcaster is closed.
pub async fn run_publisher(
    mut rx: mpsc::Receiver<Vec<u8>>,
    broadcaster: Arc<dyn Broadcaster>,
    cancel: CancellationToken,
) {
    tracing::info!(broadcaster = broadcaster.name(), "View publisher started");

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(payload) => deliver(broadcaster.as_ref(), payload).await,
                None => break,
            },
            _ = cancel.cancelled() => {
                rx.close();
                let mut drained = 0usize;
                while let Some(payload) = rx.recv().await {
                    deliver(broadcaster.as_ref(), payload).await;
                    drained += 1;
                }
                if drained > 0 {
                    tracing::info!(drained, "Flushed queued view events");
                }
                break;
            }
        }
    }

    if let Err(e) = broadcaster.close().await {
        tracing::warn!(error = %e, "Failed to close broadcaster");
    }
    tracing::info!("View publisher stopped");
}

async fn deliver(broadcaster: &dyn Broadcaster, payload: Vec<u8>) {
    match broadcaster.publish(payload).await {
        Ok(()) => metrics::counter!("vidstream_views_published_total").increment(1),
        Err(e) => {
            tracing::warn!(broadcaster = broadcaster.name(), error = %e, "Failed to publish view event");
            dropped("broker");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use vs_broker::FanoutBus;
    use vs_core::VideoId;

    struct FailingBroadcaster;

    #[async_trait]
    impl Broadcaster for FailingBroadcaster {
        fn name(&self) -> &str {
            "failing"
        }

        async fn publish(&self, _payload: Vec<u8>) -> vs_core::Result<()> {
            Err(vs_core::Error::Broker("nack".into()))
        }
    }

    fn event(id: &str) -> ViewedEvent {
        ViewedEvent::new(format!("{id}.mp4"), VideoId::from(id))
    }

    #[tokio::test]
    async fn delivers_in_order() {
        let bus = Arc::new(FanoutBus::new(16));
        let mut sub = bus.subscribe();
        let (publisher, rx) = ViewPublisher::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_publisher(rx, bus.clone(), cancel.clone()));

        assert!(publisher.publish(&event("v1")));
        assert!(publisher.publish(&event("v2")));

        let first = ViewedEvent::from_payload(&sub.recv().await.unwrap()).unwrap();
        let second = ViewedEvent::from_payload(&sub.recv().await.unwrap()).unwrap();
        assert_eq!(first.video_id.as_str(), "v1");
        assert_eq!(second.video_id.as_str(), "v2");

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let (publisher, _rx) = ViewPublisher::channel(1);

        assert!(publisher.publish(&event("v1")));
        assert!(!publisher.publish(&event("v2")));
    }

    #[tokio::test]
    async fn closed_queue_drops() {
        let (publisher, rx) = ViewPublisher::channel(4);
        drop(rx);
        assert!(!publisher.publish(&event("v1")));
    }

    #[tokio::test]
    async fn shutdown_drains_queue() {
        let bus = Arc::new(FanoutBus::new(16));
        let (publisher, rx) = ViewPublisher::channel(8);
        for i in 0..5 {
            publisher.publish(&event(&format!("v{i}")));
        }

        let cancel = CancellationToken::new();
        cancel.cancel();
        run_publisher(rx, bus.clone(), cancel).await;

        assert_eq!(bus.published(), 5);
    }

    #[tokio::test]
    async fn broker_failure_does_not_stop_publisher() {
        let (publisher, rx) = ViewPublisher::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_publisher(
            rx,
            Arc::new(FailingBroadcaster),
            cancel.clone(),
        ));

        publisher.publish(&event("v1"));
        publisher.publish(&event("v2"));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!task.is_finished());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
