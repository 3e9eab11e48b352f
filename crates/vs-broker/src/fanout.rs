//! In-process fanout.
//!
//! [`FanoutBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring buffer of recent payloads so that late subscribers (and tests) can
//! see what was announced.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use vs_core::Result;

use crate::Broadcaster;

/// Maximum number of payloads retained in the ring buffer.
const MAX_RECENT: usize = 100;

/// Broadcast channel with a bounded ring buffer of recent payloads.
pub struct FanoutBus {
    tx: broadcast::Sender<Vec<u8>>,
    recent: RwLock<VecDeque<Vec<u8>>>,
    published: AtomicU64,
}

impl FanoutBus {
    /// Create a new bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT)),
            published: AtomicU64::new(0),
        }
    }

    /// Subscribe to payloads published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
        self.tx.subscribe()
    }

    /// Return the `n` most recent payloads (newest first).
    pub fn recent(&self, n: usize) -> Vec<Vec<u8>> {
        self.recent.read().iter().take(n).cloned().collect()
    }

    /// Total payloads published over the bus lifetime.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    fn push(&self, payload: Vec<u8>) {
        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT {
                recent.pop_back();
            }
            recent.push_front(payload.clone());
        }
        self.published.fetch_add(1, Ordering::Relaxed);

        // No subscribers is fine.
        let _ = self.tx.send(payload);
    }
}

impl Default for FanoutBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Broadcaster for FanoutBus {
    fn name(&self) -> &str {
        "local"
    }

    async fn publish(&self, payload: Vec<u8>) -> Result<()> {
        self.push(payload);
        Ok(())
    }
}
