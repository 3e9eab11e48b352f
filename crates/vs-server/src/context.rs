//! Application context shared by every handler via Axum state.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use vs_db::VideoLookup;

use crate::publisher::ViewPublisher;
use crate::source::VideoSource;

/// Built once at startup and cloned into each request.
///
/// Holds only `Arc`s and cheap handles; nothing here is locked on the
/// request path.
#[derive(Clone)]
pub struct AppContext {
    /// Metadata lookup.
    pub store: Arc<dyn VideoLookup>,
    /// Byte source rooted at the storage directory.
    pub source: Arc<VideoSource>,
    /// Non-blocking view announcement queue.
    pub publisher: ViewPublisher,
    /// Prometheus handle, when this process installed the recorder.
    pub metrics: Option<PrometheusHandle>,
}

impl AppContext {
    pub fn new(
        store: Arc<dyn VideoLookup>,
        source: Arc<VideoSource>,
        publisher: ViewPublisher,
    ) -> Self {
        Self {
            store,
            source,
            publisher,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
