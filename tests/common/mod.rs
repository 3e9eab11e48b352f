//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires an in-memory DB, a temporary video
//! root, an in-process [`FanoutBus`] and the real router, then serves it on
//! a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use vs_broker::FanoutBus;
use vs_core::{VideoId, ViewedEvent};
use vs_db::pool::{init_memory_pool, DbPool};
use vs_db::{SqliteVideoStore, VideoLookup};
use vs_server::context::AppContext;
use vs_server::publisher::{run_publisher, ViewPublisher};
use vs_server::router::build_router;
use vs_server::source::VideoSource;

/// A running server plus handles on everything behind it.
pub struct TestHarness {
    pub addr: SocketAddr,
    pub ctx: AppContext,
    pub db: DbPool,
    pub bus: Arc<FanoutBus>,
    pub video_dir: TempDir,
    cancel: CancellationToken,
}

impl TestHarness {
    /// Start a server backed by the in-memory SQLite store.
    pub async fn start() -> Self {
        Self::build(None).await
    }

    /// Start a server that resolves ids through `store` instead.
    pub async fn with_store(store: Arc<dyn VideoLookup>) -> Self {
        Self::build(Some(store)).await
    }

    async fn build(store: Option<Arc<dyn VideoLookup>>) -> Self {
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let store = store.unwrap_or_else(|| Arc::new(SqliteVideoStore::new(db.clone())));

        let video_dir = tempfile::tempdir().expect("failed to create video root");
        let source = VideoSource::new(video_dir.path(), 64 * 1024).expect("bad video root");

        let bus = Arc::new(FanoutBus::new(64));
        let cancel = CancellationToken::new();
        let (publisher, rx) = ViewPublisher::channel(64);
        tokio::spawn(run_publisher(rx, bus.clone(), cancel.clone()));

        let ctx = AppContext::new(store, Arc::new(source), publisher);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        let app = build_router(ctx.clone());
        let serve_cancel = cancel.clone();
        tokio::spawn(async move {
            vs_server::serve(listener, app, serve_cancel).await.ok();
        });

        Self {
            addr,
            ctx,
            db,
            bus,
            video_dir,
            cancel,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Insert a record without creating its file.
    pub fn add_record(&self, id: &str, video_path: &str) {
        let conn = vs_db::pool::get_conn(&self.db).expect("failed to get db connection");
        vs_db::queries::videos::insert_video(&conn, &VideoId::from(id), video_path)
            .expect("failed to insert video");
    }

    /// Write `data` under the video root and insert a record pointing at it.
    pub fn add_video(&self, id: &str, video_path: &str, data: &[u8]) {
        let path = self.video_dir.path().join(video_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create video dir");
        }
        std::fs::write(path, data).expect("failed to write video");
        self.add_record(id, video_path);
    }

    /// Every announced view so far, oldest first.
    pub fn views(&self) -> Vec<ViewedEvent> {
        let mut views: Vec<ViewedEvent> = self
            .bus
            .recent(usize::MAX)
            .iter()
            .map(|p| ViewedEvent::from_payload(p).expect("malformed view payload"))
            .collect();
        views.reverse();
        views
    }

    /// Wait until at least `n` views were announced, then return them all.
    pub async fn wait_for_views(&self, n: usize) -> Vec<ViewedEvent> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while (self.bus.published() as usize) < n {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {n} views, saw {}",
                self.bus.published()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.views()
    }

    /// Give the publisher a moment, then assert nothing was announced.
    pub async fn assert_no_views(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(self.bus.published(), 0, "unexpected views: {:?}", self.views());
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Deterministic non-trivial bytes.
pub fn video_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
