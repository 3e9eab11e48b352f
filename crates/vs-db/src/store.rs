//! Async metadata lookup used by the HTTP layer.
//!
//! [`VideoLookup`] is the only thing the request path knows about the
//! store. [`SqliteVideoStore`] implements it over the r2d2 pool, moving the
//! blocking query onto tokio's blocking thread pool.

use async_trait::async_trait;
use vs_core::{Error, Result, VideoId};

use crate::models::VideoRecord;
use crate::pool::{self, DbPool, STORE_SERVICE};
use crate::queries::videos;

/// Resolves a video id to its metadata record.
#[async_trait]
pub trait VideoLookup: Send + Sync {
    /// Exact-match lookup. `Ok(None)` means the id is unknown.
    ///
    /// Fails with [`Error::Unavailable`] when the store cannot be reached
    /// and [`Error::Database`] when the query itself fails.
    async fn find_by_video_id(&self, id: &VideoId) -> Result<Option<VideoRecord>>;
}

/// [`VideoLookup`] backed by the SQLite pool.
#[derive(Clone)]
pub struct SqliteVideoStore {
    pool: DbPool,
}

impl SqliteVideoStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoLookup for SqliteVideoStore {
    async fn find_by_video_id(&self, id: &VideoId) -> Result<Option<VideoRecord>> {
        let pool = self.pool.clone();
        let id = id.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool::get_conn(&pool)?;
            videos::find_by_video_id(&conn, &id)
        })
        .await
        .map_err(|e| Error::unavailable(STORE_SERVICE, format!("lookup task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};

    #[tokio::test]
    async fn finds_inserted_record() {
        let pool = init_memory_pool().unwrap();
        let id = VideoId::from("v1");
        videos::insert_video(&get_conn(&pool).unwrap(), &id, "a.mp4").unwrap();

        let store = SqliteVideoStore::new(pool);
        let record = store.find_by_video_id(&id).await.unwrap().unwrap();
        assert_eq!(record.video_path, "a.mp4");
    }

    #[tokio::test]
    async fn unknown_id_is_none() {
        let store = SqliteVideoStore::new(init_memory_pool().unwrap());
        let found = store.find_by_video_id(&VideoId::from("missing")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn usable_as_trait_object() {
        let pool = init_memory_pool().unwrap();
        videos::insert_video(&get_conn(&pool).unwrap(), &VideoId::from("v2"), "b.mp4").unwrap();

        let lookup: std::sync::Arc<dyn VideoLookup> =
            std::sync::Arc::new(SqliteVideoStore::new(pool));
        let record = lookup.find_by_video_id(&VideoId::from("v2")).await.unwrap();
        assert_eq!(record.map(|r| r.video_path).as_deref(), Some("b.mp4"));
    }
}
