//! vs-db: video metadata persistence.
//!
//! SQLite-backed storage with connection pooling, embedded migrations, the
//! `videos` record model, and the async [`store::VideoLookup`] seam the
//! HTTP layer resolves ids through.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod store;

pub use models::VideoRecord;
pub use pool::{DbPool, PooledConnection};
pub use store::{SqliteVideoStore, VideoLookup};
