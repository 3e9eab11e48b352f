//! Rust structs mapping to database tables.

use serde::Serialize;
use vs_core::VideoId;

/// One entry of the `videos` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoRecord {
    pub id: VideoId,
    /// Path of the file relative to the configured video root.
    pub video_path: String,
    pub created_at: String,
}

impl VideoRecord {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: VideoId::new(row.get::<_, String>(0)?),
            video_path: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}
