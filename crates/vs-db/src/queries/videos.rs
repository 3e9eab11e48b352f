//! Video record CRUD operations.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use vs_core::{Error, Result, VideoId};

use crate::models::VideoRecord;

const COLS: &str = "id, video_path, created_at";

/// Insert a video record, replacing any existing record with the same id.
pub fn insert_video(conn: &Connection, id: &VideoId, video_path: &str) -> Result<VideoRecord> {
    let created_at = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO videos (id, video_path, created_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET video_path = excluded.video_path",
        rusqlite::params![id.as_str(), video_path, created_at],
    )
    .map_err(Error::database)?;

    Ok(VideoRecord {
        id: id.clone(),
        video_path: video_path.to_string(),
        created_at,
    })
}

/// Find the record with exactly this id.
///
/// Returns `Ok(None)` when no record matches; an error only when the query
/// itself fails.
pub fn find_by_video_id(conn: &Connection, id: &VideoId) -> Result<Option<VideoRecord>> {
    conn.query_row(
        &format!("SELECT {COLS} FROM videos WHERE id = ?1"),
        [id.as_str()],
        VideoRecord::from_row,
    )
    .optional()
    .map_err(Error::database)
}
