//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order.  A
//! `schema_migrations` table tracks which versions have been applied.

use rusqlite::Connection;
use vs_core::{Error, Result};

/// V1: the `videos` collection.
const V1_VIDEOS: &str = r#"
CREATE TABLE videos (
    id         TEXT PRIMARY KEY,
    video_path TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX idx_videos_path ON videos(video_path);
"#;

const MIGRATIONS: &[(i64, &str)] = &[(1, V1_VIDEOS)];

/// Run all pending migrations.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each migration whose version is not yet recorded.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(Error::database)?;

        if already {
            continue;
        }

        let tx = conn.unchecked_transaction().map_err(Error::database)?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(Error::database)?;

        tx.commit().map_err(Error::database)?;
        tracing::info!(version, "Applied migration");
    }

    Ok(())
}
