//! Connection pool management for SQLite via r2d2.

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use vs_core::{Error, Result};

use crate::migrations;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Service name reported when the store cannot be reached.
pub const STORE_SERVICE: &str = "metadata store";

const MAX_CONNECTIONS: u32 = 8;
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize a database pool backed by a file on disk.
///
/// Creates the parent directory and the SQLite file if they do not exist,
/// enables WAL journal mode on every new connection, and runs pending
/// migrations.
pub fn init_pool(db_path: &Path) -> Result<DbPool> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = Pool::builder()
        .max_size(MAX_CONNECTIONS)
        .connection_timeout(CHECKOUT_TIMEOUT)
        .build(manager)
        .map_err(|e| Error::unavailable(STORE_SERVICE, format!("failed to open pool: {e}")))?;

    let conn = get_conn(&pool)?;
    migrations::run_migrations(&conn)?;

    tracing::debug!(path = %db_path.display(), "Metadata store ready");
    Ok(pool)
}

/// Initialize an in-memory database pool (useful for tests).
///
/// Each call creates a uniquely-named shared-cache in-memory database so
/// that parallel tests do not interfere with each other, while all
/// connections *within* a single pool still share state.
pub fn init_memory_pool() -> Result<DbPool> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let uri = format!("file:vs_memdb_{}_{n}?mode=memory&cache=shared", std::process::id());

    let pool = Pool::builder()
        .max_size(4)
        .build(SqliteConnectionManager::file(uri))
        .map_err(|e| Error::unavailable(STORE_SERVICE, format!("failed to open pool: {e}")))?;

    let conn = get_conn(&pool)?;
    migrations::run_migrations(&conn)?;

    Ok(pool)
}

/// Check a connection out of the pool.
///
/// A checkout failure means the store is unreachable rather than that a
/// query failed, so it maps to [`Error::Unavailable`].
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::unavailable(STORE_SERVICE, e))
}
