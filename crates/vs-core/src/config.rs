//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! sub-configs for the HTTP server, the video storage root, the metadata
//! store and the broker. Every section defaults sensibly so a completely
//! empty `{}` file is valid. Deployment environments usually set the
//! handful of values that matter through environment variables instead; see
//! [`Config::apply_env`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub store: StoreConfig,
    pub broker: BrokerConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Apply overrides from the process environment.
    ///
    /// Recognised variables: `HOST`, `PORT`, `VIDEO_ROOT`, `DBHOST`,
    /// `DBNAME` and `RABBIT`.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Empty values are ignored. An unparsable `PORT` is rejected rather
    /// than silently falling back to the configured port.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Validation(format!("PORT is not a valid port: {port}")))?;
        }
        if let Some(root) = get("VIDEO_ROOT") {
            self.storage.video_root = PathBuf::from(root);
        }
        if let Some(address) = get("DBHOST") {
            self.store.address = PathBuf::from(address);
        }
        if let Some(database) = get("DBNAME") {
            self.store.database = database;
        }
        if let Some(address) = get("RABBIT") {
            self.broker.address = Some(address);
        }

        Ok(())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.storage.chunk_size == 0 {
            warnings.push(format!(
                "storage.chunk_size is 0; using {DEFAULT_CHUNK_SIZE} bytes"
            ));
        }

        if self.store.database.is_empty() {
            warnings.push("store.database is empty".into());
        } else if self.store.database.contains(['/', '\\']) {
            warnings.push(format!(
                "store.database '{}' contains a path separator",
                self.store.database
            ));
        }

        match &self.broker.address {
            None => warnings.push(
                "broker.address is not set; views are only announced in-process".into(),
            ),
            Some(addr) if !addr.starts_with("amqp://") && !addr.starts_with("amqps://") => {
                warnings.push(format!("broker.address '{addr}' is not an amqp:// URI"));
            }
            Some(_) => {}
        }

        if self.broker.exchange.is_empty() {
            warnings.push("broker.exchange is empty; the default exchange is not fanout".into());
        }

        if self.broker.queue_capacity == 0 {
            warnings.push(format!(
                "broker.queue_capacity is 0; using {DEFAULT_QUEUE_CAPACITY}"
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Default read size for streamed chunks.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default number of view events that may wait for the broker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

/// Where video files live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory every stored `video_path` is resolved against.
    pub video_root: PathBuf,
    /// Bytes read per streamed chunk.
    pub chunk_size: usize,
}

impl StorageConfig {
    /// Chunk size with the zero case mapped to the default.
    pub fn effective_chunk_size(&self) -> usize {
        if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            video_root: PathBuf::from("./videos"),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Metadata store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the database files.
    pub address: PathBuf,
    /// Database name; the file is `<address>/<database>.db`.
    pub database: String,
}

impl StoreConfig {
    /// Full path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.address.join(format!("{}.db", self.database))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: PathBuf::from("./data"),
            database: "video-streaming".into(),
        }
    }
}

/// Event channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// AMQP URI of the broker; `None` keeps announcements in-process.
    pub address: Option<String>,
    /// Fanout exchange the `viewed` messages are published to.
    pub exchange: String,
    /// Bound on events waiting to be published.
    pub queue_capacity: usize,
}

impl BrokerConfig {
    /// Queue capacity with the zero case mapped to the default.
    pub fn effective_queue_capacity(&self) -> usize {
        if self.queue_capacity == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            self.queue_capacity
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: None,
            exchange: "viewed".into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
