//! Unified error type for vidstream.
//!
//! All crates funnel their failures into [`Error`], which carries enough
//! context for the HTTP layer to derive a status code via
//! [`Error::http_status`].

use std::fmt;

/// Unified error type covering all failure modes in vidstream.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "video").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input or configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A backing service (metadata store, broker) could not be reached.
    #[error("{service} unavailable: {message}")]
    Unavailable {
        /// Which collaborator is down.
        service: String,
        /// Human-readable error description.
        message: String,
    },

    /// A database query failed on a reachable store.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A metadata record exists but its bytes cannot be served.
    #[error("Backing store inconsistency for video {id}: {reason}")]
    Inconsistency {
        /// The video whose bytes are missing.
        id: String,
        /// What went wrong with the byte source.
        reason: String,
    },

    /// Publishing to the event channel failed.
    #[error("Broker error: {0}")]
    Broker(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Unavailable { .. } => 503,
            Error::Database { .. } => 500,
            Error::Inconsistency { .. } => 500,
            Error::Broker(_) => 502,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable label, used for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::Validation(_) => "validation",
            Error::Unavailable { .. } => "unavailable",
            Error::Database { .. } => "database",
            Error::Inconsistency { .. } => "inconsistency",
            Error::Broker(_) => "broker",
            Error::Io { .. } => "io",
            Error::Internal(_) => "internal",
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::Unavailable`].
    pub fn unavailable(service: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Unavailable {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Inconsistency`].
    pub fn inconsistency(id: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Error::Inconsistency {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
