//! vs-core: shared types, errors, configuration, and the view event.
//!
//! This crate is the foundational dependency for all other vs-* crates,
//! providing the opaque video identifier, a unified error type, the
//! application configuration, and the wire format of the `viewed` message.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use events::ViewedEvent;
pub use ids::VideoId;

/// Media type sent with every streamed video.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";
