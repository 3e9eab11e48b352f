//! The `viewed` message announced to other services.
//!
//! Downstream consumers decode this payload, so the JSON shape (exactly the
//! keys `videoPath` and `videoId`) is a stable wire contract.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::VideoId;

/// Emitted once for every stream that was successfully started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewedEvent {
    /// Path segment of the video, as stored in its metadata record.
    pub video_path: String,
    /// Identifier the client asked for.
    pub video_id: VideoId,
}

impl ViewedEvent {
    /// Build the event for a resolved record.
    pub fn new(video_path: impl Into<String>, video_id: VideoId) -> Self {
        Self {
            video_path: video_path.into(),
            video_id,
        }
    }

    /// Serialize to the byte payload published on the exchange.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Error::Internal(format!("failed to encode viewed event: {e}")))
    }

    /// Decode a payload produced by [`ViewedEvent::to_payload`].
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| Error::Validation(format!("malformed viewed event: {e}")))
    }
}
