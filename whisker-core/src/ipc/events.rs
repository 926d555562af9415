//! Events broadcast by the running engine.
//!
//! | Event | Subscription |
//! |-------|--------------|
//! | `SessionStateEvent` | `WhiskerEngine::subscribe_state()` |
//! | `AudioActivityEvent` | `WhiskerEngine::subscribe_activity()` |
//! | `UploadEvent` | `WhiskerEngine::subscribe_uploads()` |

use serde::{Deserialize, Serialize};

use crate::session::SessionState;

// ---------------------------------------------------------------------------
// Session state events
// ---------------------------------------------------------------------------

/// One state machine transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStateEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    pub from: SessionState,
    pub to: SessionState,
    /// Loop clock time of the transition.
    pub at_ms: u64,
    /// Optional human-readable cause (e.g. "buffer full").
    pub detail: Option<String>,
}

// ---------------------------------------------------------------------------
// Audio activity events
// ---------------------------------------------------------------------------

/// Outgoing audio level, emitted per frame while a capture is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioActivityEvent {
    pub seq: u64,
    /// Peak absolute sample of the frame.
    pub peak: u16,
    /// Silence detector verdict at this frame.
    pub is_silent: bool,
}

// ---------------------------------------------------------------------------
// Upload events
// ---------------------------------------------------------------------------

/// Result of one batch upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    /// HTTP status, or `None` if the request never completed.
    pub status: Option<u16>,
    /// PCM bytes captured for the utterance.
    pub bytes: usize,
    pub body: Option<String>,
}
