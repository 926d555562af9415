//! Network strategies for getting an utterance to the speech backend.
//!
//! - [`StreamingTransport`]: persistent socket, frames forwarded as they are
//!   captured, reply audio played as it arrives.
//! - [`BatchUploadTransport`]: one POST per utterance after capture closes.
//!
//! Both sit on a narrow link trait so the control loop can be driven with
//! in-memory fakes.

pub mod batch;
pub mod http;
pub mod streaming;
pub mod ws;

pub use batch::{BatchFraming, BatchUploadTransport};
pub use http::HttpUploader;
pub use streaming::{InboundReport, StreamingTransport};
pub use ws::WsLink;

use crate::error::Result;

/// Session control tokens, sent as text frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlToken {
    Start,
    Commit,
    Cancel,
}

impl ControlToken {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Commit => "COMMIT",
            Self::Cancel => "CANCEL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Text(String),
    Binary(Vec<u8>),
}

/// State of a connection attempt after one [`StreamLink::connect`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectProgress {
    Connected,
    /// Attempt in flight; call `connect` again on a later tick.
    Pending,
}

/// Bidirectional message link to the backend.
///
/// No call blocks the caller. A link that hits an I/O error reports
/// `is_connected() == false` until a later `connect` completes.
pub trait StreamLink {
    fn is_connected(&self) -> bool;

    /// Start a connection attempt, or check on the one in flight.
    ///
    /// `Err` means the attempt finished and failed.
    fn connect(&mut self) -> Result<ConnectProgress>;

    fn send_text(&mut self, text: &str) -> Result<()>;

    fn send_binary(&mut self, payload: &[u8]) -> Result<()>;

    /// Next queued inbound message, or `None` when nothing is pending.
    fn recv(&mut self) -> Result<Option<InboundMessage>>;
}

/// Uploader reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
    pub body: String,
    /// Wall time the request took.
    pub elapsed_ms: u64,
}

impl UploadResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One-shot request/response client.
pub trait UploadClient {
    /// Network availability. Uploads are skipped while this is `false`.
    ///
    /// Defaults to `true`: a client without its own reachability signal
    /// always attempts the request and reports failure through `post`.
    /// [`HttpUploader`] works this way.
    fn is_connected(&self) -> bool {
        true
    }

    /// Send `body` and wait for the reply. This is the only blocking network
    /// call in the control loop.
    fn post(&mut self, body: Vec<u8>, content_type: &str) -> Result<UploadResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_tokens_on_the_wire() {
        assert_eq!(ControlToken::Start.as_str(), "START");
        assert_eq!(ControlToken::Commit.as_str(), "COMMIT");
        assert_eq!(ControlToken::Cancel.as_str(), "CANCEL");
    }

    #[test]
    fn success_is_any_2xx() {
        let mut r = UploadResponse {
            status: 204,
            body: String::new(),
            elapsed_ms: 0,
        };
        assert!(r.is_success());
        r.status = 302;
        assert!(!r.is_success());
        r.status = 500;
        assert!(!r.is_success());
    }
}
