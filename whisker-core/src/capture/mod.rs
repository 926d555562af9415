//! Capture strategies: turn per-tick PCM frames into backend payloads.
//!
//! Chosen once at startup from [`CaptureMode`]. The control loop talks to
//! whichever variant through [`AudioCapturePipeline`] and never branches on
//! the mode itself.

pub mod batch;
pub mod stream;

pub use batch::BatchCapture;
pub use stream::StreamCapture;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::audio::AudioOutput;
use crate::buffering::frame::AudioFrame;
use crate::buffering::recording::RecordingBuffer;
use crate::engine::EngineConfig;
use crate::error::Result;
use crate::transport::{
    BatchUploadTransport, HttpUploader, InboundReport, StreamingTransport, UploadResponse, WsLink,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Buffer the utterance, upload after release.
    Batch,
    /// Forward every frame over a persistent socket.
    #[default]
    Stream,
}

/// Result of handing one frame to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// No session open.
    Ignored,
    /// Stored. Carries the new buffer cursor.
    Appended(usize),
    /// Sent to the backend.
    Forwarded,
    /// Lost: link down, capture disabled, or buffer already full.
    Dropped,
    /// This frame did not fit. The session must stop.
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing was captured.
    Empty,
    /// `COMMIT` handed to the stream.
    Streamed,
    /// The backend answered (any status).
    Uploaded { bytes: usize, response: UploadResponse },
    /// The upload did not complete.
    UploadFailed { bytes: usize },
}

pub trait AudioCapturePipeline {
    fn mode(&self) -> CaptureMode;

    fn is_open(&self) -> bool;

    /// Start a capture session.
    fn open(&mut self, now_ms: u64);

    /// Feed the frame read this tick.
    fn process(&mut self, frame: &AudioFrame, now_ms: u64) -> CaptureOutcome;

    /// End the session without committing.
    fn cancel(&mut self, now_ms: u64);

    /// End the session and deliver what was captured.
    fn commit(&mut self, now_ms: u64) -> CommitOutcome;

    /// Per-tick housekeeping outside capture: reconnects and inbound audio.
    fn service(&mut self, now_ms: u64, output: &mut dyn AudioOutput) -> InboundReport;

    /// Most recent evidence that the backend is replying.
    fn last_incoming_ms(&self) -> Option<u64>;
}

/// Build the configured pipeline with its real network transport.
///
/// A recording buffer that cannot be allocated is logged and leaves batch
/// capture disabled rather than failing startup.
///
/// # Errors
/// If the HTTP client cannot be constructed.
pub fn build_pipeline(config: &EngineConfig) -> Result<Box<dyn AudioCapturePipeline>> {
    match config.mode {
        CaptureMode::Batch => {
            let uploader = HttpUploader::new(
                config.upload_url.clone(),
                Duration::from_millis(config.upload_timeout_ms),
            )?;
            let transport = BatchUploadTransport::new(
                Box::new(uploader),
                config.batch_framing,
                config.capture_sample_rate,
            );
            let buffer = match RecordingBuffer::allocate(config.buffer_capacity) {
                Ok(buffer) => Some(buffer),
                Err(e) => {
                    error!(error = %e, "recording buffer unavailable; batch capture disabled");
                    None
                }
            };
            Ok(Box::new(BatchCapture::new(buffer, transport)))
        }
        CaptureMode::Stream => {
            let link = WsLink::new(
                config.stream_host.clone(),
                config.stream_port,
                &config.stream_path,
                Duration::from_millis(config.connect_timeout_ms),
            );
            let transport = StreamingTransport::new(
                Box::new(link),
                config.reconnect_interval_ms,
                config.talk_window_ms,
                config.activity_prefix.clone(),
            );
            Ok(Box::new(StreamCapture::new(transport)))
        }
    }
}
