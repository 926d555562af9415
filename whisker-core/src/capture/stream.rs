use tracing::{debug, warn};

use super::{AudioCapturePipeline, CaptureMode, CaptureOutcome, CommitOutcome};
use crate::audio::AudioOutput;
use crate::buffering::frame::AudioFrame;
use crate::transport::{ControlToken, InboundReport, StreamingTransport};

/// Minimum spacing of peak-level debug lines.
const PEAK_LOG_INTERVAL_MS: u64 = 200;

/// Forward-as-captured pipeline. Holds no audio between ticks.
///
/// A session whose `START` did not reach the backend stays open locally but
/// forwards nothing and sends no closing token, even if the link comes back
/// mid-utterance.
pub struct StreamCapture {
    transport: StreamingTransport,
    open: bool,
    started: bool,
    last_peak_log_ms: Option<u64>,
}

impl StreamCapture {
    pub fn new(transport: StreamingTransport) -> Self {
        Self {
            transport,
            open: false,
            started: false,
            last_peak_log_ms: None,
        }
    }

    /// Whether the backend was told about the open session.
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn transport(&self) -> &StreamingTransport {
        &self.transport
    }

    fn log_peak(&mut self, frame: &AudioFrame, now_ms: u64) {
        let due = self
            .last_peak_log_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= PEAK_LOG_INTERVAL_MS);
        if due {
            debug!(peak = frame.peak_amplitude(), samples = frame.len(), "streaming");
            self.last_peak_log_ms = Some(now_ms);
        }
    }
}

impl AudioCapturePipeline for StreamCapture {
    fn mode(&self) -> CaptureMode {
        CaptureMode::Stream
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self, _now_ms: u64) {
        self.started = self.transport.send_control(ControlToken::Start);
        if !self.started {
            warn!("session not started on backend; this utterance will not be streamed");
        }
        self.open = true;
        self.last_peak_log_ms = None;
    }

    fn process(&mut self, frame: &AudioFrame, now_ms: u64) -> CaptureOutcome {
        if !self.open {
            return CaptureOutcome::Ignored;
        }
        self.log_peak(frame, now_ms);
        if !self.started {
            return CaptureOutcome::Dropped;
        }
        if self.transport.send_audio(frame) {
            CaptureOutcome::Forwarded
        } else {
            CaptureOutcome::Dropped
        }
    }

    fn cancel(&mut self, _now_ms: u64) {
        if self.started {
            self.transport.send_control(ControlToken::Cancel);
        }
        self.open = false;
        self.started = false;
    }

    fn commit(&mut self, _now_ms: u64) -> CommitOutcome {
        let started = std::mem::take(&mut self.started);
        self.open = false;
        if !started {
            warn!("session never started on backend; nothing to commit");
            return CommitOutcome::Empty;
        }
        self.transport.send_control(ControlToken::Commit);
        CommitOutcome::Streamed
    }

    fn service(&mut self, now_ms: u64, output: &mut dyn AudioOutput) -> InboundReport {
        self.transport.poll(now_ms, output)
    }

    fn last_incoming_ms(&self) -> Option<u64> {
        self.transport.last_incoming_ms()
    }
}
