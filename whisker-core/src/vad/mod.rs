//! Voice activity detection.
//!
//! Outgoing silence (microphone) and incoming liveness (backend reply audio)
//! are the same primitive: a timestamp of the last "loud" event and a window
//! after which the direction counts as quiet. [`ActivityWindow`] is that
//! primitive; [`PeakSilenceDetector`] applies it to captured frames.

pub mod peak;

pub use peak::PeakSilenceDetector;

use crate::buffering::frame::AudioFrame;

/// Last-activity timestamp with a quiet threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityWindow {
    last_ms: Option<u64>,
    window_ms: u64,
}

impl ActivityWindow {
    pub fn new(window_ms: u64) -> Self {
        Self {
            last_ms: None,
            window_ms,
        }
    }

    pub fn stamp(&mut self, now_ms: u64) {
        self.last_ms = Some(self.last_ms.map_or(now_ms, |prev| prev.max(now_ms)));
    }

    pub fn clear(&mut self) {
        self.last_ms = None;
    }

    pub fn last_ms(&self) -> Option<u64> {
        self.last_ms
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Activity was stamped less than `window_ms` ago.
    pub fn is_active(&self, now_ms: u64) -> bool {
        self.last_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < self.window_ms)
    }

    /// Strictly more than `window_ms` has passed since the last stamp.
    /// `false` if nothing was ever stamped.
    pub fn has_been_quiet(&self, now_ms: u64) -> bool {
        self.last_ms
            .is_some_and(|last| now_ms.saturating_sub(last) > self.window_ms)
    }
}

/// Contract for capture-side detectors.
///
/// Implementors are stateful across one capture session, bracketed by
/// `begin` and `end`.
pub trait VoiceActivityDetector: Send + 'static {
    /// A capture session opened at `now_ms`.
    fn begin(&mut self, now_ms: u64);

    /// The capture session closed.
    fn end(&mut self);

    /// Analyse one frame. Returns its peak amplitude.
    fn observe(&mut self, frame: &AudioFrame, now_ms: u64) -> u16;

    /// `true` only while a session is open and the input has been quiet for
    /// longer than the detector's hangover.
    fn detected_silence(&self, now_ms: u64) -> bool;
}
