//! Peak-amplitude silence detector.
//!
//! ## Algorithm
//!
//! 1. Take the maximum absolute sample of the frame.
//! 2. If it exceeds `threshold`, stamp the activity window.
//! 3. Silence is reported once the window has been quiet for longer than the
//!    hangover, and only while a capture session is open.
//!
//! Steady background noise above the threshold reads as speech.

use super::{ActivityWindow, VoiceActivityDetector};
use crate::buffering::frame::AudioFrame;

pub const DEFAULT_THRESHOLD: u16 = 60;
pub const DEFAULT_HANGOVER_MS: u64 = 3_000;

#[derive(Debug, Clone)]
pub struct PeakSilenceDetector {
    threshold: u16,
    loud: ActivityWindow,
    open: bool,
    last_peak: u16,
}

impl PeakSilenceDetector {
    pub fn new(threshold: u16, hangover_ms: u64) -> Self {
        Self {
            threshold,
            loud: ActivityWindow::new(hangover_ms),
            open: false,
            last_peak: 0,
        }
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn last_loud_ms(&self) -> Option<u64> {
        self.loud.last_ms()
    }

    pub fn last_peak(&self) -> u16 {
        self.last_peak
    }
}

impl Default for PeakSilenceDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_HANGOVER_MS)
    }
}

impl VoiceActivityDetector for PeakSilenceDetector {
    fn begin(&mut self, now_ms: u64) {
        self.open = true;
        self.loud.clear();
        self.loud.stamp(now_ms);
    }

    fn end(&mut self) {
        self.open = false;
    }

    fn observe(&mut self, frame: &AudioFrame, now_ms: u64) -> u16 {
        let peak = frame.peak_amplitude();
        self.last_peak = peak;
        if peak > self.threshold {
            self.loud.stamp(now_ms);
        }
        peak
    }

    fn detected_silence(&self, now_ms: u64) -> bool {
        self.open && self.loud.has_been_quiet(now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(amplitude: i16) -> AudioFrame {
        AudioFrame::from_samples(&[0, amplitude, -amplitude / 2, 0])
    }

    #[test]
    fn closed_session_never_reports_silence() {
        let det = PeakSilenceDetector::new(60, 3_000);
        assert!(!det.detected_silence(1_000_000));
    }

    #[test]
    fn quiet_input_turns_silent_after_hangover() {
        let mut det = PeakSilenceDetector::new(60, 3_000);
        det.begin(0);
        det.observe(&frame(10), 1_000);
        assert!(!det.detected_silence(3_000));
        assert!(det.detected_silence(3_001));
    }

    #[test]
    fn loud_frame_restarts_hangover() {
        let mut det = PeakSilenceDetector::new(60, 3_000);
        det.begin(0);
        assert_eq!(det.observe(&frame(500), 2_500), 500);
        assert!(!det.detected_silence(5_000));
        assert!(det.detected_silence(5_501));
        assert_eq!(det.last_loud_ms(), Some(2_500));
    }

    #[test]
    fn peak_equal_to_threshold_is_not_loud() {
        let mut det = PeakSilenceDetector::new(60, 100);
        det.begin(0);
        det.observe(&frame(60), 50);
        assert_eq!(det.last_loud_ms(), Some(0));
    }

    #[test]
    fn end_clears_silence_flag() {
        let mut det = PeakSilenceDetector::new(60, 100);
        det.begin(0);
        assert!(det.detected_silence(500));
        det.end();
        assert!(!det.detected_silence(500));
    }
}
