use tracing::{info, warn};

use super::{AudioCapturePipeline, CaptureMode, CaptureOutcome, CommitOutcome};
use crate::audio::AudioOutput;
use crate::buffering::frame::AudioFrame;
use crate::buffering::recording::RecordingBuffer;
use crate::transport::{BatchUploadTransport, InboundReport};

/// Buffer-then-upload capture.
pub struct BatchCapture {
    /// `None` when allocation failed at startup.
    buffer: Option<RecordingBuffer>,
    transport: BatchUploadTransport,
    open: bool,
    full: bool,
    last_incoming_ms: Option<u64>,
}

impl BatchCapture {
    pub fn new(buffer: Option<RecordingBuffer>, transport: BatchUploadTransport) -> Self {
        Self {
            buffer,
            transport,
            open: false,
            full: false,
            last_incoming_ms: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn cursor(&self) -> usize {
        self.buffer.as_ref().map_or(0, RecordingBuffer::cursor)
    }

    fn close(&mut self) {
        self.open = false;
        self.full = false;
    }
}

impl AudioCapturePipeline for BatchCapture {
    fn mode(&self) -> CaptureMode {
        CaptureMode::Batch
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self, _now_ms: u64) {
        match self.buffer.as_mut() {
            Some(buffer) => buffer.reset(),
            None => warn!("capture disabled for this boot; utterance will not be recorded"),
        }
        self.open = true;
        self.full = false;
    }

    fn process(&mut self, frame: &AudioFrame, _now_ms: u64) -> CaptureOutcome {
        if !self.open {
            return CaptureOutcome::Ignored;
        }
        if self.full {
            return CaptureOutcome::Dropped;
        }
        let Some(buffer) = self.buffer.as_mut() else {
            return CaptureOutcome::Dropped;
        };
        if frame.is_empty() {
            return CaptureOutcome::Appended(buffer.cursor());
        }

        match buffer.append(frame) {
            Ok(cursor) => CaptureOutcome::Appended(cursor),
            Err(full) => {
                warn!(
                    cursor = full.cursor,
                    incoming = full.incoming,
                    capacity = full.capacity,
                    "recording buffer full; stopping capture"
                );
                self.full = true;
                CaptureOutcome::Full
            }
        }
    }

    fn cancel(&mut self, _now_ms: u64) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.reset();
        }
        self.close();
    }

    fn commit(&mut self, now_ms: u64) -> CommitOutcome {
        self.close();
        let Some(buffer) = self.buffer.as_mut() else {
            return CommitOutcome::Empty;
        };
        if buffer.is_empty() {
            info!("nothing captured; skipping upload");
            return CommitOutcome::Empty;
        }

        let bytes = buffer.cursor();
        let result = self.transport.flush(buffer.payload());
        buffer.reset();
        match result {
            Ok(response) => {
                if response.is_success() {
                    self.last_incoming_ms = Some(now_ms + response.elapsed_ms);
                } else {
                    warn!(status = response.status, body = response.body.as_str(), "upload rejected");
                }
                CommitOutcome::Uploaded { bytes, response }
            }
            Err(e) => {
                warn!(error = %e, bytes, "upload failed");
                CommitOutcome::UploadFailed { bytes }
            }
        }
    }

    fn service(&mut self, _now_ms: u64, _output: &mut dyn AudioOutput) -> InboundReport {
        InboundReport::default()
    }

    fn last_incoming_ms(&self) -> Option<u64> {
        self.last_incoming_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullOutput;
    use crate::error::{Result, WhiskerError};
    use crate::transport::{BatchFraming, UploadClient, UploadResponse};
    use crate::wav::WAV_HEADER_LEN;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone)]
    struct Uploader {
        status: u16,
        fail: bool,
        bodies: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Uploader {
        fn ok() -> Self {
            Self {
                status: 200,
                fail: false,
                bodies: Arc::default(),
            }
        }
    }

    impl UploadClient for Uploader {
        fn post(&mut self, body: Vec<u8>, _content_type: &str) -> Result<UploadResponse> {
            self.bodies.lock().push(body);
            if self.fail {
                return Err(WhiskerError::Transport("timed out".into()));
            }
            Ok(UploadResponse {
                status: self.status,
                body: String::new(),
                elapsed_ms: 120,
            })
        }
    }

    fn capture(capacity: usize, uploader: &Uploader) -> BatchCapture {
        let transport =
            BatchUploadTransport::new(Box::new(uploader.clone()), BatchFraming::Wav, 16_000);
        BatchCapture::new(Some(RecordingBuffer::allocate(capacity).unwrap()), transport)
    }

    #[test]
    fn frames_are_ignored_until_open() {
        let up = Uploader::ok();
        let mut cap = capture(64, &up);
        let frame = AudioFrame::from_samples(&[1, 2, 3]);
        assert_eq!(cap.process(&frame, 0), CaptureOutcome::Ignored);
        cap.open(0);
        assert_eq!(cap.process(&frame, 10), CaptureOutcome::Appended(6));
    }

    #[test]
    fn overflow_latches_full_without_writing() {
        let up = Uploader::ok();
        let mut cap = capture(10, &up);
        let frame = AudioFrame::from_samples(&[7, 7]);
        cap.open(0);
        assert_eq!(cap.process(&frame, 0), CaptureOutcome::Appended(4));
        assert_eq!(cap.process(&frame, 1), CaptureOutcome::Appended(8));
        assert_eq!(cap.process(&frame, 2), CaptureOutcome::Full);
        assert_eq!(cap.process(&frame, 3), CaptureOutcome::Dropped);
        assert_eq!(cap.cursor(), 8);
    }

    #[test]
    fn commit_uploads_wav_and_stamps_reply() {
        let up = Uploader::ok();
        let mut cap = capture(64, &up);
        cap.open(0);
        cap.process(&AudioFrame::from_samples(&[1, 2]), 0);
        let outcome = cap.commit(1_000);
        assert!(matches!(outcome, CommitOutcome::Uploaded { bytes: 4, .. }));
        assert_eq!(cap.last_incoming_ms(), Some(1_120));
        assert!(!cap.is_open());
        assert_eq!(cap.cursor(), 0);

        let bodies = up.bodies.lock();
        assert_eq!(bodies[0].len(), WAV_HEADER_LEN + 4);
    }

    #[test]
    fn empty_commit_does_not_upload() {
        let up = Uploader::ok();
        let mut cap = capture(64, &up);
        cap.open(0);
        assert_eq!(cap.commit(500), CommitOutcome::Empty);
        assert!(up.bodies.lock().is_empty());
    }

    #[test]
    fn cancel_discards_capture() {
        let up = Uploader::ok();
        let mut cap = capture(64, &up);
        cap.open(0);
        cap.process(&AudioFrame::from_samples(&[1, 2]), 0);
        cap.cancel(100);
        assert_eq!(cap.cursor(), 0);
        assert!(up.bodies.lock().is_empty());
    }

    #[test]
    fn rejected_or_failed_upload_leaves_no_reply_stamp() {
        let mut up = Uploader::ok();
        up.status = 503;
        let mut cap = capture(64, &up);
        cap.open(0);
        cap.process(&AudioFrame::from_samples(&[1]), 0);
        assert!(matches!(cap.commit(10), CommitOutcome::Uploaded { .. }));
        assert_eq!(cap.last_incoming_ms(), None);

        up.fail = true;
        let mut cap = capture(64, &up);
        cap.open(0);
        cap.process(&AudioFrame::from_samples(&[1]), 0);
        assert_eq!(cap.commit(10), CommitOutcome::UploadFailed { bytes: 2 });
        assert_eq!(cap.last_incoming_ms(), None);
    }

    #[test]
    fn disabled_capture_drops_everything() {
        let up = Uploader::ok();
        let transport = BatchUploadTransport::new(Box::new(up.clone()), BatchFraming::Wav, 16_000);
        let mut cap = BatchCapture::new(None, transport);
        assert!(!cap.is_enabled());
        cap.open(0);
        assert_eq!(
            cap.process(&AudioFrame::from_samples(&[1]), 0),
            CaptureOutcome::Dropped
        );
        assert_eq!(cap.commit(10), CommitOutcome::Empty);
        let mut out = NullOutput;
        assert!(cap.service(10, &mut out).is_empty());
    }
}
