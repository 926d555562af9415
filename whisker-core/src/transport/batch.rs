//! One-shot utterance upload.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{UploadClient, UploadResponse};
use crate::error::{Result, WhiskerError};
use crate::wav::encode_wav;

/// Request body layout for batch uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchFraming {
    /// 44-byte WAV header followed by PCM.
    #[default]
    Wav,
    /// Bare little-endian PCM.
    RawPcm,
}

impl BatchFraming {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::RawPcm => "application/octet-stream",
        }
    }
}

pub struct BatchUploadTransport {
    client: Box<dyn UploadClient>,
    framing: BatchFraming,
    sample_rate: u32,
}

impl BatchUploadTransport {
    pub fn new(client: Box<dyn UploadClient>, framing: BatchFraming, sample_rate: u32) -> Self {
        Self {
            client,
            framing,
            sample_rate,
        }
    }

    pub fn framing(&self) -> BatchFraming {
        self.framing
    }

    /// Frame `pcm` and post it.
    ///
    /// # Errors
    /// `NotConnected` when the network is down (the utterance is lost), or
    /// whatever the client reports for a failed request.
    pub fn flush(&mut self, pcm: &[u8]) -> Result<UploadResponse> {
        if !self.client.is_connected() {
            warn!(bytes = pcm.len(), "network unavailable; recording discarded");
            return Err(WhiskerError::NotConnected);
        }

        let body = match self.framing {
            BatchFraming::Wav => encode_wav(self.sample_rate, pcm),
            BatchFraming::RawPcm => pcm.to_vec(),
        };
        let bytes = body.len();
        let response = self.client.post(body, self.framing.content_type())?;
        info!(
            status = response.status,
            bytes,
            elapsed_ms = response.elapsed_ms,
            "utterance uploaded"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::WAV_HEADER_LEN;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Recorder {
        offline: bool,
        posts: Arc<Mutex<Vec<(Vec<u8>, String)>>>,
    }

    impl UploadClient for Recorder {
        fn is_connected(&self) -> bool {
            !self.offline
        }

        fn post(&mut self, body: Vec<u8>, content_type: &str) -> Result<UploadResponse> {
            self.posts.lock().push((body, content_type.to_string()));
            Ok(UploadResponse {
                status: 200,
                body: "ok".into(),
                elapsed_ms: 40,
            })
        }
    }

    #[test]
    fn wav_framing_prepends_header() {
        let rec = Recorder::default();
        let mut t = BatchUploadTransport::new(Box::new(rec.clone()), BatchFraming::Wav, 16_000);
        let resp = t.flush(&[1, 2, 3, 4]).unwrap();
        assert_eq!(resp.status, 200);

        let posts = rec.posts.lock();
        let (body, ct) = &posts[0];
        assert_eq!(ct, "audio/wav");
        assert_eq!(body.len(), WAV_HEADER_LEN + 4);
        assert_eq!(&body[..4], b"RIFF");
        assert_eq!(&body[WAV_HEADER_LEN..], &[1, 2, 3, 4]);
    }

    #[test]
    fn raw_framing_sends_pcm_only() {
        let rec = Recorder::default();
        let mut t = BatchUploadTransport::new(Box::new(rec.clone()), BatchFraming::RawPcm, 16_000);
        t.flush(&[9, 9]).unwrap();
        let posts = rec.posts.lock();
        assert_eq!(posts[0].0, vec![9, 9]);
        assert_eq!(posts[0].1, "application/octet-stream");
    }

    #[test]
    fn offline_flush_is_skipped() {
        let rec = Recorder {
            offline: true,
            ..Recorder::default()
        };
        let mut t = BatchUploadTransport::new(Box::new(rec.clone()), BatchFraming::Wav, 16_000);
        assert!(matches!(t.flush(&[0, 0]), Err(WhiskerError::NotConnected)));
        assert!(rec.posts.lock().is_empty());
    }

    #[test]
    fn framing_serialises_camel_case() {
        assert_eq!(serde_json::to_string(&BatchFraming::RawPcm).unwrap(), "\"rawPcm\"");
        assert_eq!(
            serde_json::from_str::<BatchFraming>("\"wav\"").unwrap(),
            BatchFraming::Wav
        );
    }
}
