use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use super::{UploadClient, UploadResponse};
use crate::error::Result;

pub const DEFAULT_UPLOAD_TIMEOUT_MS: u64 = 10_000;

/// Blocking HTTP POST client for batch uploads.
pub struct HttpUploader {
    client: Client,
    url: String,
}

impl HttpUploader {
    /// # Errors
    /// If the TLS backend or client cannot be initialised.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl UploadClient for HttpUploader {
    fn post(&mut self, body: Vec<u8>, content_type: &str) -> Result<UploadResponse> {
        let started = Instant::now();
        debug!(url = self.url.as_str(), bytes = body.len(), "posting utterance");
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(UploadResponse {
            status,
            body,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WhiskerError;
    use crate::transport::{BatchFraming, BatchUploadTransport};

    #[test]
    fn unreachable_backend_is_attempted_and_reported_by_flush() {
        let uploader =
            HttpUploader::new("http://127.0.0.1:9/upload-audio", Duration::from_millis(500))
                .expect("client");
        assert!(uploader.is_connected());

        let mut transport = BatchUploadTransport::new(Box::new(uploader), BatchFraming::Wav, 16_000);
        let err = transport.flush(&[0u8; 64]).unwrap_err();
        assert!(matches!(err, WhiskerError::Upload(_)));
    }
}
