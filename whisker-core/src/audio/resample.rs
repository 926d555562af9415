//! Fixed-ratio sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! Sound cards run at their native rate (commonly 44.1 or 48 kHz) while the
//! backend speaks 16 kHz in and 24 kHz out. `RateConverter` bridges the two
//! on the tick thread, never inside an audio callback.
//!
//! Equal rates are a passthrough and create no rubato session.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::error;

use crate::error::{Result, WhiskerError};

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    resampler: Option<FastFixedIn<f32>>,
    /// Input carried over until a full rubato block is available.
    pending: Vec<f32>,
    chunk_size: usize,
    ratio: f64,
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    /// # Errors
    /// `WhiskerError::AudioDevice` if rubato rejects the ratio or block size.
    pub fn new(from_rate: u32, to_rate: u32, chunk_size: usize) -> Result<Self> {
        if from_rate == to_rate {
            return Ok(Self {
                resampler: None,
                pending: Vec::new(),
                chunk_size,
                ratio: 1.0,
                output_buf: Vec::new(),
            });
        }

        let ratio = to_rate as f64 / from_rate as f64;
        let resampler =
            FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, chunk_size, 1)
                .map_err(|e| WhiskerError::AudioDevice(format!("resampler init: {e}")))?;
        let output_buf = vec![vec![0f32; resampler.output_frames_max()]; 1];

        tracing::info!(from_rate, to_rate, chunk_size, "resampler created");

        Ok(Self {
            resampler: Some(resampler),
            pending: Vec::with_capacity(chunk_size * 2),
            chunk_size,
            ratio,
            output_buf,
        })
    }

    /// Feed `samples`, appending whatever output is ready to `out`.
    pub fn process_into(&mut self, samples: &[f32], out: &mut Vec<f32>) {
        let Some(ref mut resampler) = self.resampler else {
            out.extend_from_slice(samples);
            return;
        };

        self.pending.extend_from_slice(samples);
        let mut consumed_total = 0;
        while self.pending.len() - consumed_total >= self.chunk_size {
            let block = &self.pending[consumed_total..consumed_total + self.chunk_size];
            match resampler.process_into_buffer(&[block], &mut self.output_buf, None) {
                Ok((_, produced)) => out.extend_from_slice(&self.output_buf[0][..produced]),
                Err(e) => error!("resampler process error: {e}"),
            }
            consumed_total += self.chunk_size;
        }
        self.pending.drain(..consumed_total);
    }

    /// Push the carried-over partial block through, zero-padded, and append
    /// the output that corresponds to real input.
    pub fn flush_into(&mut self, out: &mut Vec<f32>) {
        let Some(ref mut resampler) = self.resampler else {
            return;
        };
        if self.pending.is_empty() {
            return;
        }

        let tail = self.pending.len();
        self.pending.resize(self.chunk_size, 0.0);
        match resampler.process_into_buffer(&[&self.pending[..]], &mut self.output_buf, None) {
            Ok((_, produced)) => {
                let keep = ((tail as f64 * self.ratio).ceil() as usize).min(produced);
                out.extend_from_slice(&self.output_buf[0][..keep]);
            }
            Err(e) => error!("resampler flush error: {e}"),
        }
        self.pending.clear();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}

/// Scale a normalised sample to 16-bit PCM, saturating at the rails.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32_768.0
}
