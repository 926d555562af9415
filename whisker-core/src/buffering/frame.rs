//! Fixed-capacity PCM frame read from the peripheral once per tick.

/// A block of mono 16-bit PCM samples.
///
/// The control loop owns exactly one frame and refills it every tick, so the
/// sample storage is allocated once at startup and never grows.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    samples: Vec<i16>,
    len: usize,
}

impl AudioFrame {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: vec![0; capacity],
            len: 0,
        }
    }

    /// Build a frame holding exactly `samples`.
    pub fn from_samples(samples: &[i16]) -> Self {
        Self {
            samples: samples.to_vec(),
            len: samples.len(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Writable view of the whole backing storage for a peripheral read.
    /// Follow with [`set_len`](Self::set_len).
    pub fn storage_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    /// Mark the first `len` samples as valid. Clamped to capacity.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.samples.len());
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the valid samples once serialised as little-endian bytes.
    pub fn byte_len(&self) -> usize {
        self.len * 2
    }

    /// Maximum absolute sample value. Zero for an empty frame.
    pub fn peak_amplitude(&self) -> u16 {
        self.samples()
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }

    /// Serialise the valid samples as little-endian bytes into `out`.
    ///
    /// `out` must be exactly [`byte_len`](Self::byte_len) long.
    pub fn write_le_bytes(&self, out: &mut [u8]) {
        for (dst, sample) in out.chunks_exact_mut(2).zip(self.samples()) {
            dst.copy_from_slice(&sample.to_le_bytes());
        }
    }

    /// Append the valid samples as little-endian bytes to `out`.
    pub fn extend_le_bytes(&self, out: &mut Vec<u8>) {
        out.reserve(self.byte_len());
        for sample in self.samples() {
            out.extend_from_slice(&sample.to_le_bytes());
        }
    }
}

/// Decode little-endian 16-bit PCM bytes. A trailing odd byte is ignored.
pub fn decode_le_samples(bytes: &[u8], out: &mut Vec<i16>) {
    out.clear();
    out.extend(
        bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
    );
}
