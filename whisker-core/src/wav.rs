//! Canonical 44-byte RIFF/WAVE header for PCM payloads.

pub const WAV_HEADER_LEN: usize = 44;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Length of the PCM data chunk in bytes.
    pub payload_len: u32,
}

impl WavHeader {
    /// 16-bit mono header for `payload_len` bytes of PCM.
    pub fn pcm16_mono(sample_rate: u32, payload_len: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
            payload_len,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.block_align())
    }

    /// Serialise as little-endian bytes.
    pub fn encode(&self) -> [u8; WAV_HEADER_LEN] {
        let mut out = [0u8; WAV_HEADER_LEN];
        out[0..4].copy_from_slice(b"RIFF");
        out[4..8].copy_from_slice(&(36 + self.payload_len).to_le_bytes());
        out[8..12].copy_from_slice(b"WAVE");
        out[12..16].copy_from_slice(b"fmt ");
        out[16..20].copy_from_slice(&16u32.to_le_bytes());
        out[20..22].copy_from_slice(&1u16.to_le_bytes());
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(b"data");
        out[40..44].copy_from_slice(&self.payload_len.to_le_bytes());
        out
    }
}

/// Header followed by `pcm`, ready to upload.
pub fn encode_wav(sample_rate: u32, pcm: &[u8]) -> Vec<u8> {
    let header = WavHeader::pcm16_mono(sample_rate, pcm.len() as u32);
    let mut body = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    body.extend_from_slice(&header.encode());
    body.extend_from_slice(pcm);
    body
}
