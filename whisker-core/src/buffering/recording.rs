//! Bounded byte buffer holding one batch-mode utterance.

use crate::buffering::frame::AudioFrame;
use crate::error::{Result, WhiskerError};

/// Returned by [`RecordingBuffer::append`] when the frame does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferFull {
    pub cursor: usize,
    pub incoming: usize,
    pub capacity: usize,
}

/// Pre-allocated PCM store with a monotonically advancing write cursor.
///
/// Invariant: `cursor <= capacity`. An append that would push the cursor past
/// capacity writes nothing.
#[derive(Debug)]
pub struct RecordingBuffer {
    bytes: Vec<u8>,
    cursor: usize,
}

impl RecordingBuffer {
    /// Allocate the full capacity up front.
    ///
    /// # Errors
    /// `WhiskerError::BufferAllocation` if the allocator refuses the request.
    pub fn allocate(capacity: usize) -> Result<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(capacity)
            .map_err(|_| WhiskerError::BufferAllocation { capacity })?;
        bytes.resize(capacity, 0);
        Ok(Self { bytes, cursor: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Forget all captured bytes. Storage is kept for the next session.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Copy the frame's samples in at the cursor.
    pub fn append(&mut self, frame: &AudioFrame) -> std::result::Result<usize, BufferFull> {
        let incoming = frame.byte_len();
        let end = self.cursor + incoming;
        if end > self.bytes.len() {
            return Err(BufferFull {
                cursor: self.cursor,
                incoming,
                capacity: self.bytes.len(),
            });
        }
        frame.write_le_bytes(&mut self.bytes[self.cursor..end]);
        self.cursor = end;
        Ok(self.cursor)
    }

    /// Bytes captured since the last reset.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.cursor]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of_bytes(byte_len: usize) -> AudioFrame {
        AudioFrame::from_samples(&vec![0x0102; byte_len / 2])
    }

    #[test]
    fn append_advances_cursor_and_copies_le_bytes() {
        let mut buf = RecordingBuffer::allocate(16).unwrap();
        let frame = AudioFrame::from_samples(&[0x0102, -1]);
        assert_eq!(buf.append(&frame), Ok(4));
        assert_eq!(buf.payload(), &[0x02, 0x01, 0xFF, 0xFF]);
    }

    #[test]
    fn exact_fill_is_allowed() {
        let mut buf = RecordingBuffer::allocate(8).unwrap();
        assert!(buf.append(&frame_of_bytes(8)).is_ok());
        assert_eq!(buf.cursor(), 8);
    }

    #[test]
    fn overflowing_append_writes_nothing() {
        let mut buf = RecordingBuffer::allocate(10).unwrap();
        buf.append(&frame_of_bytes(8)).unwrap();
        let before = buf.payload().to_vec();

        let err = buf.append(&frame_of_bytes(4)).unwrap_err();
        assert_eq!(
            err,
            BufferFull {
                cursor: 8,
                incoming: 4,
                capacity: 10
            }
        );
        assert_eq!(buf.cursor(), 8);
        assert_eq!(buf.payload(), &before[..]);
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut buf = RecordingBuffer::allocate(32).unwrap();
        buf.append(&frame_of_bytes(20)).unwrap();
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 32);
    }

    #[test]
    fn fifty_thousand_byte_buffer_overflows_on_twenty_fifth_frame() {
        let mut buf = RecordingBuffer::allocate(50_000).unwrap();
        let frame = frame_of_bytes(2048);
        let mut accepted = 0;
        loop {
            match buf.append(&frame) {
                Ok(_) => accepted += 1,
                Err(_) => break,
            }
        }
        assert_eq!(accepted, 24);
        assert_eq!(buf.cursor(), 24 * 2048);
        assert!(buf.cursor() <= 50_000);
    }
}
