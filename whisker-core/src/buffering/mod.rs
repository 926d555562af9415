//! Sample storage: the per-tick frame, the batch recording buffer, and the
//! lock-free SPSC ring that connects audio callbacks to the tick.
//!
//! The ring uses `ringbuf::HeapRb<f32>`, whose `push_slice` is wait-free and
//! safe to call from a real-time audio callback.

pub mod frame;
pub mod recording;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Observer, Producer};

/// Producer half, held by whichever side writes samples.
pub type SampleProducer = ringbuf::HeapProd<f32>;

/// Consumer half, held by whichever side reads samples.
pub type SampleConsumer = ringbuf::HeapCons<f32>;

/// Capture ring: 2^18 samples ≈ 5.4 s at 48 kHz. The tick drains it every
/// 20 ms, so this only fills while the batch upload blocks.
pub const CAPTURE_RING_CAPACITY: usize = 1 << 18;

/// Playback ring: 2^19 samples ≈ 10.9 s at 48 kHz of buffered reply audio.
pub const PLAYBACK_RING_CAPACITY: usize = 1 << 19;

/// Create a matched producer/consumer pair backed by a heap ring.
pub fn create_sample_ring(capacity: usize) -> (SampleProducer, SampleConsumer) {
    HeapRb::<f32>::new(capacity).split()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_drops_when_full() {
        let (mut producer, mut consumer) = create_sample_ring(4);
        assert_eq!(producer.push_slice(&[0.1, 0.2, 0.3, 0.4, 0.5]), 4);
        let mut out = [0f32; 8];
        assert_eq!(consumer.pop_slice(&mut out), 4);
        assert_eq!(consumer.pop_slice(&mut out), 0);
    }
}
