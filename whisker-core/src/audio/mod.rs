//! Peripheral audio I/O.
//!
//! The control loop only sees the two narrow traits below. On a host with a
//! sound card they are backed by cpal streams:
//!
//! ```text
//! mic callback → mono f32 → SPSC ring ─► read_available(): resample → i16
//! write(): i16 → resample ─► SPSC ring → speaker callback → device channels
//! ```
//!
//! The cpal callbacks run on an OS audio thread and must not block or do I/O,
//! so they only push into or pop from the lock-free ring.
//!
//! `cpal::Stream` is `!Send` on most platforms; create and drop these types on
//! the thread that runs the control loop.

pub mod device;
#[cfg(feature = "audio-cpal")]
pub mod playback;
pub mod resample;

#[cfg(feature = "audio-cpal")]
pub use playback::CpalSpeaker;

/// Non-blocking PCM source.
pub trait AudioInput {
    /// Copy up to `buf.len()` mono samples at the capture rate into `buf`.
    ///
    /// Returns immediately; zero means no data yet and is not an error.
    fn read_available(&mut self, buf: &mut [i16]) -> usize;
}

/// PCM sink for reply audio.
pub trait AudioOutput {
    /// Queue mono samples at the playback rate. Returns how many were accepted.
    fn write(&mut self, samples: &[i16]) -> usize;

    /// Play out anything held back waiting for more input. Called once a
    /// reply has gone quiet.
    fn finish(&mut self) {}
}

/// Input that never produces samples.
#[derive(Debug, Default)]
pub struct SilentInput;

impl AudioInput for SilentInput {
    fn read_available(&mut self, _buf: &mut [i16]) -> usize {
        0
    }
}

/// Output that discards everything it is given.
#[derive(Debug, Default)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn write(&mut self, samples: &[i16]) -> usize {
        samples.len()
    }
}

#[cfg(feature = "audio-cpal")]
pub use capture::CpalMicrophone;

#[cfg(feature = "audio-cpal")]
mod capture {
    use cpal::{
        traits::{DeviceTrait, StreamTrait},
        FromSample, SampleFormat, SizedSample, Stream, StreamConfig,
    };
    use tracing::{error, info, warn};

    use super::device::{select_device, Direction};
    use super::resample::{f32_to_i16, RateConverter};
    use super::AudioInput;
    use crate::buffering::{
        create_sample_ring, Consumer, Producer, SampleConsumer, SampleProducer,
        CAPTURE_RING_CAPACITY,
    };
    use crate::error::{Result, WhiskerError};

    /// Device samples popped from the ring per refill.
    const REFILL_CHUNK: usize = 960;

    /// Microphone backed by a cpal input stream.
    pub struct CpalMicrophone {
        _stream: Stream,
        consumer: SampleConsumer,
        converter: RateConverter,
        scratch: Vec<f32>,
        /// Samples at the capture rate not yet handed out.
        ready: Vec<f32>,
        pub device_rate: u32,
    }

    impl CpalMicrophone {
        /// Open the preferred (or default) input device and start capture.
        ///
        /// # Errors
        /// `NoDefaultInputDevice` when no microphone exists, `AudioStream` if
        /// cpal cannot build or start the stream.
        pub fn open(preferred_device: Option<&str>, capture_rate: u32) -> Result<Self> {
            let device = select_device(Direction::Input, preferred_device)?;
            info!(
                device = device.name().unwrap_or_default().as_str(),
                "opening input device"
            );

            let supported = device
                .default_input_config()
                .map_err(|e| WhiskerError::AudioDevice(e.to_string()))?;
            let device_rate = supported.sample_rate().0;
            let channels = supported.channels();
            info!(device_rate, channels, capture_rate, "input config selected");

            let config = StreamConfig {
                channels,
                sample_rate: supported.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let (producer, consumer) = create_sample_ring(CAPTURE_RING_CAPACITY);
            let stream = match supported.sample_format() {
                SampleFormat::F32 => build_input::<f32>(&device, &config, producer),
                SampleFormat::I16 => build_input::<i16>(&device, &config, producer),
                SampleFormat::U16 => build_input::<u16>(&device, &config, producer),
                SampleFormat::I32 => build_input::<i32>(&device, &config, producer),
                fmt => {
                    return Err(WhiskerError::AudioStream(format!(
                        "unsupported sample format: {fmt:?}"
                    )))
                }
            }?;
            stream
                .play()
                .map_err(|e| WhiskerError::AudioStream(e.to_string()))?;

            Ok(Self {
                _stream: stream,
                consumer,
                converter: RateConverter::new(device_rate, capture_rate, REFILL_CHUNK)?,
                scratch: vec![0f32; REFILL_CHUNK],
                ready: Vec::with_capacity(REFILL_CHUNK * 2),
                device_rate,
            })
        }
    }

    impl AudioInput for CpalMicrophone {
        fn read_available(&mut self, buf: &mut [i16]) -> usize {
            while self.ready.len() < buf.len() {
                let n = self.consumer.pop_slice(&mut self.scratch);
                if n == 0 {
                    break;
                }
                self.converter
                    .process_into(&self.scratch[..n], &mut self.ready);
            }

            let n = self.ready.len().min(buf.len());
            for (dst, sample) in buf.iter_mut().zip(self.ready.drain(..n)) {
                *dst = f32_to_i16(sample);
            }
            n
        }
    }

    fn build_input<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut producer: SampleProducer,
    ) -> Result<Stream>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let ch = config.channels as usize;
        let mut mono: Vec<f32> = Vec::new();
        device
            .build_input_stream(
                config,
                move |data: &[T], _info| {
                    let frames = data.len() / ch;
                    mono.resize(frames, 0.0);
                    for (f, out) in mono.iter_mut().enumerate() {
                        let base = f * ch;
                        let sum: f32 = data[base..base + ch]
                            .iter()
                            .map(|&s| s.to_sample::<f32>())
                            .sum();
                        *out = sum / ch as f32;
                    }
                    let written = producer.push_slice(&mono);
                    if written < mono.len() {
                        warn!("capture ring full: dropped {} frames", mono.len() - written);
                    }
                },
                |err| error!("input stream error: {err}"),
                None,
            )
            .map_err(|e| WhiskerError::AudioStream(e.to_string()))
    }
}
