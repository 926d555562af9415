//! Reply-audio playback through a cpal output stream.

use cpal::{
    traits::{DeviceTrait, StreamTrait},
    FromSample, SampleFormat, SizedSample, Stream, StreamConfig,
};
use tracing::{error, info, warn};

use super::device::{select_device, Direction};
use super::resample::{i16_to_f32, RateConverter};
use super::AudioOutput;
use crate::buffering::{
    create_sample_ring, Consumer, Producer, SampleConsumer, SampleProducer,
    PLAYBACK_RING_CAPACITY,
};
use crate::error::{Result, WhiskerError};

const CONVERT_CHUNK: usize = 480;

/// Speaker backed by a cpal output stream. Underruns play silence.
pub struct CpalSpeaker {
    _stream: Stream,
    producer: SampleProducer,
    converter: RateConverter,
    staged: Vec<f32>,
    converted: Vec<f32>,
    pub device_rate: u32,
}

impl CpalSpeaker {
    /// # Errors
    /// `NoDefaultOutputDevice` when nothing can play audio, `AudioStream` if
    /// cpal cannot build or start the stream.
    pub fn open(preferred_device: Option<&str>, playback_rate: u32) -> Result<Self> {
        let device = select_device(Direction::Output, preferred_device)?;
        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening output device"
        );

        let supported = device
            .default_output_config()
            .map_err(|e| WhiskerError::AudioDevice(e.to_string()))?;
        let device_rate = supported.sample_rate().0;
        info!(
            device_rate,
            channels = supported.channels(),
            playback_rate,
            "output config selected"
        );

        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let (producer, consumer) = create_sample_ring(PLAYBACK_RING_CAPACITY);
        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_output::<f32>(&device, &config, consumer),
            SampleFormat::I16 => build_output::<i16>(&device, &config, consumer),
            SampleFormat::U16 => build_output::<u16>(&device, &config, consumer),
            SampleFormat::I32 => build_output::<i32>(&device, &config, consumer),
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
            producer,
            converter: RateConverter::new(playback_rate, device_rate, CONVERT_CHUNK)?,
            staged: Vec::with_capacity(CONVERT_CHUNK),
            converted: Vec::with_capacity(CONVERT_CHUNK * 4),
            device_rate,
        })
    }
}

impl CpalSpeaker {
    fn push_converted(&mut self) {
        let written = self.producer.push_slice(&self.converted);
        if written < self.converted.len() {
            warn!(
                "playback ring full: dropped {} samples",
                self.converted.len() - written
            );
        }
    }
}

impl AudioOutput for CpalSpeaker {
    fn write(&mut self, samples: &[i16]) -> usize {
        self.staged.clear();
        self.staged.extend(samples.iter().map(|&s| i16_to_f32(s)));
        self.converted.clear();
        self.converter.process_into(&self.staged, &mut self.converted);
        self.push_converted();
        samples.len()
    }

    fn finish(&mut self) {
        self.converted.clear();
        self.converter.flush_into(&mut self.converted);
        if !self.converted.is_empty() {
            self.push_converted();
        }
    }
}

fn build_output<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: SampleConsumer,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let ch = config.channels as usize;
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _info| {
                for frame in data.chunks_mut(ch) {
                    let value = consumer.try_pop().unwrap_or(0.0);
                    for slot in frame.iter_mut() {
                        *slot = T::from_sample(value);
                    }
                }
            },
            |err| error!("output stream error: {err}"),
            None,
        )
        .map_err(|e| WhiskerError::AudioStream(e.to_string()))
}
