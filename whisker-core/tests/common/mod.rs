//! Scripted peripherals shared by the control-loop integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use whisker_core::{
    audio::{AudioInput, AudioOutput},
    buffering::recording::RecordingBuffer,
    capture::{BatchCapture, StreamCapture},
    engine::{ControlContext, EngineShared},
    presentation::NullPresenter,
    transport::{
        BatchUploadTransport, ConnectProgress, InboundMessage, StreamLink, StreamingTransport,
        UploadClient, UploadResponse,
    },
    AudioCapturePipeline, BatchFraming, EngineConfig, Peripherals, Result, SessionState,
    SessionStateEvent, TouchInput, WhiskerError,
};

pub const TICK_MS: u64 = 10;

/// Produces `per_read` samples of a square wave on every read.
pub struct ScriptedInput {
    pub amplitude: i16,
    pub per_read: usize,
}

impl AudioInput for ScriptedInput {
    fn read_available(&mut self, buf: &mut [i16]) -> usize {
        let n = self.per_read.min(buf.len());
        for (i, slot) in buf[..n].iter_mut().enumerate() {
            *slot = if i % 2 == 0 {
                self.amplitude
            } else {
                -self.amplitude
            };
        }
        n
    }
}

#[derive(Clone, Default)]
pub struct Touch(pub Arc<AtomicBool>);

impl Touch {
    pub fn set(&self, touched: bool) {
        self.0.store(touched, Ordering::SeqCst);
    }
}

impl TouchInput for Touch {
    fn read_level(&mut self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct Speaker(pub Arc<Mutex<Vec<i16>>>);

impl AudioOutput for Speaker {
    fn write(&mut self, samples: &[i16]) -> usize {
        self.0.lock().extend_from_slice(samples);
        samples.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wire {
    Text(String),
    Binary(usize),
}

#[derive(Default)]
pub struct LinkState {
    pub refuse_connect: bool,
    pub connected: bool,
    pub sent: Vec<Wire>,
    pub inbound: VecDeque<InboundMessage>,
}

#[derive(Clone, Default)]
pub struct FakeLink(pub Arc<Mutex<LinkState>>);

impl FakeLink {
    pub fn sent(&self) -> Vec<Wire> {
        self.0.lock().sent.clone()
    }

    pub fn push_reply(&self, message: InboundMessage) {
        self.0.lock().inbound.push_back(message);
    }
}

impl StreamLink for FakeLink {
    fn is_connected(&self) -> bool {
        self.0.lock().connected
    }

    fn connect(&mut self) -> Result<ConnectProgress> {
        let mut state = self.0.lock();
        if state.refuse_connect {
            return Err(WhiskerError::Transport("connection refused".into()));
        }
        state.connected = true;
        Ok(ConnectProgress::Connected)
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        self.0.lock().sent.push(Wire::Text(text.to_string()));
        Ok(())
    }

    fn send_binary(&mut self, payload: &[u8]) -> Result<()> {
        self.0.lock().sent.push(Wire::Binary(payload.len()));
        Ok(())
    }

    fn recv(&mut self) -> Result<Option<InboundMessage>> {
        Ok(self.0.lock().inbound.pop_front())
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Clone)]
pub struct RecordingUploader {
    pub status: u16,
    pub elapsed_ms: u64,
    pub uploads: Arc<Mutex<Vec<Upload>>>,
}

impl Default for RecordingUploader {
    fn default() -> Self {
        Self {
            status: 200,
            elapsed_ms: 30,
            uploads: Arc::default(),
        }
    }
}

impl UploadClient for RecordingUploader {
    fn post(&mut self, body: Vec<u8>, content_type: &str) -> Result<UploadResponse> {
        self.uploads.lock().push(Upload {
            body,
            content_type: content_type.to_string(),
        });
        Ok(UploadResponse {
            status: self.status,
            body: "{\"ok\":true}".into(),
            elapsed_ms: self.elapsed_ms,
        })
    }
}

pub fn stream_pipeline(link: &FakeLink, config: &EngineConfig) -> Box<dyn AudioCapturePipeline> {
    Box::new(StreamCapture::new(StreamingTransport::new(
        Box::new(link.clone()),
        config.reconnect_interval_ms,
        config.talk_window_ms,
        config.activity_prefix.clone(),
    )))
}

pub fn batch_pipeline(
    uploader: &RecordingUploader,
    config: &EngineConfig,
) -> Box<dyn AudioCapturePipeline> {
    let transport = BatchUploadTransport::new(
        Box::new(uploader.clone()),
        BatchFraming::Wav,
        config.capture_sample_rate,
    );
    let buffer = RecordingBuffer::allocate(config.buffer_capacity).expect("allocate buffer");
    Box::new(BatchCapture::new(Some(buffer), transport))
}

/// A control loop driven by hand at a fixed tick spacing.
pub struct Rig {
    pub ctx: ControlContext,
    pub shared: EngineShared,
    pub touch: Touch,
    pub speaker: Speaker,
    pub now: u64,
    states: broadcast::Receiver<SessionStateEvent>,
    pub events: Vec<SessionStateEvent>,
}

impl Rig {
    pub fn new(config: EngineConfig, pipeline: Box<dyn AudioCapturePipeline>) -> Self {
        let shared = EngineShared::new();
        let states = shared.state_tx.subscribe();
        let touch = Touch::default();
        let speaker = Speaker::default();
        let peripherals = Peripherals {
            input: Box::new(ScriptedInput {
                amplitude: 800,
                per_read: config.frame_samples,
            }),
            output: Box::new(speaker.clone()),
            touch: Box::new(touch.clone()),
            presenter: Box::new(NullPresenter),
            pipeline,
        };
        Self {
            ctx: ControlContext::new(config, peripherals, shared.clone()),
            shared,
            touch,
            speaker,
            now: 0,
            states,
            events: Vec::new(),
        }
    }

    /// Tick from the current time up to and including `until_ms`.
    pub fn run_until(&mut self, until_ms: u64) {
        while self.now <= until_ms {
            self.ctx.tick(self.now);
            self.now += TICK_MS;
        }
        while let Ok(event) = self.states.try_recv() {
            self.events.push(event);
        }
    }

    /// Run until `at_ms`, then apply `touched` so the debounced edge lands
    /// `debounce_ms` later.
    pub fn touch_at(&mut self, at_ms: u64, touched: bool) {
        self.run_until(at_ms.saturating_sub(TICK_MS));
        self.touch.set(touched);
    }

    pub fn path(&self) -> Vec<(SessionState, u64)> {
        self.events.iter().map(|e| (e.to, e.at_ms)).collect()
    }

    pub fn state(&self) -> SessionState {
        self.ctx.state()
    }
}
