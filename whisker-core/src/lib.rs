//! # whisker-core
//!
//! Voice-session pipeline for a touch-to-talk desk robot.
//!
//! ## Architecture
//!
//! ```text
//! TouchInput → TouchInputDebouncer → VoiceSessionStateMachine
//!                                          │ SessionAction
//! AudioInput → AudioFrame ──► AudioCapturePipeline ──► backend
//!                  │            (BatchCapture: RecordingBuffer → WAV → HTTP POST)
//!                  │            (StreamCapture: frame → WebSocket binary)
//!          PeakSilenceDetector        │
//!                                     ▼ inbound reply audio / activity
//!                               AudioOutput, state machine timers
//!                                     │
//!                        Presenter + broadcast::Sender<SessionStateEvent>
//! ```
//!
//! Everything runs in one cooperative tick inside `spawn_blocking`. Audio
//! device callbacks only touch lock-free rings.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod capture;
pub mod clock;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod presentation;
pub mod session;
pub mod touch;
pub mod transport;
pub mod vad;
pub mod wav;

// Convenience re-exports for downstream crates
pub use audio::{AudioInput, AudioOutput};
pub use capture::{build_pipeline, AudioCapturePipeline, CaptureMode};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use engine::{EngineConfig, Peripherals, WhiskerEngine};
pub use error::{Result, WhiskerError};
pub use ipc::events::{AudioActivityEvent, SessionStateEvent, UploadEvent};
pub use presentation::{Presenter, PresenterSet};
pub use session::{SessionState, SessionTimings, VoiceSessionStateMachine};
pub use touch::{TouchEvent, TouchInput, TouchInputDebouncer};
pub use transport::BatchFraming;

#[cfg(feature = "audio-cpal")]
pub use audio::{CpalMicrophone, CpalSpeaker};
