//! `WhiskerEngine`: top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! WhiskerEngine::new(config)
//!     └─► start(open)   → peripherals opened on the loop thread, loop spawned
//!         └─► stop()    → running=false, loop cancels any open capture, exits
//!             └─► join() → waits for the loop thread to release peripherals
//! ```
//!
//! `start()`/`stop()` are guarded: calling them in the wrong state returns an
//! error rather than panicking.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on most platforms, so peripherals are built
//! *inside* the `spawn_blocking` closure by the caller-supplied `open`
//! function and never cross a thread boundary. A sync oneshot channel
//! propagates open errors back to the `start()` caller.

pub mod control;

use std::sync::{atomic::Ordering, Arc};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    capture::CaptureMode,
    clock::{Clock, MonotonicClock},
    error::{Result, WhiskerError},
    ipc::events::{AudioActivityEvent, SessionStateEvent, UploadEvent},
    session::{SessionState, SessionTimings},
    touch::DEFAULT_DEBOUNCE_MS,
    transport::{
        http::DEFAULT_UPLOAD_TIMEOUT_MS,
        streaming::{DEFAULT_ACTIVITY_PREFIX, DEFAULT_RECONNECT_INTERVAL_MS, DEFAULT_TALK_WINDOW_MS},
        ws::DEFAULT_CONNECT_TIMEOUT_MS,
        BatchFraming,
    },
    vad::peak::{DEFAULT_HANGOVER_MS, DEFAULT_THRESHOLD},
};

pub use control::{
    ControlContext, ControlDiagnostics, DiagnosticsSnapshot, EngineShared, Peripherals, TickReport,
};

/// Configuration for `WhiskerEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: CaptureMode,
    /// Microphone PCM rate sent to the backend (Hz). Default: 16000.
    pub capture_sample_rate: u32,
    /// Reply audio rate from the backend (Hz). Default: 24000.
    pub playback_sample_rate: u32,
    /// Samples read per tick. Default: 512.
    pub frame_samples: usize,
    /// Batch recording buffer size in bytes. Default: 50000.
    pub buffer_capacity: usize,
    pub batch_framing: BatchFraming,
    pub timings: SessionTimings,
    pub debounce_ms: u64,
    pub silence_threshold: u16,
    pub silence_hangover_ms: u64,
    /// Batch-mode tick cadence. Default: 20.
    pub tick_interval_ms: u64,
    /// Stream-mode nap on ticks that moved no audio. Default: 2.
    pub idle_sleep_ms: u64,
    pub upload_url: String,
    pub upload_timeout_ms: u64,
    pub stream_host: String,
    pub stream_port: u16,
    pub stream_path: String,
    pub connect_timeout_ms: u64,
    pub reconnect_interval_ms: u64,
    /// Text frames starting with this mark backend activity.
    pub activity_prefix: String,
    /// Reply activity newer than this counts as "talking".
    pub talk_window_ms: u64,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::default(),
            capture_sample_rate: 16_000,
            playback_sample_rate: 24_000,
            frame_samples: 512,
            buffer_capacity: 50_000,
            batch_framing: BatchFraming::default(),
            timings: SessionTimings::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            silence_threshold: DEFAULT_THRESHOLD,
            silence_hangover_ms: DEFAULT_HANGOVER_MS,
            tick_interval_ms: 20,
            idle_sleep_ms: 2,
            upload_url: "http://192.168.1.106:3000/upload-audio".into(),
            upload_timeout_ms: DEFAULT_UPLOAD_TIMEOUT_MS,
            stream_host: "192.168.1.106".into(),
            stream_port: 3001,
            stream_path: "/".into(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            activity_prefix: DEFAULT_ACTIVITY_PREFIX.into(),
            talk_window_ms: DEFAULT_TALK_WINDOW_MS,
            input_device: None,
            output_device: None,
        }
    }
}

/// The top-level engine handle.
///
/// `WhiskerEngine` is `Send + Sync`; all fields use interior mutability.
pub struct WhiskerEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    shared: EngineShared,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WhiskerEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            shared: EngineShared::new(),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open peripherals and start the control loop.
    ///
    /// `open` runs on the loop thread. Blocks until it returns, then the
    /// loop keeps running in a background blocking thread. Must be called
    /// from within a Tokio runtime.
    ///
    /// # Errors
    /// - `WhiskerError::AlreadyRunning` if already started.
    /// - Whatever `open` returns.
    pub fn start<F>(&self, open: F) -> Result<()>
    where
        F: FnOnce(&EngineConfig) -> Result<Peripherals> + Send + 'static,
    {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(WhiskerError::AlreadyRunning);
        }
        self.shared.diagnostics.reset();
        *self.shared.state.lock() = SessionState::Idle;

        let config = self.config.clone();
        let clock = Arc::clone(&self.clock);
        let shared = self.shared.clone();

        // Sync oneshot: loop thread signals open success/failure to start().
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<()>>();

        let handle = tokio::task::spawn_blocking(move || {
            let peripherals = match open(&config) {
                Ok(p) => {
                    let _ = open_tx.send(Ok(()));
                    p
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    shared.running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            let running = Arc::clone(&shared.running);
            control::run(ControlContext::new(config, peripherals, shared), clock.as_ref());
            running.store(false, Ordering::SeqCst);
            // Peripherals drop here, releasing devices on this thread.
        });

        match open_rx.recv() {
            Ok(Ok(())) => {
                *self.task.lock() = Some(handle);
                info!(mode = ?self.config.mode, "engine started");
                Ok(())
            }
            Ok(Err(e)) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(e)
            }
            Err(_) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(WhiskerError::Other(anyhow::anyhow!(
                    "control loop died before opening peripherals"
                )))
            }
        }
    }

    /// Ask the control loop to exit after its current tick.
    ///
    /// # Errors
    /// `WhiskerError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return Err(WhiskerError::NotRunning);
        }
        info!("engine stop requested");
        Ok(())
    }

    /// Wait for the loop thread to finish. Returns immediately if it was
    /// never started.
    pub async fn join(&self) {
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "control loop task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Current session state (snapshot).
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    pub fn subscribe_state(&self) -> broadcast::Receiver<SessionStateEvent> {
        self.shared.state_tx.subscribe()
    }

    pub fn subscribe_activity(&self) -> broadcast::Receiver<AudioActivityEvent> {
        self.shared.activity_tx.subscribe()
    }

    pub fn subscribe_uploads(&self) -> broadcast::Receiver<UploadEvent> {
        self.shared.upload_tx.subscribe()
    }

    /// Snapshot of loop counters for observability.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.shared.diagnostics.snapshot()
    }
}
