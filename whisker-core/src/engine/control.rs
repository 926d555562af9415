//! Cooperative control loop.
//!
//! ## Tick stages
//!
//! ```text
//! 1. Sample touch level → debouncer → state machine (open / cancel capture)
//! 2. Read one AudioFrame (non-blocking; zero samples is normal)
//! 3. While capturing: silence detector + capture pipeline
//!    (overflow forces Listening → Stopping)
//! 4. Pipeline service: reconnects, inbound reply audio → speaker
//! 5. Timer transitions (hangover → commit, waiting timeout, reply idle)
//! 6. Publish transitions, render presentation
//! ```
//!
//! The input is drained every tick even when no capture is open so stale
//! audio never leaks into the next session.
//!
//! `run` drives `tick` inside `spawn_blocking` until the running flag clears.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    audio::{AudioInput, AudioOutput},
    buffering::frame::AudioFrame,
    capture::{AudioCapturePipeline, CaptureMode, CaptureOutcome, CommitOutcome},
    clock::Clock,
    engine::EngineConfig,
    ipc::events::{AudioActivityEvent, SessionStateEvent, UploadEvent},
    presentation::Presenter,
    session::{SessionAction, SessionState, VoiceSessionStateMachine},
    touch::{TouchInput, TouchInputDebouncer},
    transport::InboundReport,
    vad::{PeakSilenceDetector, VoiceActivityDetector},
};

/// Broadcast channel capacity per event kind.
const BROADCAST_CAP: usize = 256;

#[derive(Default)]
pub struct ControlDiagnostics {
    pub ticks: AtomicUsize,
    pub samples_in: AtomicUsize,
    pub bytes_captured: AtomicUsize,
    pub frames_forwarded: AtomicUsize,
    pub frames_dropped: AtomicUsize,
    pub commits: AtomicUsize,
    pub cancels: AtomicUsize,
    pub overflows: AtomicUsize,
    pub uploads_ok: AtomicUsize,
    pub uploads_failed: AtomicUsize,
    pub inbound_audio_frames: AtomicUsize,
}

impl ControlDiagnostics {
    pub fn reset(&self) {
        for counter in self.counters() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            samples_in: self.samples_in.load(Ordering::Relaxed),
            bytes_captured: self.bytes_captured.load(Ordering::Relaxed),
            frames_forwarded: self.frames_forwarded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            cancels: self.cancels.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            uploads_ok: self.uploads_ok.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            inbound_audio_frames: self.inbound_audio_frames.load(Ordering::Relaxed),
        }
    }

    fn counters(&self) -> [&AtomicUsize; 11] {
        [
            &self.ticks,
            &self.samples_in,
            &self.bytes_captured,
            &self.frames_forwarded,
            &self.frames_dropped,
            &self.commits,
            &self.cancels,
            &self.overflows,
            &self.uploads_ok,
            &self.uploads_failed,
            &self.inbound_audio_frames,
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub ticks: usize,
    /// Samples read from the input, captured or not.
    pub samples_in: usize,
    pub bytes_captured: usize,
    pub frames_forwarded: usize,
    pub frames_dropped: usize,
    pub commits: usize,
    pub cancels: usize,
    pub overflows: usize,
    pub uploads_ok: usize,
    pub uploads_failed: usize,
    pub inbound_audio_frames: usize,
}

/// State shared between the engine handle and the loop thread.
#[derive(Clone)]
pub struct EngineShared {
    pub running: Arc<AtomicBool>,
    pub state: Arc<Mutex<SessionState>>,
    pub state_tx: broadcast::Sender<SessionStateEvent>,
    pub activity_tx: broadcast::Sender<AudioActivityEvent>,
    pub upload_tx: broadcast::Sender<UploadEvent>,
    pub seq: Arc<AtomicU64>,
    pub diagnostics: Arc<ControlDiagnostics>,
}

impl EngineShared {
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (activity_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (upload_tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            running: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            state_tx,
            activity_tx,
            upload_tx,
            seq: Arc::new(AtomicU64::new(0)),
            diagnostics: Arc::new(ControlDiagnostics::default()),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for EngineShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Device collaborators the loop drives. Built on the loop thread.
pub struct Peripherals {
    pub input: Box<dyn AudioInput>,
    pub output: Box<dyn AudioOutput>,
    pub touch: Box<dyn TouchInput>,
    pub presenter: Box<dyn Presenter>,
    pub pipeline: Box<dyn AudioCapturePipeline>,
}

/// What one tick did. Used for pacing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub samples_read: usize,
    pub inbound: InboundReport,
    pub transitions: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.samples_read == 0 && self.inbound.is_empty()
    }
}

pub struct ControlContext {
    config: EngineConfig,
    peripherals: Peripherals,
    debouncer: TouchInputDebouncer,
    session: VoiceSessionStateMachine,
    detector: Box<dyn VoiceActivityDetector>,
    frame: AudioFrame,
    shared: EngineShared,
}

impl ControlContext {
    pub fn new(config: EngineConfig, peripherals: Peripherals, shared: EngineShared) -> Self {
        let detector = Box::new(PeakSilenceDetector::new(
            config.silence_threshold,
            config.silence_hangover_ms,
        ));
        Self {
            debouncer: TouchInputDebouncer::new(config.debounce_ms),
            session: VoiceSessionStateMachine::new(config.timings),
            frame: AudioFrame::with_capacity(config.frame_samples),
            detector,
            peripherals,
            shared,
            config,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn mode(&self) -> CaptureMode {
        self.peripherals.pipeline.mode()
    }

    pub fn pipeline(&self) -> &dyn AudioCapturePipeline {
        self.peripherals.pipeline.as_ref()
    }

    /// Run one pass of the loop at `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> TickReport {
        let diag = Arc::clone(&self.shared.diagnostics);
        diag.ticks.fetch_add(1, Ordering::Relaxed);
        let mut report = TickReport::default();

        // ── 1. Touch ─────────────────────────────────────────────────────────
        let raw = self.peripherals.touch.read_level();
        if let Some(event) = self.debouncer.sample(raw, now_ms) {
            debug!(edge = ?event.edge, hold_ms = ?event.hold_duration_ms, "touch");
            if let Some(action) = self.session.on_touch(&event) {
                self.execute(action, now_ms);
            }
            report.transitions += self.publish_transitions(None);
        }

        // ── 2–3. Capture ─────────────────────────────────────────────────────
        let n = self
            .peripherals
            .input
            .read_available(self.frame.storage_mut());
        self.frame.set_len(n);
        report.samples_read = n;
        diag.samples_in.fetch_add(n, Ordering::Relaxed);

        if n > 0 && self.peripherals.pipeline.is_open() {
            let peak = self.detector.observe(&self.frame, now_ms);
            let _ = self.shared.activity_tx.send(AudioActivityEvent {
                seq: self.shared.next_seq(),
                peak,
                is_silent: self.detector.detected_silence(now_ms),
            });

            match self.peripherals.pipeline.process(&self.frame, now_ms) {
                CaptureOutcome::Appended(_) => {
                    diag.bytes_captured
                        .fetch_add(self.frame.byte_len(), Ordering::Relaxed);
                }
                CaptureOutcome::Forwarded => {
                    diag.frames_forwarded.fetch_add(1, Ordering::Relaxed);
                }
                CaptureOutcome::Dropped => {
                    diag.frames_dropped.fetch_add(1, Ordering::Relaxed);
                }
                CaptureOutcome::Full => {
                    diag.overflows.fetch_add(1, Ordering::Relaxed);
                    self.session.on_capture_full(now_ms);
                    report.transitions += self.publish_transitions(Some("buffer full"));
                }
                CaptureOutcome::Ignored => {}
            }
        }

        // ── 4. Inbound ───────────────────────────────────────────────────────
        report.inbound = self
            .peripherals
            .pipeline
            .service(now_ms, self.peripherals.output.as_mut());
        diag.inbound_audio_frames
            .fetch_add(report.inbound.audio_frames, Ordering::Relaxed);

        // ── 5. Timers ────────────────────────────────────────────────────────
        let last_incoming = self.peripherals.pipeline.last_incoming_ms();
        if let Some(action) = self.session.poll(now_ms, last_incoming) {
            self.execute(action, now_ms);
        }
        report.transitions += self.publish_transitions(None);

        // ── 6. Presentation ──────────────────────────────────────────────────
        self.peripherals
            .presenter
            .render(self.session.state(), now_ms);

        report
    }

    /// Close any open capture without committing.
    pub fn shutdown(&mut self, now_ms: u64) {
        if self.peripherals.pipeline.is_open() {
            info!("capture open at shutdown; cancelling");
            self.peripherals.pipeline.cancel(now_ms);
            self.detector.end();
        }
    }

    fn execute(&mut self, action: SessionAction, now_ms: u64) {
        let diag = &self.shared.diagnostics;
        match action {
            SessionAction::OpenCapture => {
                self.peripherals.pipeline.open(now_ms);
                self.detector.begin(now_ms);
            }
            SessionAction::CancelCapture => {
                self.peripherals.pipeline.cancel(now_ms);
                self.detector.end();
                diag.cancels.fetch_add(1, Ordering::Relaxed);
            }
            SessionAction::CommitCapture => {
                self.detector.end();
                diag.commits.fetch_add(1, Ordering::Relaxed);
                match self.peripherals.pipeline.commit(now_ms) {
                    CommitOutcome::Uploaded { bytes, response } => {
                        if response.is_success() {
                            diag.uploads_ok.fetch_add(1, Ordering::Relaxed);
                        } else {
                            diag.uploads_failed.fetch_add(1, Ordering::Relaxed);
                        }
                        let _ = self.shared.upload_tx.send(UploadEvent {
                            status: Some(response.status),
                            bytes,
                            body: Some(response.body),
                        });
                    }
                    CommitOutcome::UploadFailed { bytes } => {
                        diag.uploads_failed.fetch_add(1, Ordering::Relaxed);
                        let _ = self.shared.upload_tx.send(UploadEvent {
                            status: None,
                            bytes,
                            body: None,
                        });
                    }
                    CommitOutcome::Streamed | CommitOutcome::Empty => {}
                }
            }
        }
    }

    fn publish_transitions(&mut self, detail: Option<&str>) -> usize {
        let transitions = self.session.take_transitions();
        for t in &transitions {
            info!(from = t.from.as_str(), to = t.to.as_str(), at_ms = t.at_ms, "session state changed");
            *self.shared.state.lock() = t.to;
            let _ = self.shared.state_tx.send(SessionStateEvent {
                seq: self.shared.next_seq(),
                from: t.from,
                to: t.to,
                at_ms: t.at_ms,
                detail: detail.map(str::to_string),
            });
        }
        transitions.len()
    }
}

/// Blocking loop. Returns once `running` is cleared.
///
/// Batch mode keeps a fixed `tick_interval_ms` cadence. Stream mode runs
/// back to back and only naps `idle_sleep_ms` on ticks that moved no audio.
pub fn run(mut ctx: ControlContext, clock: &dyn Clock) {
    let mode = ctx.mode();
    let cadence = Duration::from_millis(ctx.config.tick_interval_ms);
    let idle_sleep = Duration::from_millis(ctx.config.idle_sleep_ms);
    info!(?mode, "control loop started");

    while ctx.shared.running.load(Ordering::Relaxed) {
        let started = Instant::now();
        let report = ctx.tick(clock.now_ms());

        match mode {
            CaptureMode::Batch => {
                let spent = started.elapsed();
                if spent > cadence {
                    debug!(spent_ms = spent.as_millis() as u64, "tick overran cadence");
                } else {
                    std::thread::sleep(cadence - spent);
                }
            }
            CaptureMode::Stream => {
                if report.is_idle() {
                    std::thread::sleep(idle_sleep);
                }
            }
        }
    }

    ctx.shutdown(clock.now_ms());
    let snapshot = ctx.shared.diagnostics.snapshot();
    if snapshot.frames_dropped > 0 {
        warn!(dropped = snapshot.frames_dropped, "frames dropped during run");
    }
    info!(?snapshot, "control loop stopped");
}
