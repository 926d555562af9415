//! Persistent, auto-reconnecting backend stream.

use tracing::{debug, info, warn};

use super::{ConnectProgress, ControlToken, InboundMessage, StreamLink};
use crate::audio::AudioOutput;
use crate::buffering::frame::{decode_le_samples, AudioFrame};
use crate::vad::ActivityWindow;

pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_ACTIVITY_PREFIX: &str = "TXT:";
pub const DEFAULT_TALK_WINDOW_MS: u64 = 500;

/// Inbound messages handled per poll. Keeps one tick bounded when the
/// backend bursts.
const MAX_INBOUND_PER_POLL: usize = 32;

/// What one [`StreamingTransport::poll`] drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboundReport {
    pub audio_frames: usize,
    pub text_frames: usize,
}

impl InboundReport {
    pub fn is_empty(&self) -> bool {
        self.audio_frames == 0 && self.text_frames == 0
    }
}

pub struct StreamingTransport {
    link: Box<dyn StreamLink>,
    reconnect_interval_ms: u64,
    /// Earliest time of the next connect attempt. `None` means now.
    next_attempt_ms: Option<u64>,
    /// An attempt is in flight and is checked every tick.
    connecting: bool,
    incoming: ActivityWindow,
    activity_prefix: String,
    /// One warning per disconnected stretch for dropped frames.
    drop_warned: bool,
    /// Reply audio was played since the output was last finished.
    playing: bool,
    outbound: Vec<u8>,
    decoded: Vec<i16>,
}

impl StreamingTransport {
    pub fn new(
        link: Box<dyn StreamLink>,
        reconnect_interval_ms: u64,
        talk_window_ms: u64,
        activity_prefix: impl Into<String>,
    ) -> Self {
        Self {
            link,
            reconnect_interval_ms,
            next_attempt_ms: None,
            connecting: false,
            incoming: ActivityWindow::new(talk_window_ms),
            activity_prefix: activity_prefix.into(),
            drop_warned: false,
            playing: false,
            outbound: Vec::new(),
            decoded: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Advance reconnection without blocking. Returns whether the link is up.
    ///
    /// A new attempt starts once the retry interval has elapsed since the
    /// previous one failed. An attempt in flight is checked on every call.
    pub fn maintain(&mut self, now_ms: u64) -> bool {
        if self.link.is_connected() {
            return true;
        }
        if !self.connecting && self.next_attempt_ms.is_some_and(|at| now_ms < at) {
            return false;
        }

        match self.link.connect() {
            Ok(ConnectProgress::Connected) => {
                info!("backend stream connected");
                self.connecting = false;
                self.next_attempt_ms = None;
                self.drop_warned = false;
                true
            }
            Ok(ConnectProgress::Pending) => {
                self.connecting = true;
                false
            }
            Err(e) => {
                self.connecting = false;
                self.next_attempt_ms = Some(now_ms + self.reconnect_interval_ms);
                warn!(error = %e, retry_ms = self.reconnect_interval_ms, "backend stream connect failed");
                false
            }
        }
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    /// Send a control token. A no-op (with a warning) while disconnected.
    pub fn send_control(&mut self, token: ControlToken) -> bool {
        if !self.link.is_connected() {
            warn!(token = token.as_str(), "stream not connected; control token not sent");
            return false;
        }
        match self.link.send_text(token.as_str()) {
            Ok(()) => {
                debug!(token = token.as_str(), "control token sent");
                true
            }
            Err(e) => {
                warn!(token = token.as_str(), error = %e, "control token send failed");
                false
            }
        }
    }

    /// Forward one captured frame. Returns `false` if it was dropped.
    pub fn send_audio(&mut self, frame: &AudioFrame) -> bool {
        if frame.is_empty() {
            return true;
        }
        if !self.link.is_connected() {
            if !self.drop_warned {
                warn!("stream not connected; dropping captured audio until reconnect");
                self.drop_warned = true;
            }
            return false;
        }

        self.outbound.clear();
        frame.extend_le_bytes(&mut self.outbound);
        match self.link.send_binary(&self.outbound) {
            Ok(()) => true,
            Err(e) => {
                if !self.drop_warned {
                    warn!(error = %e, bytes = self.outbound.len(), "audio frame dropped");
                    self.drop_warned = true;
                }
                false
            }
        }
    }

    /// Reconnect housekeeping plus a bounded drain of inbound messages.
    ///
    /// Binary frames are written to `output` immediately and stamp the
    /// incoming-activity time, as do text frames carrying the activity
    /// prefix. Once reply audio has been quiet for the talk window the output
    /// is finished so its tail plays out.
    pub fn poll(&mut self, now_ms: u64, output: &mut dyn AudioOutput) -> InboundReport {
        let mut report = InboundReport::default();
        if self.playing && !self.incoming.is_active(now_ms) {
            output.finish();
            self.playing = false;
        }
        if !self.maintain(now_ms) {
            return report;
        }

        for _ in 0..MAX_INBOUND_PER_POLL {
            match self.link.recv() {
                Ok(Some(InboundMessage::Binary(bytes))) => {
                    decode_le_samples(&bytes, &mut self.decoded);
                    output.write(&self.decoded);
                    self.incoming.stamp(now_ms);
                    self.playing = true;
                    report.audio_frames += 1;
                }
                Ok(Some(InboundMessage::Text(text))) => {
                    report.text_frames += 1;
                    if let Some(rest) = text.strip_prefix(self.activity_prefix.as_str()) {
                        self.incoming.stamp(now_ms);
                        debug!(text = rest, "backend activity");
                    } else {
                        info!(text = text.as_str(), "backend message");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "backend stream dropped");
                    break;
                }
            }
        }
        report
    }

    /// Incoming activity within the talk window.
    pub fn is_talking(&self, now_ms: u64) -> bool {
        self.incoming.is_active(now_ms)
    }

    pub fn last_incoming_ms(&self) -> Option<u64> {
        self.incoming.last_ms()
    }
}
