//! Conversational session state machine.
//!
//! Pure logic: it consumes debounced touch edges, capture overflow and the
//! backend-activity timestamp, and returns the capture side effect the caller
//! must perform. It never touches I/O itself.
//!
//! ```text
//!            press                release ≥ min_hold        hangover
//!   Idle ───────────► Listening ───────────────────► Stopping ───────► Waiting
//!    ▲ ▲                  │  release < min_hold                         │  │
//!    │ └──────────────────┘  (cancel)              reply activity       │  │
//!    │                                      Responding ◄────────────────┘  │
//!    └──────────── reply idle / wait timeout ──────┴──────────────────────┘
//! ```
//!
//! A press in `Waiting` or `Responding` barges in and starts a new capture.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::touch::{TouchEdge, TouchEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Listening,
    Stopping,
    Waiting,
    Responding,
}

impl SessionState {
    /// A capture session is open exactly in these states.
    pub fn is_capturing(self) -> bool {
        matches!(self, Self::Listening | Self::Stopping)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Stopping => "stopping",
            Self::Waiting => "waiting",
            Self::Responding => "responding",
        }
    }
}

/// Capture side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    OpenCapture,
    CancelCapture,
    CommitCapture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionTimings {
    /// Holds shorter than this cancel the capture.
    pub min_hold_ms: u64,
    /// Capture keeps running this long after release.
    pub hangover_ms: u64,
    /// Give up on the backend after this long in `Waiting`.
    pub wait_timeout_ms: u64,
    /// `Responding` ends after this long without reply activity.
    pub reply_idle_ms: u64,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            min_hold_ms: 500,
            hangover_ms: 600,
            wait_timeout_ms: 5_000,
            reply_idle_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    pub at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct VoiceSessionStateMachine {
    state: SessionState,
    timings: SessionTimings,
    entered_at_ms: u64,
    press_at_ms: Option<u64>,
    transitions: Vec<Transition>,
}

impl VoiceSessionStateMachine {
    pub fn new(timings: SessionTimings) -> Self {
        Self {
            state: SessionState::Idle,
            timings,
            entered_at_ms: 0,
            press_at_ms: None,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timings(&self) -> &SessionTimings {
        &self.timings
    }

    /// When the current state was entered.
    pub fn entered_at_ms(&self) -> u64 {
        self.entered_at_ms
    }

    /// Transitions recorded since the last call.
    pub fn take_transitions(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.transitions)
    }

    pub fn on_touch(&mut self, event: &TouchEvent) -> Option<SessionAction> {
        let now = event.timestamp_ms;
        match (event.edge, self.state) {
            (
                TouchEdge::Pressed,
                SessionState::Idle | SessionState::Waiting | SessionState::Responding,
            ) => {
                self.press_at_ms = Some(now);
                self.enter(SessionState::Listening, now);
                Some(SessionAction::OpenCapture)
            }
            (TouchEdge::Released, SessionState::Listening) => {
                let hold = event
                    .hold_duration_ms
                    .or_else(|| self.press_at_ms.map(|p| now.saturating_sub(p)))
                    .unwrap_or(0);
                self.press_at_ms = None;
                if hold < self.timings.min_hold_ms {
                    debug!(hold_ms = hold, "short press; cancelling capture");
                    self.enter(SessionState::Idle, now);
                    Some(SessionAction::CancelCapture)
                } else {
                    self.enter(SessionState::Stopping, now);
                    None
                }
            }
            _ => None,
        }
    }

    /// The capture buffer overflowed. Behaves like a long release.
    pub fn on_capture_full(&mut self, now_ms: u64) {
        if self.state == SessionState::Listening {
            self.press_at_ms = None;
            self.enter(SessionState::Stopping, now_ms);
        }
    }

    /// Timer-driven transitions. `last_incoming_ms` is the most recent
    /// backend activity, if any.
    pub fn poll(&mut self, now_ms: u64, last_incoming_ms: Option<u64>) -> Option<SessionAction> {
        let elapsed = now_ms.saturating_sub(self.entered_at_ms);
        match self.state {
            SessionState::Stopping if elapsed >= self.timings.hangover_ms => {
                self.enter(SessionState::Waiting, now_ms);
                Some(SessionAction::CommitCapture)
            }
            SessionState::Waiting => {
                if last_incoming_ms.is_some_and(|t| t >= self.entered_at_ms) {
                    self.enter(SessionState::Responding, now_ms);
                } else if elapsed >= self.timings.wait_timeout_ms {
                    debug!(waited_ms = elapsed, "no reply from backend");
                    self.enter(SessionState::Idle, now_ms);
                }
                None
            }
            SessionState::Responding => {
                let quiet = last_incoming_ms.map_or(true, |t| {
                    now_ms.saturating_sub(t) >= self.timings.reply_idle_ms
                });
                if quiet {
                    self.enter(SessionState::Idle, now_ms);
                }
                None
            }
            _ => None,
        }
    }

    fn enter(&mut self, to: SessionState, at_ms: u64) {
        let from = self.state;
        self.state = to;
        self.entered_at_ms = at_ms;
        self.transitions.push(Transition { from, to, at_ms });
    }
}

impl Default for VoiceSessionStateMachine {
    fn default() -> Self {
        Self::new(SessionTimings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    fn path(sm: &mut VoiceSessionStateMachine) -> Vec<(SessionState, u64)> {
        sm.take_transitions()
            .into_iter()
            .map(|t| (t.to, t.at_ms))
            .collect()
    }

    #[test]
    fn short_press_cancels() {
        let mut sm = VoiceSessionStateMachine::default();
        assert_eq!(
            sm.on_touch(&TouchEvent::pressed(0)),
            Some(SessionAction::OpenCapture)
        );
        assert_eq!(
            sm.on_touch(&TouchEvent::released(200, 200)),
            Some(SessionAction::CancelCapture)
        );
        assert_eq!(sm.state(), Idle);
        assert_eq!(path(&mut sm), vec![(Listening, 0), (Idle, 200)]);
    }

    #[test]
    fn hold_at_threshold_is_long() {
        let mut sm = VoiceSessionStateMachine::default();
        sm.on_touch(&TouchEvent::pressed(0));
        assert_eq!(sm.on_touch(&TouchEvent::released(500, 500)), None);
        assert_eq!(sm.state(), Stopping);
    }

    #[test]
    fn full_conversation_cycle() {
        let mut sm = VoiceSessionStateMachine::default();
        sm.on_touch(&TouchEvent::pressed(0));
        sm.on_touch(&TouchEvent::released(800, 800));
        assert_eq!(sm.poll(1_399, None), None);
        assert_eq!(sm.poll(1_400, None), Some(SessionAction::CommitCapture));
        assert_eq!(sm.state(), Waiting);
        assert_eq!(sm.poll(1_500, None), None);
        sm.poll(1_600, Some(1_600));
        assert_eq!(sm.state(), Responding);
        sm.poll(2_099, Some(1_600));
        assert_eq!(sm.state(), Responding);
        sm.poll(2_100, Some(1_600));
        assert_eq!(
            path(&mut sm),
            vec![
                (Listening, 0),
                (Stopping, 800),
                (Waiting, 1_400),
                (Responding, 1_600),
                (Idle, 2_100)
            ]
        );
    }

    #[test]
    fn waiting_times_out() {
        let mut sm = VoiceSessionStateMachine::default();
        sm.on_touch(&TouchEvent::pressed(0));
        sm.on_touch(&TouchEvent::released(600, 600));
        sm.poll(1_200, None);
        sm.poll(6_199, None);
        assert_eq!(sm.state(), Waiting);
        sm.poll(6_200, None);
        assert_eq!(sm.state(), Idle);
    }

    #[test]
    fn stale_activity_does_not_promote_waiting() {
        let mut sm = VoiceSessionStateMachine::default();
        sm.on_touch(&TouchEvent::pressed(0));
        sm.on_touch(&TouchEvent::released(600, 600));
        sm.poll(1_200, Some(100));
        sm.poll(1_300, Some(100));
        assert_eq!(sm.state(), Waiting);
    }

    #[test]
    fn press_barges_in_while_waiting_or_responding() {
        let mut sm = VoiceSessionStateMachine::default();
        sm.on_touch(&TouchEvent::pressed(0));
        sm.on_touch(&TouchEvent::released(600, 600));
        sm.poll(1_200, None);
        assert_eq!(
            sm.on_touch(&TouchEvent::pressed(1_300)),
            Some(SessionAction::OpenCapture)
        );
        assert_eq!(sm.state(), Listening);
    }

    #[test]
    fn unexpected_edges_are_ignored() {
        let mut sm = VoiceSessionStateMachine::default();
        assert_eq!(sm.on_touch(&TouchEvent::released(10, 10)), None);
        sm.on_touch(&TouchEvent::pressed(20));
        assert_eq!(sm.on_touch(&TouchEvent::pressed(30)), None);
        sm.on_touch(&TouchEvent::released(700, 680));
        assert_eq!(sm.on_touch(&TouchEvent::pressed(710)), None);
        assert_eq!(sm.state(), Stopping);
    }

    #[test]
    fn overflow_forces_stop_once() {
        let mut sm = VoiceSessionStateMachine::default();
        sm.on_touch(&TouchEvent::pressed(0));
        sm.on_capture_full(300);
        sm.on_capture_full(320);
        assert_eq!(sm.state(), Stopping);
        assert_eq!(sm.entered_at_ms(), 300);
        assert_eq!(sm.poll(900, None), Some(SessionAction::CommitCapture));
    }

    #[test]
    fn capturing_states() {
        assert!(Listening.is_capturing());
        assert!(Stopping.is_capturing());
        assert!(!Idle.is_capturing());
        assert!(!Waiting.is_capturing());
        assert!(!Responding.is_capturing());
    }
}
