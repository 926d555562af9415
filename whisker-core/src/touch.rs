//! Touch sensor front end: raw level in, clean press/release edges out.

use serde::{Deserialize, Serialize};

/// Raw digital input sampled once per tick.
pub trait TouchInput {
    /// `true` while the sensor reads as touched.
    fn read_level(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchEdge {
    Pressed,
    Released,
}

/// A debounced edge. Consumed once by the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEvent {
    pub edge: TouchEdge,
    pub timestamp_ms: u64,
    /// Time since the matching accepted press. Only set on `Released`.
    pub hold_duration_ms: Option<u64>,
}

impl TouchEvent {
    pub fn pressed(timestamp_ms: u64) -> Self {
        Self {
            edge: TouchEdge::Pressed,
            timestamp_ms,
            hold_duration_ms: None,
        }
    }

    pub fn released(timestamp_ms: u64, hold_duration_ms: u64) -> Self {
        Self {
            edge: TouchEdge::Released,
            timestamp_ms,
            hold_duration_ms: Some(hold_duration_ms),
        }
    }
}

pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Accepts a level change only after it has held steady for `window_ms`.
///
/// Any flicker inside the window restarts it. Starts in the released state.
#[derive(Debug, Clone)]
pub struct TouchInputDebouncer {
    window_ms: u64,
    stable: bool,
    last_raw: bool,
    last_change_ms: u64,
    pressed_at_ms: Option<u64>,
}

impl TouchInputDebouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            stable: false,
            last_raw: false,
            last_change_ms: 0,
            pressed_at_ms: None,
        }
    }

    /// Accepted level as of the last sample.
    pub fn is_pressed(&self) -> bool {
        self.stable
    }

    /// Feed one raw reading. Returns at most one edge.
    pub fn sample(&mut self, raw: bool, now_ms: u64) -> Option<TouchEvent> {
        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_change_ms = now_ms;
        }

        if raw == self.stable || now_ms.saturating_sub(self.last_change_ms) < self.window_ms {
            return None;
        }

        self.stable = raw;
        if raw {
            self.pressed_at_ms = Some(now_ms);
            Some(TouchEvent::pressed(now_ms))
        } else {
            let pressed_at = self.pressed_at_ms.take().unwrap_or(now_ms);
            Some(TouchEvent::released(now_ms, now_ms - pressed_at))
        }
    }
}

impl Default for TouchInputDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}
