//! Face and head-pose collaborators.
//!
//! Both only do work when their output changes, so rendering every tick is
//! cheap. The concrete drivers (OLED, PWM servos) sit behind the log lines.

use tracing::{debug, info};
use whisker_core::{Presenter, SessionState};

const BLINK_INTERVAL_MS: u64 = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expression {
    Idle { eyes_open: bool },
    Listening,
    Waiting,
    Speaking,
}

pub struct FaceDisplay {
    current: Option<Expression>,
    eyes_open: bool,
    last_blink_ms: u64,
}

impl FaceDisplay {
    pub fn new() -> Self {
        Self {
            current: None,
            eyes_open: true,
            last_blink_ms: 0,
        }
    }

    pub fn expression(&self) -> Option<Expression> {
        self.current
    }

    fn expression_for(&mut self, state: SessionState, now_ms: u64) -> Expression {
        match state {
            SessionState::Idle => {
                if now_ms.saturating_sub(self.last_blink_ms) > BLINK_INTERVAL_MS {
                    self.last_blink_ms = now_ms;
                    self.eyes_open = !self.eyes_open;
                }
                Expression::Idle {
                    eyes_open: self.eyes_open,
                }
            }
            SessionState::Listening | SessionState::Stopping => Expression::Listening,
            SessionState::Waiting => Expression::Waiting,
            SessionState::Responding => Expression::Speaking,
        }
    }
}

impl Default for FaceDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for FaceDisplay {
    fn render(&mut self, state: SessionState, now_ms: u64) {
        let next = self.expression_for(state, now_ms);
        if self.current != Some(next) {
            debug!(expression = ?next, "face");
            self.current = Some(next);
        }
    }
}

/// Pitch follows the session; yaw and roll hold centre.
pub struct HeadServos {
    pitch_up_us: u16,
    pitch_neutral_us: u16,
    pitch_us: Option<u16>,
}

pub const CENTRE_US: u16 = 1500;

impl HeadServos {
    pub fn new(pitch_up_us: u16, pitch_neutral_us: u16) -> Self {
        info!(yaw_us = CENTRE_US, roll_us = CENTRE_US, "head centred");
        Self {
            pitch_up_us,
            pitch_neutral_us,
            pitch_us: None,
        }
    }

    pub fn pitch_us(&self) -> Option<u16> {
        self.pitch_us
    }
}

impl Presenter for HeadServos {
    fn render(&mut self, state: SessionState, _now_ms: u64) {
        let target = if state.is_capturing() {
            self.pitch_up_us
        } else {
            self.pitch_neutral_us
        };
        if self.pitch_us != Some(target) {
            debug!(pitch_us = target, "head pitch");
            self.pitch_us = Some(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_face_blinks_on_interval() {
        let mut face = FaceDisplay::new();
        face.render(SessionState::Idle, 0);
        assert_eq!(face.expression(), Some(Expression::Idle { eyes_open: true }));
        face.render(SessionState::Idle, 800);
        assert_eq!(face.expression(), Some(Expression::Idle { eyes_open: true }));
        face.render(SessionState::Idle, 801);
        assert_eq!(face.expression(), Some(Expression::Idle { eyes_open: false }));
        face.render(SessionState::Idle, 1_700);
        assert_eq!(face.expression(), Some(Expression::Idle { eyes_open: true }));
    }

    #[test]
    fn face_tracks_session() {
        let mut face = FaceDisplay::new();
        face.render(SessionState::Stopping, 10);
        assert_eq!(face.expression(), Some(Expression::Listening));
        face.render(SessionState::Waiting, 20);
        assert_eq!(face.expression(), Some(Expression::Waiting));
        face.render(SessionState::Responding, 30);
        assert_eq!(face.expression(), Some(Expression::Speaking));
    }

    #[test]
    fn head_tilts_up_while_capturing() {
        let mut head = HeadServos::new(1250, 1500);
        head.render(SessionState::Idle, 0);
        assert_eq!(head.pitch_us(), Some(1500));
        head.render(SessionState::Listening, 10);
        assert_eq!(head.pitch_us(), Some(1250));
        head.render(SessionState::Stopping, 20);
        assert_eq!(head.pitch_us(), Some(1250));
        head.render(SessionState::Waiting, 30);
        assert_eq!(head.pitch_us(), Some(1500));
    }
}
