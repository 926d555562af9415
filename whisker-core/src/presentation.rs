//! Output side of the session: whatever shows the user what the device is
//! doing (face, head pose, LEDs).

use crate::session::SessionState;

pub trait Presenter {
    /// Called once per tick with the current state. Must not block.
    fn render(&mut self, state: SessionState, now_ms: u64);
}

#[derive(Debug, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn render(&mut self, _state: SessionState, _now_ms: u64) {}
}

/// Fan out to several presenters in order.
#[derive(Default)]
pub struct PresenterSet {
    members: Vec<Box<dyn Presenter>>,
}

impl PresenterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, presenter: impl Presenter + 'static) -> Self {
        self.members.push(Box::new(presenter));
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Presenter for PresenterSet {
    fn render(&mut self, state: SessionState, now_ms: u64) {
        for member in &mut self.members {
            member.render(state, now_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Tape(Arc<Mutex<Vec<(SessionState, u64)>>>);

    impl Presenter for Tape {
        fn render(&mut self, state: SessionState, now_ms: u64) {
            self.0.lock().push((state, now_ms));
        }
    }

    #[test]
    fn set_renders_every_member() {
        let a = Arc::new(Mutex::new(Vec::new()));
        let b = Arc::new(Mutex::new(Vec::new()));
        let mut set = PresenterSet::new()
            .with(Tape(Arc::clone(&a)))
            .with(Tape(Arc::clone(&b)));
        assert_eq!(set.len(), 2);
        set.render(SessionState::Listening, 40);
        assert_eq!(*a.lock(), vec![(SessionState::Listening, 40)]);
        assert_eq!(*b.lock(), vec![(SessionState::Listening, 40)]);
    }
}
