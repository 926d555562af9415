//! Touch pad read through a sysfs-style GPIO value file.

use std::fs;
use std::path::PathBuf;

use tracing::warn;
use whisker_core::TouchInput;

/// Reads `0`/`1` from a value file once per tick.
///
/// A missing or unreadable file reads as "not touched" and is reported once
/// per failure stretch.
pub struct FileLevelInput {
    path: PathBuf,
    active_high: bool,
    failing: bool,
}

impl FileLevelInput {
    pub fn new(path: impl Into<PathBuf>, active_high: bool) -> Self {
        Self {
            path: path.into(),
            active_high,
            failing: false,
        }
    }
}

impl TouchInput for FileLevelInput {
    fn read_level(&mut self) -> bool {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                self.failing = false;
                let high = raw.trim_start().starts_with('1');
                high == self.active_high
            }
            Err(e) => {
                if !self.failing {
                    warn!(path = %self.path.display(), error = %e, "touch input unreadable");
                    self.failing = true;
                }
                false
            }
        }
    }
}

/// Touch source for hosts without a pad.
pub struct NoTouch;

impl TouchInput for NoTouch {
    fn read_level(&mut self) -> bool {
        false
    }
}
