use thiserror::Error;

/// All errors produced by whisker-core.
#[derive(Debug, Error)]
pub enum WhiskerError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("no default output device found")]
    NoDefaultOutputDevice,

    #[error("failed to allocate {capacity}-byte recording buffer")]
    BufferAllocation { capacity: usize },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transport not connected")]
    NotConnected,

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("upload error: {0}")]
    Upload(#[from] reqwest::Error),

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WhiskerError>;
