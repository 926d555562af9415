//! Persistent device settings (JSON file in the data directory).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use whisker_core::{BatchFraming, CaptureMode, EngineConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct DeviceSettings {
    /// `"stream"` or `"batch"`.
    pub mode: String,
    pub backend_host: String,
    pub stream_port: u16,
    pub stream_path: String,
    pub upload_port: u16,
    pub upload_path: String,
    /// `"wav"` or `"raw"`.
    pub batch_framing: String,
    pub capture_sample_rate: u32,
    pub playback_sample_rate: u32,
    pub buffer_capacity: usize,
    pub silence_threshold: u16,
    pub preferred_input_device: Option<String>,
    pub preferred_output_device: Option<String>,
    /// Sysfs-style value file for the touch pad. `None` disables touch.
    pub touch_value_path: Option<String>,
    /// Level that reads as "touched".
    pub touch_active_high: bool,
    pub servo_pitch_up_us: u16,
    pub servo_pitch_neutral_us: u16,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            mode: "stream".into(),
            backend_host: "192.168.1.106".into(),
            stream_port: 3001,
            stream_path: "/".into(),
            upload_port: 3000,
            upload_path: "/upload-audio".into(),
            batch_framing: "wav".into(),
            capture_sample_rate: 16_000,
            playback_sample_rate: 24_000,
            buffer_capacity: 50_000,
            silence_threshold: 60,
            preferred_input_device: None,
            preferred_output_device: None,
            touch_value_path: Some("/sys/class/gpio/gpio23/value".into()),
            touch_active_high: true,
            servo_pitch_up_us: 1250,
            servo_pitch_neutral_us: 1500,
        }
    }
}

impl DeviceSettings {
    pub fn normalize(&mut self) {
        let defaults = Self::default();
        self.mode = normalize_mode(&self.mode);
        self.batch_framing = normalize_framing(&self.batch_framing);
        self.backend_host = self.backend_host.trim().to_string();
        if self.backend_host.is_empty() {
            self.backend_host = defaults.backend_host;
        }
        self.stream_path = normalize_path(&self.stream_path);
        self.upload_path = normalize_path(&self.upload_path);
        if self.stream_port == 0 {
            self.stream_port = defaults.stream_port;
        }
        if self.upload_port == 0 {
            self.upload_port = defaults.upload_port;
        }
        self.capture_sample_rate = self.capture_sample_rate.clamp(8_000, 48_000);
        self.playback_sample_rate = self.playback_sample_rate.clamp(8_000, 48_000);
        self.buffer_capacity = self.buffer_capacity.clamp(4_096, 4 * 1024 * 1024);
        self.silence_threshold = self.silence_threshold.clamp(1, 10_000);
        self.servo_pitch_up_us = self.servo_pitch_up_us.clamp(500, 2_500);
        self.servo_pitch_neutral_us = self.servo_pitch_neutral_us.clamp(500, 2_500);
        self.preferred_input_device = trimmed(self.preferred_input_device.take());
        self.preferred_output_device = trimmed(self.preferred_output_device.take());
        self.touch_value_path = trimmed(self.touch_value_path.take());
    }

    pub fn capture_mode(&self) -> CaptureMode {
        match self.mode.as_str() {
            "batch" => CaptureMode::Batch,
            _ => CaptureMode::Stream,
        }
    }

    pub fn framing(&self) -> BatchFraming {
        match self.batch_framing.as_str() {
            "raw" => BatchFraming::RawPcm,
            _ => BatchFraming::Wav,
        }
    }

    pub fn upload_url(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.backend_host, self.upload_port, self.upload_path
        )
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            mode: self.capture_mode(),
            capture_sample_rate: self.capture_sample_rate,
            playback_sample_rate: self.playback_sample_rate,
            buffer_capacity: self.buffer_capacity,
            batch_framing: self.framing(),
            silence_threshold: self.silence_threshold,
            upload_url: self.upload_url(),
            stream_host: self.backend_host.clone(),
            stream_port: self.stream_port,
            stream_path: self.stream_path.clone(),
            input_device: self.preferred_input_device.clone(),
            output_device: self.preferred_output_device.clone(),
            ..EngineConfig::default()
        }
    }
}

pub fn normalize_mode(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "batch" | "http" | "upload" => "batch".into(),
        _ => "stream".into(),
    }
}

pub fn normalize_framing(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "raw" | "pcm" | "rawpcm" | "raw_pcm" => "raw".into(),
        _ => "wav".into(),
    }
}

fn normalize_path(raw: &str) -> String {
    let path = raw.trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `WHISKER_MODE` and `WHISKER_BACKEND_HOST` win over the file.
pub fn apply_env_overrides(settings: &mut DeviceSettings) {
    if let Ok(mode) = std::env::var("WHISKER_MODE") {
        settings.mode = normalize_mode(&mode);
    }
    if let Ok(host) = std::env::var("WHISKER_BACKEND_HOST") {
        let host = host.trim();
        if !host.is_empty() {
            settings.backend_host = host.to_string();
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    if let Some(path) = std::env::var_os("WHISKER_SETTINGS") {
        return PathBuf::from(path);
    }
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local")
                .join("share")
        })
        .join("whisker")
        .join("settings.json")
}

pub fn load_settings(path: &Path) -> DeviceSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<DeviceSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &DeviceSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
