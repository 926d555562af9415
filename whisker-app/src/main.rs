//! Whisker device host entry point.
//!
//! Loads settings, opens the microphone, speaker and touch pad on the engine
//! thread, and runs until Ctrl-C.

mod gpio;
mod presentation;
mod settings;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use whisker_core::{
    audio::{
        device::{list_devices, Direction},
        AudioOutput, NullOutput,
    },
    build_pipeline, CpalMicrophone, CpalSpeaker, EngineConfig, Peripherals, PresenterSet,
    TouchInput, WhiskerEngine,
};

use gpio::{FileLevelInput, NoTouch};
use presentation::{FaceDisplay, HeadServos};
use settings::{apply_env_overrides, default_settings_path, load_settings, save_settings};

/// Host-side options the engine config does not carry.
#[derive(Debug, Clone)]
struct HostOptions {
    touch_value_path: Option<String>,
    touch_active_high: bool,
    pitch_up_us: u16,
    pitch_neutral_us: u16,
}

fn open_peripherals(
    config: &EngineConfig,
    host: HostOptions,
) -> whisker_core::Result<Peripherals> {
    let input = CpalMicrophone::open(config.input_device.as_deref(), config.capture_sample_rate)?;

    let output: Box<dyn AudioOutput> =
        match CpalSpeaker::open(config.output_device.as_deref(), config.playback_sample_rate) {
            Ok(speaker) => Box::new(speaker),
            Err(e) => {
                warn!(error = %e, "no playback device; reply audio will be discarded");
                Box::new(NullOutput)
            }
        };

    let touch: Box<dyn TouchInput> = match host.touch_value_path {
        Some(path) => {
            info!(path = path.as_str(), "touch input from value file");
            Box::new(FileLevelInput::new(path, host.touch_active_high))
        }
        None => {
            warn!("no touch input configured; sessions cannot start");
            Box::new(NoTouch)
        }
    };

    let presenter = PresenterSet::new()
        .with(FaceDisplay::new())
        .with(HeadServos::new(host.pitch_up_us, host.pitch_neutral_us));

    Ok(Peripherals {
        input: Box::new(input),
        output,
        touch,
        presenter: Box::new(presenter),
        pipeline: build_pipeline(config)?,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("whisker=info")),
        )
        .init();

    // ── Settings ──────────────────────────────────────────────────────────
    let settings_path = default_settings_path();
    let mut settings = load_settings(&settings_path);
    if !settings_path.exists() {
        match save_settings(&settings_path, &settings) {
            Ok(()) => info!(path = %settings_path.display(), "wrote default settings"),
            Err(e) => warn!(path = %settings_path.display(), error = %e, "could not write settings"),
        }
    }
    apply_env_overrides(&mut settings);
    info!(
        mode = settings.mode.as_str(),
        backend = settings.backend_host.as_str(),
        "whisker starting"
    );

    for device in list_devices(Direction::Input) {
        debug!(name = device.name.as_str(), default = device.is_default, "input device");
    }

    let host = HostOptions {
        touch_value_path: settings.touch_value_path.clone(),
        touch_active_high: settings.touch_active_high,
        pitch_up_us: settings.servo_pitch_up_us,
        pitch_neutral_us: settings.servo_pitch_neutral_us,
    };

    // ── Engine ────────────────────────────────────────────────────────────
    let engine = WhiskerEngine::new(settings.to_engine_config());
    engine.start(move |config| open_peripherals(config, host))?;

    let mut uploads = engine.subscribe_uploads();
    tokio::spawn(async move {
        loop {
            match uploads.recv().await {
                Ok(event) => info!(
                    status = ?event.status,
                    bytes = event.bytes,
                    reply = event.body.as_deref().unwrap_or(""),
                    "upload finished"
                ),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "upload events lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    if let Err(e) = engine.stop() {
        warn!(error = %e, "engine already stopped");
    }
    engine.join().await;

    info!(diagnostics = ?engine.diagnostics_snapshot(), "whisker stopped");
    Ok(())
}
