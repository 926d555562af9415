//! Audio device enumeration and selection.

use serde::{Deserialize, Serialize};

/// Metadata about an audio device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Name reported by the host audio API.
    pub name: String,
    /// Whether this is the host's default device for its direction.
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Pick a device by preferred name, otherwise the default device, otherwise
/// the first one listed.
#[cfg(feature = "audio-cpal")]
pub fn select_device(
    direction: Direction,
    preferred_name: Option<&str>,
) -> crate::error::Result<cpal::Device> {
    use crate::error::WhiskerError;
    use cpal::traits::{DeviceTrait, HostTrait};
    use tracing::warn;

    let host = cpal::default_host();

    let listed = || -> std::result::Result<Vec<cpal::Device>, cpal::DevicesError> {
        Ok(match direction {
            Direction::Input => host.input_devices()?.collect(),
            Direction::Output => host.output_devices()?.collect(),
        })
    };

    if let Some(preferred) = preferred_name {
        match listed() {
            Ok(devices) => {
                if let Some(device) = devices
                    .into_iter()
                    .find(|d| d.name().map(|n| n == preferred).unwrap_or(false))
                {
                    return Ok(device);
                }
                warn!(?direction, "preferred device '{preferred}' not found, falling back");
            }
            Err(e) => warn!(?direction, "failed to list devices: {e}"),
        }
    }

    let default = match direction {
        Direction::Input => host.default_input_device(),
        Direction::Output => host.default_output_device(),
    };
    if let Some(device) = default {
        return Ok(device);
    }

    let devices = listed().map_err(|e| WhiskerError::AudioDevice(e.to_string()))?;
    let fallback = devices.into_iter().next().ok_or(match direction {
        Direction::Input => WhiskerError::NoDefaultInputDevice,
        Direction::Output => WhiskerError::NoDefaultOutputDevice,
    })?;
    warn!(?direction, "no default device, using first available");
    Ok(fallback)
}

/// List devices for `direction`. Empty if enumeration fails.
#[cfg(feature = "audio-cpal")]
pub fn list_devices(direction: Direction) -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let (default_name, devices) = match direction {
        Direction::Input => (
            host.default_input_device().and_then(|d| d.name().ok()),
            host.input_devices().map(|d| d.collect::<Vec<_>>()),
        ),
        Direction::Output => (
            host.default_output_device().and_then(|d| d.name().ok()),
            host.output_devices().map(|d| d.collect::<Vec<_>>()),
        ),
    };

    match devices {
        Ok(devices) => {
            let mut list: Vec<DeviceInfo> = devices
                .into_iter()
                .enumerate()
                .map(|(idx, device)| {
                    let name = device
                        .name()
                        .unwrap_or_else(|_| format!("Device {}", idx + 1));
                    let is_default = default_name.as_deref() == Some(name.as_str());
                    DeviceInfo { name, is_default }
                })
                .collect();
            sort_default_first(&mut list);
            list
        }
        Err(e) => {
            tracing::warn!(?direction, "failed to enumerate devices: {e}");
            Vec::new()
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_devices(_direction: Direction) -> Vec<DeviceInfo> {
    Vec::new()
}

fn sort_default_first(list: &mut [DeviceInfo]) {
    list.sort_by_key(|d| (!d.is_default, d.name.to_ascii_lowercase()));
}
