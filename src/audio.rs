//! Microphone capture feeding block levels to the session loop

use crate::constants::audio::{DEFAULT_CHANNELS, PREFERRED_SAMPLE_RATE};
use crate::error::{AppError, AppResult};
use crate::state::{lock, BlockAccumulator};
use cpal::traits::{DeviceTrait, HostTrait};
use log::{error, info};
use std::sync::{Arc, Mutex};

/// Audio configuration and device information
pub struct AudioConfig {
    pub device_name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Names of every input device on the default host
pub fn input_device_names() -> AppResult<Vec<String>> {
    let host = cpal::default_host();
    Ok(host.input_devices()?.filter_map(|d| d.name().ok()).collect())
}

/// Find and configure an audio input device
pub fn setup_audio_device(device_name: Option<String>) -> AppResult<(cpal::Device, AudioConfig)> {
    let host = cpal::default_host();

    let device = if let Some(name) = device_name {
        host.input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AppError::AudioDevice(format!("Device '{}' not found", name)))?
    } else {
        host.default_input_device()
            .ok_or_else(|| AppError::AudioDevice("No default input device available".to_string()))?
    };

    let device_name = device.name()?;

    let mut supported_configs = device.supported_input_configs()?;
    let config_range = supported_configs
        .next()
        .ok_or_else(|| AppError::AudioDevice("No supported input configs found".to_string()))?;

    let sample_rate = if config_range.min_sample_rate().0 <= PREFERRED_SAMPLE_RATE
        && config_range.max_sample_rate().0 >= PREFERRED_SAMPLE_RATE
    {
        PREFERRED_SAMPLE_RATE
    } else {
        config_range.min_sample_rate().0
    };

    let channels = config_range.channels().min(DEFAULT_CHANNELS).max(1);

    info!("Capturing from {} at {} Hz, {} channel(s)", device_name, sample_rate, channels);

    let audio_config = AudioConfig {
        device_name,
        sample_rate,
        channels,
    };

    Ok((device, audio_config))
}

/// Build an audio input stream with the given callback
pub fn build_audio_stream<F>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    data_callback: F,
) -> AppResult<cpal::Stream>
where
    F: FnMut(&[f32], &cpal::InputCallbackInfo) + Send + 'static,
{
    let stream = device.build_input_stream(
        config,
        data_callback,
        |err| error!("Audio stream error: {}", err),
        None,
    )?;

    Ok(stream)
}

/// Audio callback that folds every buffer into the current capture block
pub fn create_audio_callback(
    capture: Arc<Mutex<BlockAccumulator>>,
) -> impl FnMut(&[f32], &cpal::InputCallbackInfo) + Send + 'static {
    move |data: &[f32], _: &cpal::InputCallbackInfo| {
        lock(&capture).push(data);
    }
}
