//! Audio playback to speakers
//!
//! Plays one WAV buffer synchronously, then releases the output
//! device. Both the foreground turn and the alarm loop come through
//! here; the recording-exclusion flag is checked by the callers, never
//! held across playback.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::audio::wav::wav_to_samples;
use crate::config::AudioConfig;
use crate::daemon::Running;
use crate::{Error, Result};

/// Decode a WAV buffer and play it to the configured output device
///
/// Returns early (without error) if the running flag is cleared while
/// playback is in progress.
///
/// # Errors
///
/// Returns error if the bytes do not decode or no output device fits
pub fn play_wav(bytes: &[u8], config: &AudioConfig, running: &Running) -> Result<()> {
    let (samples, sample_rate, wav_channels) = wav_to_samples(bytes)?;
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = select_output_device(&host, config)?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == wav_channels
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .or_else(|| {
            // Fallback: stereo output, samples duplicated per frame
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
        })
        .ok_or_else(|| {
            Error::Audio(format!("no output config for {sample_rate} Hz"))
        })?;

    let stream_config: StreamConfig = supported.with_sample_rate(SampleRate(sample_rate)).config();
    let out_channels = stream_config.channels as usize;
    let frames = samples.len() / wav_channels as usize;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate,
        frames,
        "playback started"
    );

    let source = Arc::new(samples);
    let position = Arc::new(Mutex::new(0usize));
    let finished = Arc::new(Mutex::new(false));

    let cb_source = Arc::clone(&source);
    let cb_position = Arc::clone(&position);
    let cb_finished = Arc::clone(&finished);
    let frame_width = wav_channels as usize;

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut pos = match cb_position.lock() {
                    Ok(p) => p,
                    Err(_) => return,
                };

                for frame in data.chunks_mut(out_channels) {
                    let offset = *pos * frame_width;
                    if offset + frame_width > cb_source.len() {
                        if let Ok(mut f) = cb_finished.lock() {
                            *f = true;
                        }
                        frame.fill(0.0);
                        continue;
                    }

                    for (i, out) in frame.iter_mut().enumerate() {
                        *out = cb_source[offset + i.min(frame_width - 1)];
                    }
                    *pos += 1;
                }
            },
            |err| tracing::error!(error = %err, "audio playback error"),
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Poll for completion; bail out on shutdown or well past the
    // buffer's nominal duration
    let duration_ms = (frames as u64 * 1000) / u64::from(sample_rate);
    let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

    loop {
        if finished.lock().map(|f| *f).unwrap_or(true) {
            break;
        }
        if !running.is_running() || Instant::now() > deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    // Let the device drain the last buffer
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);

    tracing::debug!("playback complete");
    Ok(())
}

/// Pick the output device: exact name, then name hints, then default
fn select_output_device(host: &cpal::Host, config: &AudioConfig) -> Result<Device> {
    let devices: Vec<Device> = host
        .output_devices()
        .map_err(|e| Error::Audio(e.to_string()))?
        .collect();

    if let Some(wanted) = &config.output_device {
        return devices
            .into_iter()
            .find(|d| d.name().is_ok_and(|n| &n == wanted))
            .ok_or_else(|| Error::Audio(format!("output device not found: {wanted}")));
    }

    for hint in &config.device_name_hints {
        if let Some(device) = devices
            .iter()
            .find(|d| d.name().is_ok_and(|n| n.contains(hint)))
        {
            tracing::info!(
                device = device.name().unwrap_or_default(),
                hint,
                "output device auto-detected"
            );
            return Ok(device.clone());
        }
    }

    host.default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))
}
