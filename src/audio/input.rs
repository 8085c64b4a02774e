//! Audio capture from microphone
//!
//! Opens an input stream and exposes it as a source of fixed-size PCM
//! chunks. Device selection prefers an exact configured name, then
//! known USB device name substrings, then the host default.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::config::AudioConfig;
use crate::{Error, Result};

/// A source of fixed-size PCM chunks
///
/// `next_chunk` performs at most one short bounded wait when no full
/// chunk is buffered yet, so callers polling a button stay responsive.
pub trait ChunkSource {
    /// Take the next chunk if one is ready within `wait`
    fn next_chunk(&mut self, wait: Duration) -> Option<Vec<i16>>;

    /// Samples per chunk
    fn chunk_size(&self) -> usize;
}

/// Captures audio from the configured input device
pub struct MicChunkSource {
    _stream: Stream,
    buffer: Arc<Mutex<Vec<i16>>>,
    chunk_size: usize,
}

impl MicChunkSource {
    /// Open the input device and start capturing
    ///
    /// # Errors
    ///
    /// Returns error if no suitable device or stream config is found
    pub fn open(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = select_input_device(&host, config)?;

        let supported = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == config.channels
                    && c.min_sample_rate() <= SampleRate(config.sample_rate)
                    && c.max_sample_rate() >= SampleRate(config.sample_rate)
            })
            .ok_or_else(|| {
                Error::Audio(format!(
                    "no input config for {} Hz / {} ch",
                    config.sample_rate, config.channels
                ))
            })?;

        let sample_format = supported.sample_format();
        let stream_config: StreamConfig = supported
            .with_sample_rate(SampleRate(config.sample_rate))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate,
            channels = config.channels,
            "audio capture opened"
        );

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let err_fn = |err| tracing::error!(error = %err, "audio capture error");

        let stream = match sample_format {
            cpal::SampleFormat::I16 => {
                let buf = Arc::clone(&buffer);
                device
                    .build_input_stream(
                        &stream_config,
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            if let Ok(mut b) = buf.lock() {
                                b.extend_from_slice(data);
                            }
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e| Error::Audio(e.to_string()))?
            }
            cpal::SampleFormat::F32 => {
                let buf = Arc::clone(&buffer);
                device
                    .build_input_stream(
                        &stream_config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            if let Ok(mut b) = buf.lock() {
                                b.extend(data.iter().map(|&s| {
                                    #[allow(clippy::cast_possible_truncation)]
                                    let v = (s * 32767.0).clamp(-32768.0, 32767.0) as i16;
                                    v
                                }));
                            }
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e| Error::Audio(e.to_string()))?
            }
            other => {
                return Err(Error::Audio(format!("unsupported sample format {other}")));
            }
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            buffer,
            chunk_size: config.chunk_size,
        })
    }
}

impl ChunkSource for MicChunkSource {
    fn next_chunk(&mut self, wait: Duration) -> Option<Vec<i16>> {
        if let Some(chunk) = self.take_chunk() {
            return Some(chunk);
        }
        std::thread::sleep(wait);
        self.take_chunk()
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl MicChunkSource {
    fn take_chunk(&self) -> Option<Vec<i16>> {
        let mut buf = self.buffer.lock().ok()?;
        if buf.len() < self.chunk_size {
            return None;
        }
        Some(buf.drain(..self.chunk_size).collect())
    }
}

/// Pick the input device: exact name, then name hints, then default
fn select_input_device(host: &cpal::Host, config: &AudioConfig) -> Result<Device> {
    let devices: Vec<Device> = host
        .input_devices()
        .map_err(|e| Error::Audio(e.to_string()))?
        .collect();

    if let Some(wanted) = &config.input_device {
        return devices
            .into_iter()
            .find(|d| d.name().is_ok_and(|n| &n == wanted))
            .ok_or_else(|| Error::Audio(format!("input device not found: {wanted}")));
    }

    for hint in &config.device_name_hints {
        if let Some(device) = devices
            .iter()
            .find(|d| d.name().is_ok_and(|n| n.contains(hint)))
        {
            tracing::info!(
                device = device.name().unwrap_or_default(),
                hint,
                "input device auto-detected"
            );
            return Ok(device.clone());
        }
    }

    host.default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))
}

/// List input and output device names, for the `list-devices` command
///
/// # Errors
///
/// Returns error if device enumeration fails
pub fn list_devices() -> Result<(Vec<String>, Vec<String>)> {
    let host = cpal::default_host();

    let inputs = host
        .input_devices()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter_map(|d| d.name().ok())
        .collect();
    let outputs = host
        .output_devices()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter_map(|d| d.name().ok())
        .collect();

    Ok((inputs, outputs))
}
