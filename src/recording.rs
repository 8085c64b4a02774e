//! Press-to-talk and silence-gated recording
//!
//! Converts a press/hold signal (or a silence detector) plus a PCM
//! chunk stream into one bounded capture: `Idle -> Capturing ->
//! Finalizing -> Idle`. While a capture is in flight the shared
//! recording flag is held so the alarm loop never talks over the
//! microphone.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::audio::input::ChunkSource;
use crate::audio::wav::samples_to_wav;
use crate::button::PressSignal;
use crate::config::{AudioConfig, RecordingConfig};
use crate::daemon::Running;
use crate::Result;

/// Captures shorter than this many chunks are discarded
const MIN_CHUNKS: usize = 5;

/// Bounded wait per chunk poll in hold mode; short so button release
/// is detected with sub-chunk latency
const HOLD_CHUNK_WAIT: Duration = Duration::from_millis(5);

/// Bounded wait per chunk poll in auto mode
const AUTO_CHUNK_WAIT: Duration = Duration::from_millis(10);

/// How a capture was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPolicy {
    /// Capture while an external button-pressed signal is true
    HoldToTalk,
    /// Capture unconditionally, stop on trailing silence
    Auto,
}

/// Why a capture stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// Hold mode: the button was released
    ButtonReleased,
    /// Hold mode: the wall-clock safety bound expired (stuck signal)
    Timeout,
    /// The configured maximum duration was reached
    MaxDuration,
    /// Auto mode: trailing silence after observed speech
    SilenceDetected,
    /// The process-wide running flag was cleared
    Shutdown,
}

/// One finished capture
#[derive(Debug)]
pub struct Capture {
    /// Encoded WAV buffer, chunks concatenated in capture order
    pub wav: Vec<u8>,
    /// Why the capture stopped
    pub cause: StopCause,
    /// Number of chunks captured
    pub chunks: usize,
}

/// Shared "recording in progress" flag
///
/// Written by the recorder around each capture; read by the alarm loop
/// under the same mutex immediately before producing audio output.
#[derive(Clone, Default)]
pub struct RecordingFlag(Arc<Mutex<bool>>);

impl RecordingFlag {
    /// Create a cleared flag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a capture is currently in progress
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.0.lock().map(|f| *f).unwrap_or(false)
    }

    /// Set the flag for the lifetime of the returned guard
    #[must_use]
    pub fn begin(&self) -> RecordingGuard {
        if let Ok(mut f) = self.0.lock() {
            *f = true;
        }
        RecordingGuard(Arc::clone(&self.0))
    }
}

/// RAII guard clearing the recording flag on drop
pub struct RecordingGuard(Arc<Mutex<bool>>);

impl Drop for RecordingGuard {
    fn drop(&mut self) {
        if let Ok(mut f) = self.0.lock() {
            *f = false;
        }
    }
}

/// The recording state machine
pub struct Recorder {
    audio: AudioConfig,
    config: RecordingConfig,
    flag: RecordingFlag,
}

impl Recorder {
    /// Create a recorder sharing the given exclusion flag
    #[must_use]
    pub fn new(audio: AudioConfig, config: RecordingConfig, flag: RecordingFlag) -> Self {
        Self {
            audio,
            config,
            flag,
        }
    }

    /// Run one capture against a chunk source
    ///
    /// Returns `None` when the capture is too short (hold mode, fewer
    /// than 5 chunks) or never observed sound (auto mode). The shared
    /// recording flag is held for the full duration of the capture.
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding of the captured chunks fails
    pub fn capture<S: ChunkSource>(
        &self,
        source: &mut S,
        policy: TriggerPolicy,
        button: Option<&mut dyn PressSignal>,
        running: &Running,
    ) -> Result<Option<Capture>> {
        let guard = self.flag.begin();

        let outcome = match policy {
            TriggerPolicy::HoldToTalk => self.capture_hold(source, button, running),
            TriggerPolicy::Auto => self.capture_auto(source, running),
        };

        // Finalizing: flag cleared before the buffer leaves the machine
        drop(guard);

        let Some((chunks, cause)) = outcome else {
            return Ok(None);
        };

        tracing::debug!(chunks = chunks.len() / source.chunk_size(), ?cause, "capture finished");

        let wav = samples_to_wav(&chunks, self.audio.sample_rate, self.audio.channels)?;
        Ok(Some(Capture {
            wav,
            cause,
            chunks: chunks.len() / source.chunk_size(),
        }))
    }

    /// Hold-to-talk: capture while the button stays pressed
    fn capture_hold<S: ChunkSource>(
        &self,
        source: &mut S,
        mut button: Option<&mut dyn PressSignal>,
        running: &Running,
    ) -> Option<(Vec<i16>, StopCause)> {
        let chunk_size = source.chunk_size();
        let max_chunks = self.chunks_for_secs(self.config.max_record_secs as f32, chunk_size);
        let deadline = Instant::now() + Duration::from_secs(self.config.hold_timeout_secs);

        let mut samples: Vec<i16> = Vec::new();
        let cause = loop {
            if !running.is_running() {
                break StopCause::Shutdown;
            }
            if Instant::now() > deadline {
                tracing::warn!("hold capture hit wall-clock safety bound");
                break StopCause::Timeout;
            }
            // Button state checked before every chunk read
            if let Some(b) = button.as_deref_mut()
                && !b.is_pressed()
            {
                break StopCause::ButtonReleased;
            }
            if samples.len() / chunk_size >= max_chunks {
                break StopCause::MaxDuration;
            }

            if let Some(chunk) = source.next_chunk(HOLD_CHUNK_WAIT) {
                samples.extend_from_slice(&chunk);
            }
        };

        if samples.len() / chunk_size < MIN_CHUNKS {
            tracing::debug!(?cause, "capture too short, discarded");
            return None;
        }

        Some((samples, cause))
    }

    /// Auto: capture until trailing silence after observed speech
    fn capture_auto<S: ChunkSource>(
        &self,
        source: &mut S,
        running: &Running,
    ) -> Option<(Vec<i16>, StopCause)> {
        let chunk_size = source.chunk_size();
        let max_chunks = self.chunks_for_secs(self.config.auto_max_secs as f32, chunk_size);
        let silence_chunks = self.chunks_for_secs(self.config.silence_secs, chunk_size);

        let mut samples: Vec<i16> = Vec::new();
        let mut has_sound = false;
        let mut silent_chunks = 0usize;

        let cause = loop {
            if !running.is_running() {
                break StopCause::Shutdown;
            }
            if samples.len() / chunk_size >= max_chunks {
                break StopCause::MaxDuration;
            }

            let Some(chunk) = source.next_chunk(AUTO_CHUNK_WAIT) else {
                continue;
            };

            let volume = mean_amplitude(&chunk);
            samples.extend_from_slice(&chunk);

            if volume > self.config.silence_threshold {
                has_sound = true;
                silent_chunks = 0;
            } else {
                silent_chunks += 1;
            }

            if has_sound && silent_chunks > silence_chunks {
                break StopCause::SilenceDetected;
            }
        };

        if !has_sound {
            tracing::debug!("no speech observed, capture discarded");
            return None;
        }

        Some((samples, cause))
    }

    fn chunks_for_secs(&self, secs: f32, chunk_size: usize) -> usize {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let chunks = (self.audio.sample_rate as f32 / chunk_size as f32 * secs) as usize;
        chunks
    }
}

/// Mean absolute amplitude of a chunk (i16 scale)
fn mean_amplitude(chunk: &[i16]) -> f32 {
    if chunk.is_empty() {
        return 0.0;
    }
    let sum: f32 = chunk.iter().map(|&s| f32::from(s).abs()).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = sum / chunk.len() as f32;
    mean
}
