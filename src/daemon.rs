//! The pendant daemon
//!
//! Owns the full turn loop: wait for a trigger, capture, transcribe,
//! respond (with tool dispatch), speak. A background task polls the
//! alarm store and speaks due alarms, deferring to the microphone via
//! the shared recording flag. One cooperative running flag stops
//! everything: each loop checks it at iteration granularity, so
//! shutdown lands within one capture/playback bound.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Local;

use crate::alarm::{AlarmScheduler, AlarmStore, POLL_INTERVAL};
use crate::audio::{MicChunkSource, play_wav};
use crate::button::{GpioButton, PressSignal};
use crate::camera::Camera;
use crate::config::{AudioConfig, Config};
use crate::email::{GmailClient, Mailer};
use crate::recording::{Capture, Recorder, RecordingFlag, TriggerPolicy};
use crate::session::ConversationSession;
use crate::speech::{OpenAiChat, SttClient, TtsClient};
use crate::tools::ToolDispatcher;
use crate::{Error, Result};

/// Cadence of the idle button poll between captures
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Cooperative process-wide shutdown flag
#[derive(Debug, Clone)]
pub struct Running(Arc<AtomicBool>);

impl Running {
    /// A flag in the running state
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Whether the process should keep going
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Request shutdown; loops exit at their next check
    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for Running {
    fn default() -> Self {
        Self::new()
    }
}

/// The assembled daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if startup wiring fails (alarm store, Gmail token
    /// file); per-turn failures are logged and the loop continues
    pub async fn run(self) -> Result<()> {
        let config = self.config;
        let running = Running::new();

        {
            let running = running.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutdown requested");
                    running.stop();
                }
            });
        }

        let stt = SttClient::new(&config);
        let tts = Arc::new(TtsClient::new(&config));
        let chat = OpenAiChat::new(&config);

        let mailer: Option<Arc<dyn Mailer>> = match &config.gmail.token_path {
            Some(path) if config.gmail.enabled => {
                Some(Arc::new(GmailClient::from_token_file(path)?))
            }
            _ => {
                tracing::info!("Gmail not configured, email tools disabled");
                None
            }
        };

        let camera = Camera::new(config.camera.clone());
        let store = AlarmStore::load(config.alarms_path.clone())?;
        let mut tools = ToolDispatcher::new(mailer, Some(camera), store);

        let flag = RecordingFlag::new();
        let recorder = Arc::new(Recorder::new(
            config.audio.clone(),
            config.recording.clone(),
            flag.clone(),
        ));
        let mut session = ConversationSession::new(&config.system_prompt);

        tokio::spawn(alarm_loop(
            Arc::clone(&tts),
            config.audio.clone(),
            tools.shared_alarms(),
            flag,
            running.clone(),
        ));

        let mut button = GpioButton::open(&config.button);
        let policy = if button.is_some() {
            TriggerPolicy::HoldToTalk
        } else {
            TriggerPolicy::Auto
        };
        tracing::info!(?policy, "pendant ready");

        while running.is_running() {
            if let Some(b) = button.as_mut()
                && !b.is_pressed()
            {
                tokio::time::sleep(IDLE_POLL).await;
                continue;
            }

            let (capture, returned) =
                run_capture(Arc::clone(&recorder), &config.audio, policy, button, &running)
                    .await?;
            button = returned;

            let capture = match capture {
                Ok(Some(capture)) => capture,
                Ok(None) => continue,
                Err(e) => {
                    // Device trouble aborts this turn only
                    tracing::error!(error = %e, "capture failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };
            tracing::info!(chunks = capture.chunks, cause = ?capture.cause, "captured");

            let transcript = match stt.transcribe(capture.wav).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "transcription failed");
                    continue;
                }
            };
            if transcript.is_empty() {
                tracing::debug!("empty transcript, skipping turn");
                continue;
            }
            tracing::info!(transcript = %transcript, "heard");

            let reply = match session.respond(&transcript, &chat, &mut tools).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(error = %e, "chat turn failed");
                    continue;
                }
            };
            tracing::info!(reply = %reply, "speaking");

            if let Err(e) = speak(&tts, &reply, &config.audio, &running).await {
                tracing::error!(error = %e, "speaking the reply failed");
            }
        }

        tracing::info!("pendant stopped");
        Ok(())
    }
}

/// Capture on the blocking pool; the input stream never crosses threads
///
/// The button handle travels into the blocking task and back out so it
/// survives per-turn device failures.
async fn run_capture(
    recorder: Arc<Recorder>,
    audio: &AudioConfig,
    policy: TriggerPolicy,
    mut button: Option<GpioButton>,
    running: &Running,
) -> Result<(Result<Option<Capture>>, Option<GpioButton>)> {
    let audio = audio.clone();
    let running = running.clone();

    tokio::task::spawn_blocking(move || {
        let mut source = match MicChunkSource::open(&audio) {
            Ok(source) => source,
            Err(e) => return (Err(e), button),
        };
        let capture = recorder.capture(
            &mut source,
            policy,
            button.as_mut().map(|b| b as &mut dyn PressSignal),
            &running,
        );
        (capture, button)
    })
    .await
    .map_err(|e| Error::Audio(format!("capture task failed: {e}")))
}

/// Synthesize and play one utterance
async fn speak(tts: &TtsClient, text: &str, audio: &AudioConfig, running: &Running) -> Result<()> {
    let wav = tts.synthesize(text).await?;
    let audio = audio.clone();
    let running = running.clone();

    tokio::task::spawn_blocking(move || play_wav(&wav, &audio, &running))
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
}

/// Background alarm loop
///
/// Polls every 10 seconds; a due alarm observed while the recording
/// flag is set is skipped for that minute, never queued.
async fn alarm_loop(
    tts: Arc<TtsClient>,
    audio: AudioConfig,
    store: Arc<std::sync::Mutex<AlarmStore>>,
    flag: RecordingFlag,
    running: Running,
) {
    let mut scheduler = AlarmScheduler::new();
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    while running.is_running() {
        ticker.tick().await;

        let alarms = {
            let store = store
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            store.list().to_vec()
        };

        for alarm in scheduler.due(&alarms, Local::now().naive_local()) {
            if flag.is_recording() {
                tracing::info!(id = alarm.id, "alarm due during recording, skipped");
                continue;
            }

            tracing::info!(id = alarm.id, time = %alarm.time_string(), "alarm firing");
            let text = if alarm.message.is_empty() {
                format!("It is {}. {}", alarm.time_string(), alarm.label)
            } else {
                alarm.message.clone()
            };

            let wav = match tts.synthesize(&text).await {
                Ok(wav) => wav,
                Err(e) => {
                    tracing::warn!(id = alarm.id, error = %e, "alarm synthesis failed");
                    continue;
                }
            };

            // A capture may have started during synthesis; the flag is
            // re-read immediately before the speaker is touched
            if flag.is_recording() {
                tracing::info!(id = alarm.id, "recording started during synthesis, skipped");
                continue;
            }

            let audio = audio.clone();
            let running_play = running.clone();
            match tokio::task::spawn_blocking(move || play_wav(&wav, &audio, &running_play)).await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(id = alarm.id, error = %e, "alarm playback failed");
                }
                Err(e) => {
                    tracing::warn!(id = alarm.id, error = %e, "alarm playback task failed");
                }
            }
        }
    }
}
