//! Configuration management for the pendant daemon
//!
//! Everything is resolved once at startup and immutable afterwards:
//! built-in defaults, overlaid by an optional TOML file, overlaid by
//! environment variables.

pub mod file;

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::{Error, Result};
use file::PendantConfigFile;

/// Default system prompt advertising the tool protocol
const SYSTEM_PROMPT: &str = "\
You are a helpful voice assistant worn as a pendant. Answer briefly: \
your replies are read aloud, so keep them to one or two short sentences.

You can operate tools. To use one, reply with a single JSON object of \
the form {\"tool\": \"<name>\", \"params\": {...}} and nothing that \
depends on its outcome. Available tools:

1. gmail_list - list messages. params: query (e.g. \"is:unread\"), max_results
2. gmail_read - read a message body. params: message_id (an id or a 1-based index into the last list)
3. gmail_send - send a new message. params: to, subject, body
4. gmail_reply - reply to a message. params: message_id, body
5. alarm_set - create an alarm. params: time (\"HH:MM\"), label, message
6. alarm_list - list alarms. params: none
7. alarm_delete - delete an alarm. params: id
8. camera_describe - take a photo and describe what is in front of the user. params: none
9. camera_send - take a photo and email it. params: to (optional), subject (optional)

For anything else, answer directly in plain text.";

/// Pendant daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenAI API key (STT, chat, TTS)
    pub openai_api_key: String,

    /// Language hint passed to transcription (ISO 639-1)
    pub language: String,

    /// System prompt for the chat model
    pub system_prompt: String,

    /// Model identifiers and voice parameters
    pub models: ModelConfig,

    /// Audio device and stream parameters
    pub audio: AudioConfig,

    /// Recording state machine parameters
    pub recording: RecordingConfig,

    /// Press-to-talk button
    pub button: ButtonConfig,

    /// Gmail client
    pub gmail: GmailConfig,

    /// Camera capture
    pub camera: CameraConfig,

    /// Path to the alarm store file
    pub alarms_path: PathBuf,
}

/// Model identifiers for the cloud collaborators
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// Chat model (e.g. "gpt-4o-mini")
    pub chat_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            stt_model: "whisper-1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "nova".to_string(),
            tts_speed: 1.2,
        }
    }
}

/// Audio stream parameters
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Capture channel count
    pub channels: u16,

    /// Samples per chunk
    pub chunk_size: usize,

    /// Exact input device name, or None to auto-detect
    pub input_device: Option<String>,

    /// Exact output device name, or None to auto-detect
    pub output_device: Option<String>,

    /// Device name substrings tried during auto-detection
    pub device_name_hints: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            chunk_size: 1024,
            input_device: None,
            output_device: None,
            device_name_hints: vec![
                "USB PnP Sound".to_string(),
                "USB Audio".to_string(),
                "USB PnP Audio".to_string(),
            ],
        }
    }
}

/// Recording state machine parameters
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Maximum hold-to-talk capture duration in seconds
    pub max_record_secs: u64,

    /// Absolute wall-clock safety bound on a hold-to-talk capture,
    /// guarding against a stuck button signal
    pub hold_timeout_secs: u64,

    /// Mean absolute amplitude above which a chunk counts as speech
    /// (i16 sample scale)
    pub silence_threshold: f32,

    /// Maximum auto-mode capture duration in seconds
    pub auto_max_secs: u64,

    /// Silence duration that ends an auto-mode capture, in seconds
    pub silence_secs: f32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_record_secs: 30,
            hold_timeout_secs: 45,
            silence_threshold: 500.0,
            auto_max_secs: 5,
            silence_secs: 1.5,
        }
    }
}

/// Press-to-talk button configuration
#[derive(Debug, Clone)]
pub struct ButtonConfig {
    /// Use the button when available
    pub enabled: bool,

    /// GPIO line number (sysfs)
    pub gpio: u32,

    /// Treat a low level as pressed (pull-up wiring)
    pub active_low: bool,

    /// Debounce interval in milliseconds
    pub debounce_ms: u64,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gpio: 5,
            active_low: true,
            debounce_ms: 100,
        }
    }
}

/// Gmail client configuration
#[derive(Debug, Clone, Default)]
pub struct GmailConfig {
    /// Enable Gmail tools
    pub enabled: bool,

    /// Path to the OAuth2 authorized-user token file
    pub token_path: Option<PathBuf>,
}

/// Camera capture configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Still-capture commands tried in order
    pub commands: Vec<String>,

    /// Capture timeout in seconds
    pub timeout_secs: u64,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            commands: vec!["rpicam-still".to_string(), "libcamera-still".to_string()],
            timeout_secs: 10,
            width: 1280,
            height: 720,
        }
    }
}

impl Config {
    /// Load configuration from defaults, the TOML overlay, and the environment
    ///
    /// # Errors
    ///
    /// Returns error if the config file is malformed or the OpenAI API
    /// key is missing
    pub fn load(config_path: Option<&std::path::Path>) -> Result<Self> {
        let dirs = ProjectDirs::from("dev", "pendant", "pendant");

        let file = match config_path {
            Some(path) => PendantConfigFile::read(path)?,
            None => dirs
                .as_ref()
                .map(|d| d.config_dir().join("config.toml"))
                .filter(|p| p.exists())
                .map(|p| PendantConfigFile::read(&p))
                .transpose()?
                .unwrap_or_default(),
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .or(file.openai_api_key)
            .ok_or_else(|| {
                Error::Config("OPENAI_API_KEY not set and no openai_api_key in config".to_string())
            })?;

        let data_dir = dirs
            .as_ref()
            .map_or_else(|| PathBuf::from("."), |d| d.data_dir().to_path_buf());

        let mut models = ModelConfig::default();
        if let Some(m) = file.models.stt_model {
            models.stt_model = m;
        }
        if let Some(m) = file.models.chat_model {
            models.chat_model = m;
        }
        if let Some(m) = file.models.tts_model {
            models.tts_model = m;
        }
        if let Some(v) = file.models.tts_voice {
            models.tts_voice = v;
        }
        if let Some(s) = file.models.tts_speed {
            models.tts_speed = s;
        }

        let mut audio = AudioConfig::default();
        if let Some(r) = file.audio.sample_rate {
            audio.sample_rate = r;
        }
        if let Some(c) = file.audio.channels {
            audio.channels = c;
        }
        if let Some(c) = file.audio.chunk_size {
            audio.chunk_size = c;
        }
        audio.input_device = file.audio.input_device;
        audio.output_device = file.audio.output_device;
        if let Some(hints) = file.audio.device_name_hints {
            audio.device_name_hints = hints;
        }

        let mut recording = RecordingConfig::default();
        if let Some(s) = file.recording.max_record_secs {
            recording.max_record_secs = s;
        }
        if let Some(s) = file.recording.hold_timeout_secs {
            recording.hold_timeout_secs = s;
        }
        if let Some(t) = file.recording.silence_threshold {
            recording.silence_threshold = t;
        }
        if let Some(s) = file.recording.auto_max_secs {
            recording.auto_max_secs = s;
        }
        if let Some(s) = file.recording.silence_secs {
            recording.silence_secs = s;
        }

        let mut button = ButtonConfig::default();
        if let Some(e) = file.button.enabled {
            button.enabled = e;
        }
        if let Some(g) = file.button.gpio {
            button.gpio = g;
        }
        if let Some(a) = file.button.active_low {
            button.active_low = a;
        }
        if let Some(d) = file.button.debounce_ms {
            button.debounce_ms = d;
        }

        let token_path = std::env::var("PENDANT_GMAIL_TOKEN")
            .ok()
            .map(PathBuf::from)
            .or(file.gmail.token_path);
        let gmail = GmailConfig {
            enabled: file.gmail.enabled.unwrap_or(true) && token_path.is_some(),
            token_path,
        };

        let mut camera = CameraConfig::default();
        if let Some(cmds) = file.camera.commands {
            camera.commands = cmds;
        }
        if let Some(t) = file.camera.timeout_secs {
            camera.timeout_secs = t;
        }

        let alarms_path = file
            .alarms_path
            .unwrap_or_else(|| data_dir.join("alarms.json"));

        Ok(Self {
            openai_api_key,
            language: file.language.unwrap_or_else(|| "en".to_string()),
            system_prompt: file
                .system_prompt
                .unwrap_or_else(|| SYSTEM_PROMPT.to_string()),
            models,
            audio,
            recording,
            button,
            gmail,
            camera,
            alarms_path,
        })
    }
}
