//! TOML configuration file loading
//!
//! Supports `~/.config/pendant/config.toml` as a persistent config
//! source. All fields are optional — the file is a partial overlay on
//! top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct PendantConfigFile {
    /// OpenAI API key (the `OPENAI_API_KEY` env var takes precedence)
    pub openai_api_key: Option<String>,

    /// Language hint for transcription (e.g. "en", "ja")
    pub language: Option<String>,

    /// System prompt override
    pub system_prompt: Option<String>,

    /// Alarm store path override
    pub alarms_path: Option<PathBuf>,

    /// Model identifiers
    #[serde(default)]
    pub models: ModelsFileConfig,

    /// Audio stream parameters
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Recording state machine parameters
    #[serde(default)]
    pub recording: RecordingFileConfig,

    /// Press-to-talk button
    #[serde(default)]
    pub button: ButtonFileConfig,

    /// Gmail client
    #[serde(default)]
    pub gmail: GmailFileConfig,

    /// Camera capture
    #[serde(default)]
    pub camera: CameraFileConfig,
}

/// Model identifier configuration
#[derive(Debug, Default, Deserialize)]
pub struct ModelsFileConfig {
    pub stt_model: Option<String>,
    pub chat_model: Option<String>,
    pub tts_model: Option<String>,
    pub tts_voice: Option<String>,
    pub tts_speed: Option<f32>,
}

/// Audio stream configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub chunk_size: Option<usize>,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub device_name_hints: Option<Vec<String>>,
}

/// Recording parameters
#[derive(Debug, Default, Deserialize)]
pub struct RecordingFileConfig {
    pub max_record_secs: Option<u64>,
    pub hold_timeout_secs: Option<u64>,
    pub silence_threshold: Option<f32>,
    pub auto_max_secs: Option<u64>,
    pub silence_secs: Option<f32>,
}

/// Button configuration
#[derive(Debug, Default, Deserialize)]
pub struct ButtonFileConfig {
    pub enabled: Option<bool>,
    pub gpio: Option<u32>,
    pub active_low: Option<bool>,
    pub debounce_ms: Option<u64>,
}

/// Gmail configuration
#[derive(Debug, Default, Deserialize)]
pub struct GmailFileConfig {
    pub enabled: Option<bool>,
    pub token_path: Option<PathBuf>,
}

/// Camera configuration
#[derive(Debug, Default, Deserialize)]
pub struct CameraFileConfig {
    pub commands: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

impl PendantConfigFile {
    /// Read and parse a config file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid TOML
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_valid() {
        let file: PendantConfigFile = toml::from_str("").unwrap();
        assert!(file.openai_api_key.is_none());
        assert!(file.models.chat_model.is_none());
    }

    #[test]
    fn partial_overlay_parses() {
        let file: PendantConfigFile = toml::from_str(
            r#"
            language = "ja"

            [models]
            chat_model = "gpt-4o"
            tts_speed = 1.0

            [recording]
            silence_threshold = 350.0

            [button]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(file.language.as_deref(), Some("ja"));
        assert_eq!(file.models.chat_model.as_deref(), Some("gpt-4o"));
        assert_eq!(file.recording.silence_threshold, Some(350.0));
        assert_eq!(file.button.enabled, Some(false));
        assert!(file.audio.sample_rate.is_none());
    }
}
