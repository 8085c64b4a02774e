//! Error types for the pendant daemon

use thiserror::Error;

/// Result type alias for pendant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the pendant daemon
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or stream error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Chat completion error
    #[error("chat error: {0}")]
    Chat(String),

    /// Email transport error
    #[error("email error: {0}")]
    Email(String),

    /// Camera capture error
    #[error("camera error: {0}")]
    Camera(String),

    /// Alarm validation or persistence error
    #[error("alarm error: {0}")]
    Alarm(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
