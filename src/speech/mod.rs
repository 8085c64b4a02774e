//! Cloud speech collaborators
//!
//! Thin HTTP clients for the three OpenAI endpoints the daemon talks
//! to: Whisper transcription, chat completions, and speech synthesis.

pub mod chat;
pub mod stt;
pub mod tts;

pub use chat::OpenAiChat;
pub use stt::SttClient;
pub use tts::TtsClient;

const OPENAI_BASE: &str = "https://api.openai.com/v1";
