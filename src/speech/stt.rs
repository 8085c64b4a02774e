//! Speech-to-text via the Whisper transcription endpoint

use serde::Deserialize;

use crate::config::Config;
use crate::{Error, Result};

use super::OPENAI_BASE;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Whisper transcription client
pub struct SttClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    language: String,
}

impl SttClient {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.openai_api_key.clone(),
            model: config.models.stt_model.clone(),
            language: config.language.clone(),
        }
    }

    /// Transcribe a WAV capture; the result is trimmed and may be empty
    /// for silent or unintelligible audio
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success API status
    pub async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("capture.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Stt(format!("multipart: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let response = self
            .client
            .post(format!("{OPENAI_BASE}/audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("transcription failed {status}: {body}")));
        }

        let parsed: TranscriptionResponse = response.json().await?;
        let text = parsed.text.trim().to_string();
        tracing::debug!(chars = text.len(), "transcription complete");
        Ok(text)
    }
}
