//! Text-to-speech synthesis

use crate::config::Config;
use crate::{Error, Result};

use super::OPENAI_BASE;

/// Speech synthesis client; produces WAV suitable for direct playback
pub struct TtsClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    voice: String,
    speed: f32,
}

impl TtsClient {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.openai_api_key.clone(),
            model: config.models.tts_model.clone(),
            voice: config.models.tts_voice.clone(),
            speed: config.models.tts_speed,
        }
    }

    /// Synthesize `text` into WAV bytes
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success API status
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(format!("{OPENAI_BASE}/audio/speech"))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "voice": self.voice,
                "speed": self.speed,
                "input": text,
                "response_format": "wav",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("synthesis failed {status}: {body}")));
        }

        let bytes = response.bytes().await?;
        tracing::debug!(bytes = bytes.len(), "speech synthesized");
        Ok(bytes.to_vec())
    }
}
