//! Chat completions client
//!
//! Implements [`ChatApi`] against the OpenAI chat endpoint, including
//! the vision path used by the camera tools (images travel inline as
//! base64 data URLs).

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::Config;
use crate::session::{ChatApi, Turn};
use crate::{Error, Result};

use super::OPENAI_BASE;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI chat completions implementation of [`ChatApi`]
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.openai_api_key.clone(),
            model: config.models.chat_model.clone(),
        }
    }

    async fn request(&self, messages: Vec<Value>, max_tokens: u32) -> Result<String> {
        let response = self
            .client
            .post(format!("{OPENAI_BASE}/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "max_tokens": max_tokens,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Chat(format!("completion failed {status}: {body}")));
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Chat("completion returned no content".to_string()))?;

        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl ChatApi for OpenAiChat {
    async fn complete(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        max_tokens: u32,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(json!({ "role": "system", "content": system_prompt }));
        for turn in turns {
            messages.push(json!({ "role": turn.role.as_str(), "content": turn.text }));
        }

        self.request(messages, max_tokens).await
    }

    async fn describe_image(&self, image: &[u8], prompt: &str) -> Result<String> {
        let data_url = format!("data:image/jpeg;base64,{}", STANDARD.encode(image));
        let messages = vec![json!({
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                { "type": "image_url", "image_url": { "url": data_url } },
            ],
        })];

        self.request(messages, 300).await
    }
}
