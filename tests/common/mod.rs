//! Shared test utilities

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use pendant::email::{Attachment, EmailSummary, Mailer};
use pendant::session::{ChatApi, Turn};
use pendant::{Error, Result};

/// Chat stub replaying a fixed script of replies
pub struct ScriptedChat {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedChat {
    #[must_use]
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
        }
    }
}

#[async_trait]
impl ChatApi for ScriptedChat {
    async fn complete(&self, _system: &str, _turns: &[Turn], _max_tokens: u32) -> Result<String> {
        self.replies
            .lock()
            .expect("script lock")
            .pop_front()
            .ok_or_else(|| Error::Chat("script exhausted".to_string()))
    }

    async fn describe_image(&self, _image: &[u8], _prompt: &str) -> Result<String> {
        Ok("a scripted description".to_string())
    }
}

/// Mailer stub serving a fixed inbox and recording what was sent
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMessage>>,
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attached: bool,
}

impl RecordingMailer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl Default for RecordingMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn list(&self, _query: &str, max_results: u32) -> Result<Vec<EmailSummary>> {
        let inbox = [
            ("msg-a", "Ada", "Ada <ada@example.com>", "Lunch tomorrow?"),
            ("msg-b", "Bram", "Bram <bram@example.com>", "Build finished"),
        ];

        Ok(inbox
            .iter()
            .take(max_results as usize)
            .map(|(id, name, addr, subject)| EmailSummary {
                id: (*id).to_string(),
                from_name: (*name).to_string(),
                from_addr: (*addr).to_string(),
                subject: (*subject).to_string(),
                date: "Mon, 2 Mar 2026 09:00:00 +0000".to_string(),
            })
            .collect())
    }

    async fn read(&self, id: &str) -> Result<String> {
        match id {
            "msg-a" => Ok("From: Ada\nSubject: Lunch tomorrow?\n\nAre you free at noon?".to_string()),
            "msg-b" => Ok("From: Bram\nSubject: Build finished\n\nAll green.".to_string()),
            other => Err(Error::Email(format!("unknown message {other}"))),
        }
    }

    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<Attachment>,
    ) -> Result<()> {
        self.sent.lock().expect("sent lock").push(SentMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            attached: attachment.is_some(),
        });
        Ok(())
    }

    async fn reply(
        &self,
        id: &str,
        body: &str,
        _to_override: Option<&str>,
        attachment: Option<Attachment>,
    ) -> Result<String> {
        let name = match id {
            "msg-a" => "Ada",
            "msg-b" => "Bram",
            other => return Err(Error::Email(format!("unknown message {other}"))),
        };
        self.sent.lock().expect("sent lock").push(SentMessage {
            to: name.to_string(),
            subject: "Re:".to_string(),
            body: body.to_string(),
            attached: attachment.is_some(),
        });
        Ok(name.to_string())
    }
}
