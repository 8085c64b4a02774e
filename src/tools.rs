//! Tool dispatch
//!
//! Maps extracted tool calls onto the email, alarm, and camera
//! backends. Dispatch never returns an error: every outcome, including
//! backend failures and bad parameters, becomes a plain-text result the
//! model summarizes for speech.
//!
//! The dispatcher remembers the most recent `gmail_list` results so a
//! follow-up like "read the second one" can use a 1-based index instead
//! of an opaque message id.

use std::sync::{Arc, Mutex};

use crate::alarm::AlarmStore;
use crate::camera::Camera;
use crate::email::{Attachment, EmailSummary, Mailer, extract_address};
use crate::session::ChatApi;
use crate::toolcall::ToolCall;

const DEFAULT_QUERY: &str = "is:unread";
const DEFAULT_MAX_RESULTS: u32 = 5;
const DESCRIBE_PROMPT: &str =
    "Describe what is in front of me in one or two short sentences, as if telling a friend.";

/// Executes tool calls against the configured backends
pub struct ToolDispatcher {
    mailer: Option<Arc<dyn Mailer>>,
    camera: Option<Camera>,
    alarms: Arc<Mutex<AlarmStore>>,
    /// Results of the most recent list, for index-based follow-ups
    last_listed: Vec<EmailSummary>,
}

impl ToolDispatcher {
    #[must_use]
    pub fn new(mailer: Option<Arc<dyn Mailer>>, camera: Option<Camera>, alarms: AlarmStore) -> Self {
        Self {
            mailer,
            camera,
            alarms: Arc::new(Mutex::new(alarms)),
            last_listed: Vec::new(),
        }
    }

    /// Shared handle to the alarm store, for the background alarm loop
    #[must_use]
    pub fn shared_alarms(&self) -> Arc<Mutex<AlarmStore>> {
        Arc::clone(&self.alarms)
    }

    /// Execute one tool call, producing a textual result
    pub async fn dispatch(&mut self, call: &ToolCall, chat: &dyn ChatApi) -> String {
        let result = match call.tool.as_str() {
            "gmail_list" => self.gmail_list(call).await,
            "gmail_read" => self.gmail_read(call).await,
            "gmail_send" => self.gmail_send(call).await,
            "gmail_reply" => self.gmail_reply(call).await,
            "alarm_set" => self.alarm_set(call),
            "alarm_list" => self.alarm_list(),
            "alarm_delete" => self.alarm_delete(call),
            "camera_describe" => self.camera_describe(chat).await,
            "camera_send" => self.camera_send(call).await,
            other => format!("Unknown tool \"{other}\"."),
        };

        tracing::debug!(tool = %call.tool, "tool dispatched");
        result
    }

    fn mailer(&self) -> Option<&Arc<dyn Mailer>> {
        self.mailer.as_ref()
    }

    /// Resolve a `message_id` parameter: a small integer is a 1-based
    /// index into the last listing, anything else is a raw Gmail id
    fn resolve_message_id(&self, call: &ToolCall) -> Result<String, String> {
        if let Some(n) = call.int_param("message_id") {
            let index = usize::try_from(n).unwrap_or(0);
            return match index.checked_sub(1).and_then(|i| self.last_listed.get(i)) {
                Some(summary) => Ok(summary.id.clone()),
                None => Err(format!(
                    "There is no message number {n}. List messages first."
                )),
            };
        }

        match call.str_param("message_id") {
            Some(id) if !id.trim().is_empty() => Ok(id.trim().to_string()),
            _ => Err("No message was specified. List messages first.".to_string()),
        }
    }

    async fn gmail_list(&mut self, call: &ToolCall) -> String {
        let Some(mailer) = self.mailer() else {
            return "Email is not configured.".to_string();
        };

        let query = call.str_param("query").unwrap_or(DEFAULT_QUERY);
        let max_results = call
            .int_param("max_results")
            .and_then(|n| u32::try_from(n).ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        match mailer.list(query, max_results).await {
            Ok(summaries) if summaries.is_empty() => {
                self.last_listed.clear();
                format!("No messages match \"{query}\".")
            }
            Ok(summaries) => {
                let lines: Vec<String> = summaries
                    .iter()
                    .enumerate()
                    .map(|(i, s)| format!("{}. {} - {}", i + 1, s.from_name, s.subject))
                    .collect();
                self.last_listed = summaries;
                format!("Messages:\n{}", lines.join("\n"))
            }
            Err(e) => format!("Listing messages failed: {e}"),
        }
    }

    async fn gmail_read(&self, call: &ToolCall) -> String {
        let Some(mailer) = self.mailer() else {
            return "Email is not configured.".to_string();
        };

        let id = match self.resolve_message_id(call) {
            Ok(id) => id,
            Err(msg) => return msg,
        };

        match mailer.read(&id).await {
            Ok(text) => text,
            Err(e) => format!("Reading the message failed: {e}"),
        }
    }

    async fn gmail_send(&self, call: &ToolCall) -> String {
        let Some(mailer) = self.mailer() else {
            return "Email is not configured.".to_string();
        };

        let Some(to) = call.str_param("to").filter(|t| !t.trim().is_empty()) else {
            return "I need an address to send to.".to_string();
        };
        let subject = call.str_param("subject").unwrap_or("(no subject)");
        let body = call.str_param("body").unwrap_or_default();

        match mailer.send(to, subject, body, None).await {
            Ok(()) => format!("Message sent to {to}."),
            Err(e) => format!("Sending the message failed: {e}"),
        }
    }

    async fn gmail_reply(&self, call: &ToolCall) -> String {
        let Some(mailer) = self.mailer() else {
            return "Email is not configured.".to_string();
        };

        let id = match self.resolve_message_id(call) {
            Ok(id) => id,
            Err(msg) => return msg,
        };
        let body = call.str_param("body").unwrap_or_default();
        let to_override = call.str_param("to").filter(|t| !t.trim().is_empty());

        match mailer.reply(&id, body, to_override, None).await {
            Ok(name) => format!("Replied to {name}."),
            Err(e) => format!("Replying failed: {e}"),
        }
    }

    fn alarm_set(&self, call: &ToolCall) -> String {
        let Some(time) = call.str_param("time") else {
            return "I need a time in HH:MM form to set an alarm.".to_string();
        };
        let label = call.str_param("label").unwrap_or("alarm");
        let message = call
            .str_param("message")
            .map_or_else(|| format!("This is your {label} alarm."), String::from);

        let mut alarms = self.alarms.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match alarms.set(time, label, &message) {
            Ok(alarm) => format!(
                "Alarm {} set for {} ({label}).",
                alarm.id,
                alarm.time_string()
            ),
            Err(e) => format!("Setting the alarm failed: {e}"),
        }
    }

    fn alarm_list(&self) -> String {
        let alarms = self.alarms.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if alarms.list().is_empty() {
            return "There are no alarms set.".to_string();
        }

        let lines: Vec<String> = alarms
            .list()
            .iter()
            .map(|a| {
                let state = if a.enabled { "" } else { " (off)" };
                format!("{}. {} {}{state}", a.id, a.time_string(), a.label)
            })
            .collect();
        format!("Alarms:\n{}", lines.join("\n"))
    }

    fn alarm_delete(&self, call: &ToolCall) -> String {
        let Some(id) = call.int_param("id").and_then(|n| u64::try_from(n).ok()) else {
            return "I need the id of the alarm to delete.".to_string();
        };

        let mut alarms = self.alarms.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match alarms.delete(id) {
            Ok(true) => format!("Alarm {id} deleted."),
            Ok(false) => format!("There is no alarm with id {id}."),
            Err(e) => format!("Deleting the alarm failed: {e}"),
        }
    }

    async fn camera_describe(&self, chat: &dyn ChatApi) -> String {
        let Some(camera) = &self.camera else {
            return "The camera is not available.".to_string();
        };

        let image = match camera.capture().await {
            Ok(image) => image,
            Err(e) => return format!("Taking a photo failed: {e}"),
        };

        match chat.describe_image(&image, DESCRIBE_PROMPT).await {
            Ok(description) => description,
            Err(e) => format!("Describing the photo failed: {e}"),
        }
    }

    async fn camera_send(&self, call: &ToolCall) -> String {
        let Some(camera) = &self.camera else {
            return "The camera is not available.".to_string();
        };
        let Some(mailer) = self.mailer() else {
            return "Email is not configured.".to_string();
        };

        // Explicit recipient, else the sender of the last listed message
        let to = call
            .str_param("to")
            .filter(|t| !t.trim().is_empty())
            .map(String::from)
            .or_else(|| {
                self.last_listed
                    .first()
                    .and_then(|s| extract_address(&s.from_addr))
            });
        let Some(to) = to else {
            return "I don't know who to send the photo to.".to_string();
        };

        let image = match camera.capture().await {
            Ok(image) => image,
            Err(e) => return format!("Taking a photo failed: {e}"),
        };

        let subject = call.str_param("subject").unwrap_or("Photo from my pendant");
        let attachment = Attachment {
            filename: "photo.jpg".to_string(),
            mime: "image/jpeg".to_string(),
            bytes: image,
        };

        match mailer.send(&to, subject, "", Some(attachment)).await {
            Ok(()) => format!("Photo sent to {to}."),
            Err(e) => format!("Sending the photo failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Turn;
    use crate::toolcall::extract_tool_call;
    use crate::{Error, Result};
    use async_trait::async_trait;

    struct NullChat;

    #[async_trait]
    impl ChatApi for NullChat {
        async fn complete(&self, _: &str, _: &[Turn], _: u32) -> Result<String> {
            Err(Error::Chat("not expected in this test".to_string()))
        }

        async fn describe_image(&self, _: &[u8], _: &str) -> Result<String> {
            Ok("a desk with a laptop".to_string())
        }
    }

    struct ScriptedMailer;

    #[async_trait]
    impl Mailer for ScriptedMailer {
        async fn list(&self, _query: &str, max_results: u32) -> Result<Vec<EmailSummary>> {
            Ok((0..max_results.min(2))
                .map(|i| EmailSummary {
                    id: format!("msg-{i}"),
                    from_name: format!("Sender {i}"),
                    from_addr: format!("Sender {i} <sender{i}@example.com>"),
                    subject: format!("Subject {i}"),
                    date: "Mon, 2 Mar 2026 09:00:00 +0000".to_string(),
                })
                .collect())
        }

        async fn read(&self, id: &str) -> Result<String> {
            Ok(format!("body of {id}"))
        }

        async fn send(
            &self,
            _to: &str,
            _subject: &str,
            _body: &str,
            _attachment: Option<Attachment>,
        ) -> Result<()> {
            Ok(())
        }

        async fn reply(
            &self,
            _id: &str,
            _body: &str,
            _to_override: Option<&str>,
            _attachment: Option<Attachment>,
        ) -> Result<String> {
            Ok("Sender 0".to_string())
        }
    }

    fn call(text: &str) -> ToolCall {
        extract_tool_call(text).expect("test call parses")
    }

    #[tokio::test]
    async fn alarm_tools_round_trip() {
        let mut tools = ToolDispatcher::new(None, None, AlarmStore::in_memory());
        let chat = NullChat;

        let set = tools
            .dispatch(
                &call(r#"{"tool":"alarm_set","params":{"time":"07:00","label":"wake"}}"#),
                &chat,
            )
            .await;
        assert!(set.contains("07:00"), "got {set:?}");

        let list = tools
            .dispatch(&call(r#"{"tool":"alarm_list","params":{}}"#), &chat)
            .await;
        assert!(list.contains("07:00 wake"), "got {list:?}");

        let deleted = tools
            .dispatch(&call(r#"{"tool":"alarm_delete","params":{"id":1}}"#), &chat)
            .await;
        assert!(deleted.contains("deleted"), "got {deleted:?}");

        let empty = tools
            .dispatch(&call(r#"{"tool":"alarm_list","params":{}}"#), &chat)
            .await;
        assert_eq!(empty, "There are no alarms set.");
    }

    #[tokio::test]
    async fn bad_alarm_time_becomes_a_spoken_error() {
        let mut tools = ToolDispatcher::new(None, None, AlarmStore::in_memory());
        let result = tools
            .dispatch(
                &call(r#"{"tool":"alarm_set","params":{"time":"25:99"}}"#),
                &NullChat,
            )
            .await;
        assert!(result.contains("failed"), "got {result:?}");
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_not_fatal() {
        let mut tools = ToolDispatcher::new(None, None, AlarmStore::in_memory());
        let result = tools
            .dispatch(&call(r#"{"tool":"teleport","params":{}}"#), &NullChat)
            .await;
        assert_eq!(result, "Unknown tool \"teleport\".");
    }

    #[tokio::test]
    async fn gmail_tools_without_mailer_degrade() {
        let mut tools = ToolDispatcher::new(None, None, AlarmStore::in_memory());
        let result = tools
            .dispatch(&call(r#"{"tool":"gmail_list","params":{}}"#), &NullChat)
            .await;
        assert_eq!(result, "Email is not configured.");
    }

    #[tokio::test]
    async fn listing_enables_index_based_read() {
        let mut tools =
            ToolDispatcher::new(Some(Arc::new(ScriptedMailer)), None, AlarmStore::in_memory());
        let chat = NullChat;

        let listed = tools
            .dispatch(&call(r#"{"tool":"gmail_list","params":{"max_results":2}}"#), &chat)
            .await;
        assert!(listed.contains("1. Sender 0"), "got {listed:?}");
        assert!(listed.contains("2. Sender 1"), "got {listed:?}");

        let second = tools
            .dispatch(
                &call(r#"{"tool":"gmail_read","params":{"message_id":2}}"#),
                &chat,
            )
            .await;
        assert_eq!(second, "body of msg-1");
    }

    #[tokio::test]
    async fn out_of_range_index_asks_for_a_listing() {
        let mut tools =
            ToolDispatcher::new(Some(Arc::new(ScriptedMailer)), None, AlarmStore::in_memory());
        let result = tools
            .dispatch(
                &call(r#"{"tool":"gmail_read","params":{"message_id":7}}"#),
                &NullChat,
            )
            .await;
        assert!(result.contains("List messages first"), "got {result:?}");
    }

    #[tokio::test]
    async fn send_requires_an_address() {
        let mut tools =
            ToolDispatcher::new(Some(Arc::new(ScriptedMailer)), None, AlarmStore::in_memory());
        let result = tools
            .dispatch(
                &call(r#"{"tool":"gmail_send","params":{"body":"hello"}}"#),
                &NullChat,
            )
            .await;
        assert_eq!(result, "I need an address to send to.");
    }
}
