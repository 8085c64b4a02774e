//! Gmail client
//!
//! Talks to the Gmail REST API with an OAuth2 authorized-user token
//! file (client id/secret plus refresh token, as written by Google's
//! credential helper). The dispatcher only sees the `Mailer` trait, so
//! tests run against a scripted mailer instead of the network.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use serde::Deserialize;

use crate::{Error, Result};

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Read bodies longer than this are truncated before being summarized
const MAX_BODY_CHARS: usize = 500;

/// One entry of the most-recently-listed messages
#[derive(Debug, Clone)]
pub struct EmailSummary {
    /// Opaque Gmail message id
    pub id: String,
    /// Sender display name
    pub from_name: String,
    /// Full sender address header (kept for replies)
    pub from_addr: String,
    /// Subject line
    pub subject: String,
    /// Date header as received
    pub date: String,
}

/// An attachment for outgoing mail
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Email collaborator: list/read/send/reply
#[async_trait]
pub trait Mailer: Send + Sync {
    /// List messages matching `query`, newest first
    async fn list(&self, query: &str, max_results: u32) -> Result<Vec<EmailSummary>>;

    /// Read one message: formatted sender, subject, and (truncated) body
    async fn read(&self, id: &str) -> Result<String>;

    /// Send a new message
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<Attachment>,
    ) -> Result<()>;

    /// Reply on the original message's thread; returns the recipient's
    /// display name
    async fn reply(
        &self,
        id: &str,
        body: &str,
        to_override: Option<&str>,
        attachment: Option<Attachment>,
    ) -> Result<String>;
}

/// OAuth2 authorized-user credential file contents
#[derive(Debug, Clone, Deserialize)]
struct AuthorizedUser {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Gmail REST implementation of [`Mailer`]
pub struct GmailClient {
    client: reqwest::Client,
    creds: AuthorizedUser,
    token: tokio::sync::Mutex<Option<CachedToken>>,
}

impl GmailClient {
    /// Load credentials from an authorized-user token file
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or malformed
    pub fn from_token_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Email(format!("token file {}: {e}", path.display())))?;
        let creds: AuthorizedUser = serde_json::from_str(&text)
            .map_err(|e| Error::Email(format!("token file {}: {e}", path.display())))?;

        Ok(Self {
            client: reqwest::Client::new(),
            creds,
            token: tokio::sync::Mutex::new(None),
        })
    }

    /// Current access token, refreshed through the OAuth2 endpoint when
    /// expired
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now()
        {
            return Ok(token.access_token.clone());
        }

        tracing::debug!("refreshing Gmail access token");
        let response = self
            .client
            .post(TOKEN_URI)
            .form(&[
                ("client_id", self.creds.client_id.as_str()),
                ("client_secret", self.creds.client_secret.as_str()),
                ("refresh_token", self.creds.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Email(format!("token refresh failed {status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        let access = token.access_token.clone();

        // Refresh a minute early
        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(60));
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime,
        });

        Ok(access)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self.access_token().await?;
        let response = self.client.get(url).bearer_auth(token).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Email(format!("Gmail API error {status}: {body}")));
        }

        Ok(response.json().await?)
    }

    async fn send_raw(&self, rfc822: &str, thread_id: Option<&str>) -> Result<()> {
        let token = self.access_token().await?;
        let raw = URL_SAFE.encode(rfc822.as_bytes());

        let mut payload = serde_json::json!({ "raw": raw });
        if let Some(tid) = thread_id {
            payload["threadId"] = serde_json::Value::String(tid.to_string());
        }

        let response = self
            .client
            .post(format!("{GMAIL_BASE}/messages/send"))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Email(format!("Gmail send failed {status}: {body}")));
        }

        Ok(())
    }

    async fn message_metadata(&self, id: &str, headers: &[&str]) -> Result<MessageResponse> {
        let header_params: String = headers
            .iter()
            .map(|h| format!("&metadataHeaders={h}"))
            .collect();
        self.get_json(&format!(
            "{GMAIL_BASE}/messages/{id}?format=metadata{header_params}"
        ))
        .await
    }
}

#[derive(Debug, Deserialize)]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(rename = "threadId")]
    thread_id: Option<String>,
    payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct MessagePart {
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    #[serde(default)]
    headers: Vec<Header>,
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct PartBody {
    data: Option<String>,
}

impl MessageResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.payload.as_ref()?.headers.iter().find_map(|h| {
            h.name
                .eq_ignore_ascii_case(name)
                .then_some(h.value.as_str())
        })
    }

    /// First text/plain body in the part tree
    fn plain_body(&self) -> Option<String> {
        fn walk(part: &MessagePart) -> Option<String> {
            if part.mime_type.as_deref() == Some("text/plain")
                && let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref())
            {
                return decode_body(data);
            }
            part.parts.iter().find_map(walk)
        }

        let payload = self.payload.as_ref()?;
        if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_deref())
            && let Some(text) = decode_body(data)
        {
            return Some(text);
        }
        payload.parts.iter().find_map(walk)
    }
}

fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .ok()?;
    String::from_utf8(bytes).ok()
}

#[async_trait]
impl Mailer for GmailClient {
    async fn list(&self, query: &str, max_results: u32) -> Result<Vec<EmailSummary>> {
        let url = format!(
            "{GMAIL_BASE}/messages?q={}&maxResults={max_results}",
            urlencoding::encode(query)
        );
        let list: MessageListResponse = self.get_json(&url).await?;

        let mut summaries = Vec::with_capacity(list.messages.len());
        for msg_ref in list.messages {
            let msg = self
                .message_metadata(&msg_ref.id, &["From", "Subject", "Date"])
                .await?;

            let from = msg.header("From").unwrap_or("unknown");
            summaries.push(EmailSummary {
                id: msg_ref.id,
                from_name: display_name(from),
                from_addr: from.to_string(),
                subject: msg.header("Subject").unwrap_or("(no subject)").to_string(),
                date: msg.header("Date").unwrap_or_default().to_string(),
            });
        }

        tracing::debug!(count = summaries.len(), query, "messages listed");
        Ok(summaries)
    }

    async fn read(&self, id: &str) -> Result<String> {
        let msg: MessageResponse = self
            .get_json(&format!("{GMAIL_BASE}/messages/{id}?format=full"))
            .await?;

        let from = display_name(msg.header("From").unwrap_or("unknown"));
        let subject = msg.header("Subject").unwrap_or("(no subject)").to_string();
        let mut body = msg.plain_body().unwrap_or_default();

        if body.chars().count() > MAX_BODY_CHARS {
            body = body.chars().take(MAX_BODY_CHARS).collect::<String>() + "...";
        }

        Ok(format!("From: {from}\nSubject: {subject}\n\n{body}"))
    }

    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<Attachment>,
    ) -> Result<()> {
        let rfc822 = build_rfc822(to, subject, body, &[], attachment.as_ref());
        self.send_raw(&rfc822, None).await
    }

    async fn reply(
        &self,
        id: &str,
        body: &str,
        to_override: Option<&str>,
        attachment: Option<Attachment>,
    ) -> Result<String> {
        let original = self
            .message_metadata(id, &["From", "Subject", "Message-ID", "References", "Reply-To"])
            .await?;

        // Reply-To wins over From; an explicit override wins over both
        let to_raw = to_override
            .or_else(|| original.header("Reply-To"))
            .or_else(|| original.header("From"))
            .unwrap_or_default();
        let to = extract_address(to_raw)
            .ok_or_else(|| Error::Email("no reply address on original message".to_string()))?;

        let subject = original.header("Subject").unwrap_or_default();
        let subject = if subject.starts_with("Re:") {
            subject.to_string()
        } else {
            format!("Re: {subject}")
        };

        let mut extra_headers = Vec::new();
        if let Some(mid) = original.header("Message-ID") {
            extra_headers.push(("In-Reply-To".to_string(), mid.to_string()));
            let references = original.header("References").unwrap_or_default();
            extra_headers.push((
                "References".to_string(),
                format!("{references} {mid}").trim().to_string(),
            ));
        }

        let rfc822 = build_rfc822(&to, &subject, body, &extra_headers, attachment.as_ref());
        self.send_raw(&rfc822, original.thread_id.as_deref())
            .await?;

        Ok(display_name(to_raw))
    }
}

/// Extract the bare address from a `"Name" <addr>` header
#[must_use]
pub fn extract_address(header: &str) -> Option<String> {
    if let (Some(open), Some(close)) = (header.find('<'), header.rfind('>'))
        && open < close
    {
        return Some(header[open + 1..close].trim().to_string());
    }
    let trimmed = header.trim();
    trimmed.contains('@').then(|| trimmed.to_string())
}

/// Extract a display name from a `"Name" <addr>` header, falling back
/// to the address local part
#[must_use]
pub fn display_name(header: &str) -> String {
    if let Some(open) = header.find('<') {
        let name = header[..open].trim().trim_matches('"').trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    header
        .split('@')
        .next()
        .unwrap_or(header)
        .trim()
        .trim_matches('"')
        .to_string()
}

/// Build an RFC 822 message, `multipart/mixed` when an attachment rides
/// along
fn build_rfc822(
    to: &str,
    subject: &str,
    body: &str,
    extra_headers: &[(String, String)],
    attachment: Option<&Attachment>,
) -> String {
    let mut headers = format!("To: {to}\r\nSubject: {subject}\r\n");
    for (name, value) in extra_headers {
        headers.push_str(&format!("{name}: {value}\r\n"));
    }

    match attachment {
        None => format!(
            "{headers}Content-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{body}"
        ),
        Some(att) => {
            let boundary = "pendant-attachment-boundary";
            let encoded = base64::engine::general_purpose::STANDARD.encode(&att.bytes);
            format!(
                "{headers}MIME-Version: 1.0\r\n\
                 Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n\
                 --{boundary}\r\n\
                 Content-Type: text/plain; charset=\"UTF-8\"\r\n\r\n\
                 {body}\r\n\
                 --{boundary}\r\n\
                 Content-Type: {mime}; name=\"{name}\"\r\n\
                 Content-Disposition: attachment; filename=\"{name}\"\r\n\
                 Content-Transfer-Encoding: base64\r\n\r\n\
                 {encoded}\r\n\
                 --{boundary}--",
                mime = att.mime,
                name = att.filename,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_extraction() {
        assert_eq!(
            extract_address("\"Ada L\" <ada@example.com>").as_deref(),
            Some("ada@example.com")
        );
        assert_eq!(
            extract_address("ada@example.com").as_deref(),
            Some("ada@example.com")
        );
        assert_eq!(extract_address("not an address"), None);
        assert_eq!(extract_address(""), None);
    }

    #[test]
    fn display_name_extraction() {
        assert_eq!(display_name("\"Ada L\" <ada@example.com>"), "Ada L");
        assert_eq!(display_name("Ada <ada@example.com>"), "Ada");
        assert_eq!(display_name("ada@example.com"), "ada");
    }

    #[test]
    fn rfc822_plain_message() {
        let msg = build_rfc822("to@example.com", "Hi", "body text", &[], None);
        assert!(msg.starts_with("To: to@example.com\r\nSubject: Hi\r\n"));
        assert!(msg.ends_with("body text"));
    }

    #[test]
    fn rfc822_with_attachment_is_multipart() {
        let att = Attachment {
            filename: "photo.jpg".to_string(),
            mime: "image/jpeg".to_string(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        };
        let msg = build_rfc822("to@example.com", "Photo", "see attached", &[], Some(&att));

        assert!(msg.contains("multipart/mixed"));
        assert!(msg.contains("Content-Disposition: attachment; filename=\"photo.jpg\""));
        assert!(msg.contains("see attached"));
    }

    #[test]
    fn reply_headers_carry_threading() {
        let extra = vec![
            ("In-Reply-To".to_string(), "<abc@mail>".to_string()),
            ("References".to_string(), "<abc@mail>".to_string()),
        ];
        let msg = build_rfc822("to@example.com", "Re: Hi", "body", &extra, None);
        assert!(msg.contains("In-Reply-To: <abc@mail>\r\n"));
        assert!(msg.contains("References: <abc@mail>\r\n"));
    }

    #[test]
    fn body_decode_tolerates_padding_variants() {
        let padded = URL_SAFE.encode("hello there");
        let unpadded = URL_SAFE_NO_PAD.encode("hello there");
        assert_eq!(decode_body(&padded).as_deref(), Some("hello there"));
        assert_eq!(decode_body(&unpadded).as_deref(), Some("hello there"));
    }
}
