//! Mailbox provider abstraction and the MailHog implementation.
//!
//! The wire structs mirror the MailHog API v2 message shape. Real payloads
//! are wildly inconsistent - `MIME` may be null, `Content.Body` empty, and
//! only `Raw.Data` populated - so every nested field is optional and the
//! parsing layer decides what to trust.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("mailbox request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mailbox unavailable: {0}")]
    Unavailable(String),
}

/// A recipient in the structured `To` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Recipient {
    #[serde(rename = "Mailbox", default)]
    pub mailbox: Option<String>,
    #[serde(rename = "Domain", default)]
    pub domain: Option<String>,
}

/// Header-based message content, the fallback when `MIME` is null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "Headers", default)]
    pub headers: Option<HashMap<String, Vec<String>>>,
    #[serde(rename = "Body", default)]
    pub body: Option<String>,
}

/// One structured MIME part.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MimePart {
    #[serde(rename = "Headers", default)]
    pub headers: Option<HashMap<String, Vec<String>>>,
    #[serde(rename = "Body", default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MimeBody {
    #[serde(rename = "Parts", default)]
    pub parts: Option<Vec<MimePart>>,
}

/// The full RFC822 message text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMessage {
    #[serde(rename = "Data", default)]
    pub data: Option<String>,
}

/// A message as returned by the mailbox provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailMessage {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "To", default)]
    pub to: Option<Vec<Recipient>>,
    #[serde(rename = "Content", default)]
    pub content: Option<MessageContent>,
    #[serde(rename = "MIME", default)]
    pub mime: Option<MimeBody>,
    #[serde(rename = "Raw", default)]
    pub raw: Option<RawMessage>,
}

/// An external mailbox the ingestion worker polls.
///
/// Delivery is at-least-once: a message is only deleted after it has been
/// fully processed, so anything left behind is retried on the next poll.
#[async_trait]
pub trait MailboxProvider: Send + Sync {
    /// Short label recorded on each ingestion run.
    fn label(&self) -> &str;

    async fn fetch_messages(&self) -> Result<Vec<MailMessage>, ProviderError>;

    async fn delete_message(&self, id: &str) -> Result<(), ProviderError>;
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    items: Vec<MailMessage>,
}

/// Polls the MailHog API v2 for new messages.
pub struct MailhogProvider {
    api_url: String,
    client: reqwest::Client,
}

impl MailhogProvider {
    /// Create a provider against a MailHog v2 API base URL
    /// (e.g. `http://mailhog:8025/api/v2`).
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl MailboxProvider for MailhogProvider {
    fn label(&self) -> &str {
        "MAILHOG"
    }

    async fn fetch_messages(&self) -> Result<Vec<MailMessage>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/messages", self.api_url))
            .send()
            .await?
            .error_for_status()?;

        let body: MessagesResponse = response.json().await?;
        Ok(body.items)
    }

    async fn delete_message(&self, id: &str) -> Result<(), ProviderError> {
        // Deletion lives on the v1 API.
        let delete_url = format!("{}/messages/{}", self.api_url.replace("/v2", "/v1"), id);
        self.client
            .delete(delete_url)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_mime_null_message() {
        let message: MailMessage = serde_json::from_str(
            r#"{
                "ID": "msg-001",
                "MIME": null,
                "Content": {"Headers": {}, "Body": ""},
                "To": [{"Mailbox": "acme", "Domain": ""}],
                "Raw": {"Data": "From: a@b\r\n\r\nhi"}
            }"#,
        )
        .unwrap();

        assert_eq!(message.id, "msg-001");
        assert!(message.mime.is_none());
        let to = message.to.unwrap();
        assert_eq!(to[0].mailbox.as_deref(), Some("acme"));
        assert_eq!(to[0].domain.as_deref(), Some(""));
    }

    #[test]
    fn test_deserializes_sparse_message() {
        let message: MailMessage = serde_json::from_str(r#"{"ID": "x"}"#).unwrap();
        assert!(message.to.is_none());
        assert!(message.content.is_none());
        assert!(message.raw.is_none());
    }
}
