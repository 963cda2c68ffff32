//! Defensive parsing of heterogeneous mailbox message shapes.
//!
//! Recipient resolution walks a priority chain (structured `To` array,
//! then the `To` header, then empty). Attachment extraction uses a
//! three-tier fallback: structured MIME parts, then a full RFC822 parse of
//! `Raw.Data`, then nothing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use mail_parser::{MessageParser, MimeHeaders};
use thiserror::Error;

use super::provider::MailMessage;

/// Default name when a part is clearly an attachment but carries none.
const FALLBACK_FILENAME: &str = "attachment.pdf";

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("invalid base64 in part '{filename}': {source}")]
    Base64 {
        filename: String,
        source: base64::DecodeError,
    },
}

/// An attachment pulled out of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Resolve the destination address of a message.
///
/// Priority: (1) the structured recipient list, where a mailbox-only entry
/// with an empty domain yields just the mailbox name; (2) the header-based
/// `To` field, unwrapped from `Name <addr>` display syntax; (3) empty
/// string. Always lower-cased.
pub fn resolve_to_address(message: &MailMessage) -> String {
    if let Some(first) = message.to.as_ref().and_then(|to| to.first()) {
        let mailbox = first.mailbox.as_deref().unwrap_or("").trim();
        let domain = first.domain.as_deref().unwrap_or("").trim();
        if !mailbox.is_empty() {
            return if domain.is_empty() {
                mailbox.to_lowercase()
            } else {
                format!("{mailbox}@{domain}").to_lowercase()
            };
        }
    }

    if let Some(headers) = message.content.as_ref().and_then(|c| c.headers.as_ref()) {
        if let Some(addr) = headers.get("To").and_then(|values| values.first()) {
            let addr = match addr.split_once('<') {
                Some((_, rest)) => rest.split('>').next().unwrap_or(""),
                None => addr.as_str(),
            };
            return addr.trim().to_lowercase();
        }
    }

    String::new()
}

/// The alias a tenant is matched on: the local part of the address, or the
/// whole string when there is no `@`.
pub fn alias_local_part(address: &str) -> &str {
    address.split('@').next().unwrap_or(address)
}

fn header_first<'a>(
    headers: Option<&'a std::collections::HashMap<String, Vec<String>>>,
    name: &str,
) -> &'a str {
    headers
        .and_then(|h| h.get(name))
        .and_then(|values| values.first())
        .map(String::as_str)
        .unwrap_or("")
}

fn filename_from_disposition(disposition: &str) -> Option<String> {
    let (_, rest) = disposition.split_once("filename=\"")?;
    rest.split('"').next().map(|name| name.to_string())
}

/// Tier 1: structured MIME parts.
fn from_mime_parts(message: &MailMessage) -> Result<Vec<Attachment>, AttachmentError> {
    let Some(parts) = message.mime.as_ref().and_then(|mime| mime.parts.as_ref()) else {
        return Ok(Vec::new());
    };

    let mut attachments = Vec::new();
    for part in parts {
        let headers = part.headers.as_ref();
        let disposition = header_first(headers, "Content-Disposition");
        let content_type = header_first(headers, "Content-Type");

        if !disposition.to_lowercase().contains("attachment")
            && !content_type.to_lowercase().contains("application/pdf")
        {
            continue;
        }

        let filename = filename_from_disposition(disposition)
            .unwrap_or_else(|| FALLBACK_FILENAME.to_string());
        let body = part.body.as_deref().unwrap_or("");
        let encoding = header_first(headers, "Content-Transfer-Encoding");

        let content = if encoding.eq_ignore_ascii_case("base64") {
            // MailHog wraps base64 bodies; strip whitespace before decoding.
            let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
            BASE64.decode(compact).map_err(|source| AttachmentError::Base64 {
                filename: filename.clone(),
                source,
            })?
        } else {
            body.as_bytes().to_vec()
        };

        attachments.push(Attachment { filename, content });
    }

    Ok(attachments)
}

/// Tier 2: parse the full RFC822 text and walk its MIME tree.
fn from_raw(message: &MailMessage) -> Vec<Attachment> {
    let Some(data) = message
        .raw
        .as_ref()
        .and_then(|raw| raw.data.as_deref())
        .filter(|data| !data.is_empty())
    else {
        return Vec::new();
    };

    let Some(parsed) = MessageParser::default().parse(data.as_bytes()) else {
        return Vec::new();
    };

    parsed
        .attachments()
        .filter(|part| !part.contents().is_empty())
        .map(|part| Attachment {
            filename: part
                .attachment_name()
                .unwrap_or(FALLBACK_FILENAME)
                .to_string(),
            content: part.contents().to_vec(),
        })
        .collect()
}

/// Extract attachments with the three-tier fallback. An empty result is a
/// legitimate no-attachment message, not a failure.
pub fn extract_attachments(message: &MailMessage) -> Result<Vec<Attachment>, AttachmentError> {
    let attachments = from_mime_parts(message)?;
    if !attachments.is_empty() {
        return Ok(attachments);
    }

    Ok(from_raw(message))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::ingest::provider::{MessageContent, MimeBody, MimePart, RawMessage, Recipient};

    fn recipient(mailbox: &str, domain: &str) -> Recipient {
        Recipient {
            mailbox: Some(mailbox.to_string()),
            domain: Some(domain.to_string()),
        }
    }

    fn raw_message_with_pdf() -> MailMessage {
        let body = BASE64.encode(b"%PDF-1.4 fake pdf content");
        let data = format!(
            "From: sender@example.com\r\n\
             To: acme@inbound.local\r\n\
             Subject: Invoice\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: application/pdf; name=\"inv.pdf\"\r\n\
             Content-Disposition: attachment; filename=\"inv.pdf\"\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             {body}\r\n"
        );
        MailMessage {
            id: "msg-001".into(),
            to: Some(vec![recipient("acme", "")]),
            content: Some(MessageContent {
                headers: Some(HashMap::new()),
                body: Some(String::new()),
            }),
            mime: None,
            raw: Some(RawMessage { data: Some(data) }),
        }
    }

    #[test]
    fn test_alias_only_empty_domain() {
        let message = raw_message_with_pdf();
        assert_eq!(resolve_to_address(&message), "acme");
    }

    #[test]
    fn test_alias_with_domain() {
        let message = MailMessage {
            to: Some(vec![recipient("Acme", "Inbound.Local")]),
            ..Default::default()
        };
        assert_eq!(resolve_to_address(&message), "acme@inbound.local");
    }

    #[test]
    fn test_fallback_to_content_headers() {
        let mut headers = HashMap::new();
        headers.insert("To".to_string(), vec!["Acme <acme@inbound.local>".to_string()]);
        let message = MailMessage {
            content: Some(MessageContent {
                headers: Some(headers),
                body: Some(String::new()),
            }),
            ..Default::default()
        };
        assert_eq!(resolve_to_address(&message), "acme@inbound.local");
    }

    #[test]
    fn test_empty_message_resolves_to_empty() {
        assert_eq!(resolve_to_address(&MailMessage::default()), "");
    }

    #[test]
    fn test_alias_local_part() {
        assert_eq!(alias_local_part("acme@inbound.local"), "acme");
        assert_eq!(alias_local_part("acme"), "acme");
        assert_eq!(alias_local_part(""), "");
    }

    #[test]
    fn test_mime_null_uses_raw_data() {
        let attachments = extract_attachments(&raw_message_with_pdf()).unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "inv.pdf");
        assert!(attachments[0].content.starts_with(b"%PDF-1.4"));
    }

    #[test]
    fn test_mime_null_no_attachments() {
        let message = MailMessage {
            to: Some(vec![recipient("acme", "")]),
            raw: Some(RawMessage {
                data: Some(
                    "From: sender@example.com\r\n\
                     To: acme@inbound.local\r\n\
                     Subject: Hello\r\n\
                     \r\n\
                     Just a plain text email.\r\n"
                        .to_string(),
                ),
            }),
            ..Default::default()
        };
        assert_eq!(extract_attachments(&message).unwrap(), Vec::new());
    }

    #[test]
    fn test_structured_mime_parts_take_priority() {
        let mut headers = HashMap::new();
        headers.insert(
            "Content-Type".to_string(),
            vec!["application/pdf".to_string()],
        );
        headers.insert(
            "Content-Disposition".to_string(),
            vec!["attachment; filename=\"report.pdf\"".to_string()],
        );
        headers.insert(
            "Content-Transfer-Encoding".to_string(),
            vec!["base64".to_string()],
        );

        let message = MailMessage {
            mime: Some(MimeBody {
                parts: Some(vec![MimePart {
                    headers: Some(headers),
                    body: Some(BASE64.encode(b"%PDF-1.4 real pdf")),
                }]),
            }),
            ..Default::default()
        };

        let attachments = extract_attachments(&message).unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "report.pdf");
        assert_eq!(attachments[0].content, b"%PDF-1.4 real pdf");
    }

    #[test]
    fn test_non_attachment_parts_are_skipped() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), vec!["text/plain".to_string()]);

        let message = MailMessage {
            mime: Some(MimeBody {
                parts: Some(vec![MimePart {
                    headers: Some(headers),
                    body: Some("hello".to_string()),
                }]),
            }),
            ..Default::default()
        };
        assert_eq!(extract_attachments(&message).unwrap(), Vec::new());
    }

    #[test]
    fn test_invalid_base64_is_an_error() {
        let mut headers = HashMap::new();
        headers.insert(
            "Content-Disposition".to_string(),
            vec!["attachment; filename=\"bad.pdf\"".to_string()],
        );
        headers.insert(
            "Content-Transfer-Encoding".to_string(),
            vec!["base64".to_string()],
        );

        let message = MailMessage {
            mime: Some(MimeBody {
                parts: Some(vec![MimePart {
                    headers: Some(headers),
                    body: Some("!!! not base64 !!!".to_string()),
                }]),
            }),
            ..Default::default()
        };
        assert!(extract_attachments(&message).is_err());
    }

    #[test]
    fn test_completely_empty_message() {
        let message = MailMessage {
            mime: None,
            raw: None,
            ..Default::default()
        };
        assert_eq!(extract_attachments(&message).unwrap(), Vec::new());
    }
}
