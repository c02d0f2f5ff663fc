//! [`MailboxProvider`] implementation over the Gmail REST client.

use async_trait::async_trait;
use chrono::DateTime;
use mailsift_gmail::types::MessagePart;
use mailsift_gmail::{Client, ClientConfig};
use mailsift_mime::Headers;
use mailsift_mime::encoding::decode_base64url_lossy;
use tracing::debug;

use super::mailbox::{
    FullMessage, HistoryDelta, HistoryId, MailboxProvider, MessageAdded, OutgoingMessage,
    ProviderError, SentMessage, WatchAck,
};
use crate::text::strip_tags;

/// Gmail-backed mailbox.
#[derive(Debug, Clone)]
pub struct GmailMailbox {
    client: Client,
}

impl GmailMailbox {
    /// Creates a mailbox from client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the client configuration is invalid.
    pub fn new(config: ClientConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: Client::new(config)?,
        })
    }
}

#[async_trait]
impl MailboxProvider for GmailMailbox {
    async fn list_message_ids(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<String>, ProviderError> {
        let refs = self.client.list_messages(query, limit).await?;
        Ok(refs.into_iter().map(|r| r.id).collect())
    }

    async fn get_full_message(&self, id: &str) -> Result<FullMessage, ProviderError> {
        let message = self.client.get_message(id).await?;
        Ok(full_message(message))
    }

    async fn get_history_delta(&self, start: HistoryId) -> Result<HistoryDelta, ProviderError> {
        let (records, latest) = self.client.list_history(&start.to_string()).await?;

        let mut events = Vec::new();
        for record in records {
            let history_id = record.id.parse::<HistoryId>()?;
            events.extend(record.messages_added.into_iter().map(|added| MessageAdded {
                history_id,
                message_id: added.message.id,
            }));
        }

        let high_water = latest.as_deref().and_then(HistoryId::parse);
        debug!(%start, events = events.len(), ?high_water, "Resolved history delta");
        Ok(HistoryDelta { events, high_water })
    }

    async fn send(&self, message: OutgoingMessage) -> Result<SentMessage, ProviderError> {
        let sent = self
            .client
            .send_message(&message.raw, message.thread_id.as_deref())
            .await?;
        Ok(SentMessage { id: sent.id })
    }

    async fn register_watch(&self, topic: &str) -> Result<WatchAck, ProviderError> {
        let response = self.client.watch(topic).await?;
        Ok(WatchAck {
            history_id: response.history_id.parse()?,
            expiration_ms: response.expiration.and_then(|e| e.parse().ok()),
        })
    }
}

/// Converts a Gmail message into the provider-neutral form.
fn full_message(message: mailsift_gmail::Message) -> FullMessage {
    let payload = message.payload.unwrap_or_default();
    let headers: Headers = payload
        .headers
        .iter()
        .map(|h| (h.name.as_str(), h.value.as_str()))
        .collect();
    let subject = headers.get("subject").unwrap_or_default().to_string();
    let body = extract_body(&payload).unwrap_or_else(|| message.snippet.clone());
    let received_at = message
        .internal_date
        .as_deref()
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis);

    FullMessage {
        id: message.id,
        thread_id: message.thread_id,
        headers,
        subject,
        body,
        snippet: message.snippet,
        received_at,
    }
}

/// Picks the best text body from a MIME tree.
///
/// Order: data on the top-level part, then the first `text/plain` part,
/// then the first `text/html` part with tags stripped.
fn extract_body(payload: &MessagePart) -> Option<String> {
    if let Some(text) = part_text(payload) {
        return Some(if payload.mime_type.eq_ignore_ascii_case("text/html") {
            strip_tags(&text)
        } else {
            text
        });
    }

    find_part(payload, "text/plain")
        .or_else(|| find_part(payload, "text/html").map(|html| strip_tags(&html)))
}

/// Depth-first search for the first inline part of a given type.
fn find_part(part: &MessagePart, mime_type: &str) -> Option<String> {
    part.parts.iter().find_map(|child| {
        let is_attachment = child.filename.as_deref().is_some_and(|f| !f.is_empty());
        if !is_attachment
            && child.mime_type.eq_ignore_ascii_case(mime_type)
            && let Some(text) = part_text(child)
        {
            return Some(text);
        }
        find_part(child, mime_type)
    })
}

fn part_text(part: &MessagePart) -> Option<String> {
    part.body
        .data
        .as_deref()
        .filter(|data| !data.is_empty())
        .map(decode_base64url_lossy)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn message(json: &str) -> mailsift_gmail::Message {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_prefers_plain_text_part() {
        // "Hello" and "<b>Hi</b>"
        let full = full_message(message(
            r#"{
                "id": "m1", "threadId": "t1", "snippet": "preview",
                "internalDate": "1700000000000",
                "payload": {
                    "mimeType": "multipart/alternative",
                    "headers": [
                        {"name": "Subject", "value": "Greetings"},
                        {"name": "From", "value": "ann@example.com"}
                    ],
                    "body": {"size": 0},
                    "parts": [
                        {"mimeType": "text/html", "body": {"data": "PGI-SGk8L2I-"}},
                        {"mimeType": "text/plain", "body": {"data": "SGVsbG8"}}
                    ]
                }
            }"#,
        ));

        assert_eq!(full.id, "m1");
        assert_eq!(full.thread_id.as_deref(), Some("t1"));
        assert_eq!(full.subject, "Greetings");
        assert_eq!(full.from(), "ann@example.com");
        assert_eq!(full.body, "Hello");
        assert_eq!(full.received_at.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_falls_back_to_stripped_html() {
        let full = full_message(message(
            r#"{
                "id": "m2",
                "payload": {
                    "mimeType": "multipart/mixed",
                    "parts": [
                        {"mimeType": "multipart/alternative", "parts": [
                            {"mimeType": "text/html", "body": {"data": "PGI-SGk8L2I-"}}
                        ]}
                    ]
                }
            }"#,
        ));
        assert_eq!(full.body, "Hi");
        assert_eq!(full.subject, "");
    }

    #[test]
    fn test_top_level_body_and_snippet_fallback() {
        let full = full_message(message(
            r#"{"id": "m3", "payload": {"mimeType": "text/plain", "body": {"data": "SGVsbG8"}}}"#,
        ));
        assert_eq!(full.body, "Hello");

        let full = full_message(message(r#"{"id": "m4", "snippet": "Only a preview"}"#));
        assert_eq!(full.body, "Only a preview");
    }

    #[test]
    fn test_skips_attachments() {
        let full = full_message(message(
            r#"{
                "id": "m5", "snippet": "s",
                "payload": {
                    "mimeType": "multipart/mixed",
                    "parts": [
                        {"mimeType": "text/plain", "filename": "notes.txt", "body": {"data": "SGk"}},
                        {"mimeType": "text/plain", "filename": "", "body": {"data": "SGVsbG8"}}
                    ]
                }
            }"#,
        ));
        assert_eq!(full.body, "Hello");
    }
}
