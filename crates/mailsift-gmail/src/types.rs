//! Gmail API wire types.
//!
//! Only the fields mailsift reads are modelled; everything else in the
//! responses is ignored during deserialization.

use serde::{Deserialize, Serialize};

/// Reference to a message as returned by `messages.list` and `history.list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// Immutable message identifier.
    pub id: String,
    /// Thread the message belongs to.
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Response of `users.messages.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    /// Matching messages, newest first.
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    /// Token for the next page, if any.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A header name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Header {
    /// Header name as sent by the server.
    pub name: String,
    /// Decoded header value.
    pub value: String,
}

/// Body of a message part.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    /// Size of the body in bytes.
    #[serde(default)]
    pub size: u64,
    /// URL-safe Base64 body data (absent for attachments).
    #[serde(default)]
    pub data: Option<String>,
    /// Attachment identifier, when the body must be fetched separately.
    #[serde(default)]
    pub attachment_id: Option<String>,
}

/// One node of the MIME tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// MIME type of this part.
    #[serde(default)]
    pub mime_type: String,
    /// Filename for attachment parts.
    #[serde(default)]
    pub filename: Option<String>,
    /// Part headers.
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Part body.
    #[serde(default)]
    pub body: MessagePartBody,
    /// Child parts for multipart types.
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// A message as returned by `messages.get` with `format=full`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Immutable message identifier.
    pub id: String,
    /// Thread the message belongs to.
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Labels applied to the message.
    #[serde(default)]
    pub label_ids: Vec<String>,
    /// Short plain-text preview.
    #[serde(default)]
    pub snippet: String,
    /// History record that last modified this message.
    #[serde(default)]
    pub history_id: Option<String>,
    /// Receipt time in milliseconds since the epoch, as a string.
    #[serde(default)]
    pub internal_date: Option<String>,
    /// Parsed MIME tree.
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

/// A `messagesAdded` entry within a history record.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageAdded {
    /// The added message.
    pub message: MessageRef,
}

/// A single history record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    /// Mailbox history position of this record.
    pub id: String,
    /// Messages added in this record.
    #[serde(default)]
    pub messages_added: Vec<MessageAdded>,
}

/// Response of `users.history.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListHistoryResponse {
    /// History records in chronological order.
    #[serde(default)]
    pub history: Vec<History>,
    /// Token for the next page, if any.
    #[serde(default)]
    pub next_page_token: Option<String>,
    /// Current mailbox history position.
    #[serde(default)]
    pub history_id: Option<String>,
}

/// Request body of `users.messages.send`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest<'a> {
    /// Full RFC 5322 message, URL-safe Base64 encoded.
    pub raw: &'a str,
    /// Thread to place the message in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<&'a str>,
}

/// Request body of `users.watch`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchRequest<'a> {
    /// Fully qualified Pub/Sub topic name.
    pub topic_name: &'a str,
    /// Labels to filter on.
    pub label_ids: Vec<&'a str>,
    /// `include` or `exclude`.
    pub label_filter_action: &'a str,
}

/// Response of `users.watch`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    /// Mailbox history position at registration time.
    pub history_id: String,
    /// Expiration in milliseconds since the epoch, as a string.
    #[serde(default)]
    pub expiration: Option<String>,
}

/// Error envelope returned by Google APIs.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

/// Error details.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
}
