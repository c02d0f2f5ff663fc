//! Push notification envelope decoding.
//!
//! Pub/Sub delivers `{"message": {"data": base64(json)}}` where the inner
//! document carries the mailbox's new `historyId`.

use mailsift_mime::encoding::{decode_base64, decode_base64url};
use serde::Deserialize;

use crate::service::HistoryId;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct PushEnvelope {
    message: Option<PushMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushMessage {
    data: Option<String>,
    #[serde(default)]
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePayload {
    history_id: Option<HistoryToken>,
    #[serde(default)]
    email_address: Option<String>,
}

/// Gmail sends the history id as a number; tolerate strings too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryToken {
    Number(u64),
    Text(String),
}

/// A decoded change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Mailbox history position the notification refers to.
    pub history_id: HistoryId,
    /// Mailbox the change happened in.
    pub email_address: Option<String>,
    /// Transport-level delivery id.
    pub delivery_id: Option<String>,
}

impl Notification {
    /// Decodes a push request body.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedNotification` if the body is not JSON, the
    /// envelope or data field is missing, the data is not Base64 encoded JSON,
    /// or the history id is missing or not numeric.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let envelope: PushEnvelope = serde_json::from_slice(body)
            .map_err(|e| malformed(format!("envelope is not JSON: {e}")))?;
        let message = envelope
            .message
            .ok_or_else(|| malformed("missing message"))?;
        let data = message
            .data
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| malformed("missing message data"))?;

        let decoded = decode_base64(data.trim())
            .or_else(|_| decode_base64url(&data))
            .map_err(|e| malformed(format!("data is not Base64: {e}")))?;
        let payload: ChangePayload = serde_json::from_slice(&decoded)
            .map_err(|e| malformed(format!("data is not JSON: {e}")))?;

        let history_id = match payload.history_id {
            Some(HistoryToken::Number(n)) => HistoryId(n),
            Some(HistoryToken::Text(s)) => HistoryId::parse(&s)
                .ok_or_else(|| malformed(format!("history id {s:?} is not numeric")))?,
            None => return Err(malformed("missing historyId")),
        };

        Ok(Self {
            history_id,
            email_address: payload.email_address,
            delivery_id: message.message_id,
        })
    }
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedNotification(reason.into())
}
