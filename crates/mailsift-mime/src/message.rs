//! Outgoing message construction.

use crate::encoding::{encode_base64url, encode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;

/// A plain-text RFC 5322 message ready to be serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Plain text body.
    pub body: String,
}

impl Message {
    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// Renders the message with CRLF line endings.
    #[must_use]
    pub fn to_rfc5322(&self) -> String {
        let mut message = self.headers.to_string();
        message.push_str("\r\n");
        for (idx, line) in self.body.lines().enumerate() {
            if idx > 0 {
                message.push_str("\r\n");
            }
            message.push_str(line);
        }
        message.push_str("\r\n");
        message
    }

    /// Renders the message and encodes it with URL-safe Base64, the form the
    /// Gmail API expects in the `raw` field.
    #[must_use]
    pub fn to_base64url(&self) -> String {
        encode_base64url(self.to_rfc5322().as_bytes())
    }
}

/// Builder for plain-text messages.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    headers: Headers,
    body: String,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the From header.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.headers.set("From", from);
        self
    }

    /// Sets the To header.
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.headers.set("To", to);
        self
    }

    /// Sets the Subject header, RFC 2047 encoding it when needed.
    #[must_use]
    pub fn subject(mut self, subject: &str) -> Self {
        self.headers.set("Subject", encode_rfc2047(subject, "utf-8"));
        self
    }

    /// Sets an arbitrary header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Sets the plain text body.
    #[must_use]
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the message.
    ///
    /// # Errors
    ///
    /// Returns an error if the To header is missing or a header value would
    /// break the header block.
    pub fn build(mut self) -> Result<Message> {
        if self.headers.get("to").is_none_or(|to| to.trim().is_empty()) {
            return Err(Error::MissingHeader("To".to_string()));
        }
        self.headers.set("MIME-Version", "1.0");
        self.headers
            .set("Content-Type", "text/plain; charset=\"utf-8\"");
        self.headers.set("Content-Transfer-Encoding", "8bit");
        self.headers.validate()?;

        Ok(Message {
            headers: self.headers,
            body: self.body,
        })
    }
}

/// Returns the subject for a reply: `Re: {subject}` unless already prefixed.
#[must_use]
pub fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    if trimmed
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:"))
    {
        trimmed.to_string()
    } else {
        format!("Re: {trimmed}")
    }
}

/// Wraps a message identifier in angle brackets unless it already has them.
#[must_use]
pub fn angle_addr(id: &str) -> String {
    let id = id.trim();
    if id.starts_with('<') && id.ends_with('>') {
        id.to_string()
    } else {
        format!("<{id}>")
    }
}
