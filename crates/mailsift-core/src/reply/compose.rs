//! Threaded reply construction.

use mailsift_mime::{MessageBuilder, angle_addr, reply_subject};

use crate::Result;
use crate::service::{FullMessage, OutgoingMessage};

/// Builds a reply to `original` ready for the provider's send call.
///
/// The reply is addressed to the original sender, threads on the original
/// `Message-ID` (or the provider id when the header is missing) and stays in
/// the original thread.
///
/// # Errors
///
/// Returns `Error::Mime` if the original has no sender or a header value is
/// not representable.
pub fn compose_reply(original: &FullMessage, subject: &str, body: &str) -> Result<OutgoingMessage> {
    let reference = original
        .message_id_header()
        .map_or_else(|| angle_addr(&original.id), angle_addr);

    let message = MessageBuilder::new()
        .from("me")
        .to(original.from())
        .subject(&reply_subject(subject))
        .header("In-Reply-To", reference.clone())
        .header("References", reference)
        .text_body(body)
        .build()?;

    Ok(OutgoingMessage {
        raw: message.to_base64url(),
        thread_id: original.thread_id.clone(),
    })
}
