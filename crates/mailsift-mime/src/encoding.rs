//! Encoding and decoding utilities.
//!
//! Supports standard Base64, the URL-safe alphabet used by the Gmail API for
//! message bodies and raw sends, and RFC 2047 header encoding.

use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data.trim()).map_err(Into::into)
}

/// Encodes data with the URL-safe Base64 alphabet (padded).
#[must_use]
pub fn encode_base64url(data: &[u8]) -> String {
    URL_SAFE.encode(data)
}

/// Decodes URL-safe Base64, with or without padding.
///
/// Whitespace is ignored so that folded payloads decode as well.
///
/// # Errors
///
/// Returns an error if the input is not valid URL-safe Base64.
pub fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    URL_SAFE_NO_PAD
        .decode(cleaned.trim_end_matches('='))
        .map_err(Into::into)
}

/// Decodes URL-safe Base64 into text, replacing invalid UTF-8 sequences.
///
/// Returns an empty string when the payload cannot be decoded at all.
#[must_use]
pub fn decode_base64url_lossy(data: &str) -> String {
    decode_base64url(data)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Encodes a header value using RFC 2047 encoding.
///
/// Format: `=?charset?B?encoded-text?=`. Plain ASCII values are returned
/// unchanged.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) && !text.contains("=?") {
        return text.to_string();
    }

    let encoded = encode_base64(text.as_bytes());
    format!("=?{charset}?B?{encoded}?=")
}
