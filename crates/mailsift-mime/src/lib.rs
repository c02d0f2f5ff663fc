//! # mailsift-mime
//!
//! Message building and encoding helpers for mailsift.
//!
//! ## Features
//!
//! - **Headers**: Ordered, case-insensitive RFC 5322 header collection
//! - **Message generation**: Plain-text replies with threading headers
//! - **Encoding/Decoding**: Base64, URL-safe Base64, RFC 2047 header encoding
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsift_mime::{MessageBuilder, angle_addr, reply_subject};
//!
//! let message = MessageBuilder::new()
//!     .from("me")
//!     .to("alice@example.com")
//!     .subject(&reply_subject("Lunch"))
//!     .header("In-Reply-To", angle_addr("CAF123@mail.example.com"))
//!     .text_body("Sounds good!")
//!     .build()?;
//!
//! let raw = message.to_base64url();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod header;
mod message;

pub mod encoding;

pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, MessageBuilder, angle_addr, reply_subject};
