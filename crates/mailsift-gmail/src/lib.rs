//! # mailsift-gmail
//!
//! Minimal Gmail REST API (v1) client.
//!
//! Covers exactly what an ingestion pipeline needs: listing inbox messages,
//! fetching full messages, walking `messageAdded` history, sending raw
//! messages, and registering Pub/Sub push notifications.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsift_gmail::{Client, ClientConfig};
//!
//! let client = Client::new(ClientConfig::new(access_token))?;
//! let (records, latest) = client.list_history("12345").await?;
//! for record in records {
//!     for added in record.messages_added {
//!         let message = client.get_message(&added.message.id).await?;
//!         println!("{}", message.snippet);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;

pub mod types;

pub use client::{Client, ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::{Error, Result};
pub use types::{History, Message, MessagePart, MessageRef, WatchResponse};
