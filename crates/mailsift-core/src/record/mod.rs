//! Durable record of processed messages.
//!
//! One [`ProcessedMessage`] exists per provider message id for the lifetime
//! of the store; it is the authoritative answer to "has this message been
//! ingested already".

mod model;
mod repository;

pub use model::{NewRecord, ProcessedMessage};
pub use repository::{RecordRepository, RecordStore};
