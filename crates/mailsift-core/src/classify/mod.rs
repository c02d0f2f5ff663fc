//! Classification adapter and engines.
//!
//! The [`ClassificationAdapter`] is constructed once at startup around a
//! [`ClassificationEngine`] and shared by everything that needs labels:
//!
//! - [`LexiconEngine`] scores keywords locally and needs no network.
//! - [`HuggingFaceEngine`] calls hosted zero-shot and sentiment models.

mod adapter;
mod huggingface;
mod lexicon;
mod model;

pub use adapter::{ClassificationAdapter, ClassificationEngine, ClassifyError};
pub use huggingface::{
    DEFAULT_HF_BASE_URL, DEFAULT_SENTIMENT_MODEL, DEFAULT_ZERO_SHOT_MODEL, HuggingFaceEngine,
};
pub use lexicon::LexiconEngine;
pub use model::{
    Category, ClassificationResult, PRIORITY_SENTIMENT_THRESHOLD, Priority, RawScores, Sentiment,
};
