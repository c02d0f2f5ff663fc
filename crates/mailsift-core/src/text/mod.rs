//! Text normalization.
//!
//! - [`normalize`] turns a raw subject/body pair into a bounded display form
//!   and a reduced form used as classifier input.
//! - [`clean_markdown`] strips markdown emphasis and headings from generated
//!   reply text.
//! - [`ratio`] is the similarity measure used for near-duplicate sentence
//!   removal.

mod markdown;
mod normalize;
mod similarity;
mod stopwords;

use regex::Regex;

pub use markdown::clean_markdown;
pub use normalize::{
    DISPLAY_LIMIT, ELLIPSIS, MODEL_LIMIT, NormalizedText, SIMILARITY_THRESHOLD, model_text,
    normalize, split_sentences, strip_tags,
};
pub use similarity::ratio;
pub use stopwords::is_stopword;

/// Compiles a built-in pattern.
#[allow(clippy::expect_used)] // Patterns are literals exercised by the unit tests
pub(crate) fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern must compile")
}

/// Truncates to at most `max` characters, never splitting a code point.
pub(crate) fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}
