//! Markdown stripping for generated reply text.

use std::sync::LazyLock;

use regex::Regex;

use super::compile;

static BOLD: LazyLock<Regex> = LazyLock::new(|| compile(r"\*\*(.*?)\*\*"));
static UNDERLINE: LazyLock<Regex> = LazyLock::new(|| compile(r"__(.*?)__"));
static ITALIC_STAR: LazyLock<Regex> = LazyLock::new(|| compile(r"\*(.*?)\*"));
static ITALIC_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| compile(r"_(.*?)_"));
static HEADING: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^#{1,6}[ \t]*(.*)$"));
static STRIKE: LazyLock<Regex> = LazyLock::new(|| compile(r"~~(.*?)~~"));
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| compile(r"\n\s*\n"));

/// Removes emphasis markers and heading prefixes, collapsing blank-line runs.
///
/// Marker order matters: doubled markers are removed before single ones so
/// `**bold**` does not leave stray asterisks.
#[must_use]
pub fn clean_markdown(text: &str) -> String {
    let mut cleaned = text.to_string();
    for pattern in [
        &*BOLD,
        &*UNDERLINE,
        &*ITALIC_STAR,
        &*ITALIC_UNDERSCORE,
        &*HEADING,
        &*STRIKE,
    ] {
        cleaned = pattern.replace_all(&cleaned, "${1}").into_owned();
    }

    BLANK_RUN.replace_all(cleaned.trim(), "\n\n").into_owned()
}
