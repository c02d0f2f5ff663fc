//! Subject/body normalization into display and classifier-input forms.

use std::borrow::Cow;
use std::sync::LazyLock;

use html_escape::decode_html_entities;
use regex::{Captures, Regex};

use super::similarity::ratio;
use super::stopwords::is_stopword;
use super::{compile, truncate_chars};

/// Maximum length of the display form, in characters, before the ellipsis.
pub const DISPLAY_LIMIT: usize = 500;

/// Maximum length of the classifier-input form, in characters.
pub const MODEL_LIMIT: usize = 300;

/// Units more similar than this to an already-kept unit are dropped.
pub const SIMILARITY_THRESHOLD: f64 = 0.70;

/// Marker appended to anything cut short.
pub const ELLIPSIS: &str = "...";

/// URLs longer than this are shortened in the display form.
const URL_DISPLAY_LIMIT: usize = 50;

/// Query parameters that only exist for click tracking.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_cid", "mc_eid", "igshid"];

static URL: LazyLock<Regex> = LazyLock::new(|| compile(r#"https?://[^\s"'<>]+"#));
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"<[^>]+>"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"\s+"));
static BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)(unsubscribe|©|all rights reserved|support@|view on|learn more)")
});
static MODEL_URL: LazyLock<Regex> = LazyLock::new(|| compile(r"http\S+|www\.\S+"));
static MODEL_EMAIL: LazyLock<Regex> = LazyLock::new(|| compile(r"\S+@\S+"));
static NON_LETTER: LazyLock<Regex> = LazyLock::new(|| compile(r"[^a-z\s]"));

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedText {
    /// Deduplicated, bounded text suitable for display and persistence.
    pub display_text: String,
    /// Reduced text used as classifier input.
    pub model_text: String,
}

/// Normalizes a raw subject and body.
///
/// The display form is built from the body: tracking parameters and HTML
/// tags are removed, whitespace collapsed, long URLs shortened, near-duplicate
/// sentences dropped (first occurrence wins), trailing footer boilerplate cut
/// and the result capped at [`DISPLAY_LIMIT`] characters plus [`ELLIPSIS`].
///
/// The model form is [`model_text`] applied to `"{subject}\n\n{display}"`.
///
/// Never fails; empty input yields empty output.
#[must_use]
pub fn normalize(subject: &str, body: &str) -> NormalizedText {
    let display_text = display_text(body);
    let model_text = model_text(&format!("{subject}\n\n{display_text}"));
    NormalizedText {
        display_text,
        model_text,
    }
}

fn display_text(body: &str) -> String {
    let text = strip_tracking(body);
    let text = HTML_TAG.replace_all(&text, " ");
    let text = decode_html_entities(&text);
    let text = WHITESPACE.replace_all(&text, " ");
    let text = shorten_urls(text.trim());

    let mut text = dedup_units(split_sentences(&text)).join(" ");

    if let Some(found) = BOILERPLATE.find(&text) {
        text.truncate(found.start());
        text.truncate(text.trim_end().len());
    }

    let (capped, truncated) = truncate_chars(&text, DISPLAY_LIMIT);
    // Cutting can leave a partial unit that echoes an earlier one.
    let mut text = dedup_units(split_sentences(capped.trim_end())).join(" ");
    if truncated {
        text.push_str(ELLIPSIS);
    }
    text
}

/// Removes HTML tags and collapses the whitespace they leave behind.
#[must_use]
pub fn strip_tags(html: &str) -> String {
    let text = HTML_TAG.replace_all(html, " ");
    let text = decode_html_entities(&text);
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Reduces text to lowercase content words for classification.
///
/// URLs, email addresses, HTML tags and everything that is not an ASCII
/// letter are removed; stopwords and tokens of two characters or fewer are
/// dropped; the result is cut at [`MODEL_LIMIT`] characters.
#[must_use]
pub fn model_text(text: &str) -> String {
    let text = text.to_lowercase();
    let text = MODEL_URL.replace_all(&text, " ");
    let text = MODEL_EMAIL.replace_all(&text, " ");
    let text = HTML_TAG.replace_all(&text, " ");
    let text = NON_LETTER.replace_all(&text, " ");

    let tokens: Vec<&str> = text
        .split_whitespace()
        .filter(|token| token.len() > 2 && !is_stopword(token))
        .collect();
    let joined = tokens.join(" ");

    let (capped, _) = truncate_chars(&joined, MODEL_LIMIT);
    capped.to_string()
}

/// Splits text into sentence-like units.
///
/// A unit ends at `.`, `!` or `?` followed by whitespace; the terminator stays
/// with its unit. Empty units are discarded.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_idx, next)) = chars.peek()
            && next.is_whitespace()
        {
            let unit = text[start..next_idx].trim();
            if !unit.is_empty() {
                units.push(unit);
            }
            start = next_idx;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        units.push(tail);
    }
    units
}

/// Keeps units in order, dropping any too similar to one already kept.
fn dedup_units(units: Vec<&str>) -> Vec<&str> {
    let mut kept: Vec<&str> = Vec::with_capacity(units.len());
    for unit in units {
        if kept
            .iter()
            .all(|existing| ratio(unit, existing) <= SIMILARITY_THRESHOLD)
        {
            kept.push(unit);
        }
    }
    kept
}

/// Removes click-tracking parameters from every URL in `text`.
fn strip_tracking(text: &str) -> Cow<'_, str> {
    URL.replace_all(text, |caps: &Captures<'_>| clean_url(&caps[0]))
}

fn clean_url(url: &str) -> String {
    let Some((base, rest)) = url.split_once('?') else {
        return url.to_string();
    };
    let (query, fragment) = match rest.split_once('#') {
        Some((query, fragment)) => (query, Some(fragment)),
        None => (rest, None),
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|param| !param.is_empty() && !is_tracking_param(param))
        .collect();

    let mut cleaned = base.to_string();
    if !kept.is_empty() {
        cleaned.push('?');
        cleaned.push_str(&kept.join("&"));
    }
    if let Some(fragment) = fragment {
        cleaned.push('#');
        cleaned.push_str(fragment);
    }
    cleaned
}

fn is_tracking_param(param: &str) -> bool {
    let key = param.split('=').next().unwrap_or_default();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

/// Replaces URLs longer than the display limit with a bracketed prefix.
fn shorten_urls(text: &str) -> String {
    URL.replace_all(text, |caps: &Captures<'_>| {
        let url = &caps[0];
        let (prefix, truncated) = truncate_chars(url, URL_DISPLAY_LIMIT);
        if truncated {
            format!("[{prefix}{ELLIPSIS}]")
        } else {
            url.to_string()
        }
    })
    .into_owned()
}
