//! Which messages may be answered automatically.

use crate::classify::Category;

/// Minimum confidence for a message to be repliable at all.
pub const REPLY_CONFIDENCE_THRESHOLD: f64 = 0.70;

/// Phrases that mark a message as not meant to be answered.
pub const OPT_OUT_PHRASES: [&str; 4] = ["unsubscribe", "no reply", "auto-generated", "do not reply"];

/// Categories whose messages are answered without a human in the loop.
pub const AUTO_SEND_CATEGORIES: [Category; 5] = [
    Category::Business,
    Category::Personal,
    Category::Education,
    Category::Ham,
    Category::Social,
];

/// Body used when the generator returns nothing usable.
pub const FALLBACK_DRAFT: &str = "Thanks for your email. I'll get back to you soon.";

/// Returns why a message may not be replied to, or `None` if it may.
///
/// Every text in `texts` is searched for opt-out phrases, ignoring case.
#[must_use]
pub fn rejection_reason(label: Category, confidence: f64, texts: &[&str]) -> Option<&'static str> {
    if matches!(label, Category::Spam | Category::Promotions) {
        return Some("category is never answered");
    }
    if confidence < REPLY_CONFIDENCE_THRESHOLD {
        return Some("confidence below threshold");
    }
    let opted_out = texts.iter().any(|text| {
        let lower = text.to_lowercase();
        OPT_OUT_PHRASES.iter().any(|phrase| lower.contains(phrase))
    });
    opted_out.then_some("message contains an opt-out phrase")
}

/// Returns `true` if a reply may be drafted for the message.
#[must_use]
pub fn is_repliable(label: Category, confidence: f64, texts: &[&str]) -> bool {
    rejection_reason(label, confidence, texts).is_none()
}

/// Returns `true` if a drafted reply may be sent without review.
#[must_use]
pub fn should_auto_send(label: Category, confidence: f64) -> bool {
    AUTO_SEND_CATEGORIES.contains(&label) && confidence > REPLY_CONFIDENCE_THRESHOLD
}

/// Register the generated reply should be written in.
#[must_use]
pub const fn tone(label: Category) -> &'static str {
    match label {
        Category::Business | Category::Education => "professional",
        _ => "friendly",
    }
}
