//! Offline keyword-based classification engine.

use std::collections::HashSet;

use async_trait::async_trait;

use super::adapter::{ClassificationEngine, ClassifyError};
use super::model::{Category, RawScores, Sentiment};

/// Additive smoothing so that categories without hits keep a small share.
const SMOOTHING: f64 = 0.2;

const BUSINESS: &[&str] = &[
    "invoice", "meeting", "project", "contract", "proposal", "client", "quarterly", "report",
    "deadline", "budget", "schedule", "payment", "agenda", "partnership", "vendor", "shipment",
    "office", "manager", "company", "customer", "purchase", "order", "team", "review",
    "stakeholder", "revenue", "quote", "onboarding",
];

const PERSONAL: &[&str] = &[
    "family", "mom", "dad", "birthday", "dinner", "weekend", "friend", "party", "vacation",
    "wedding", "kids", "home", "miss", "coffee", "trip", "holiday", "brother", "sister",
    "lunch", "visit", "hug", "catch",
];

const PROMOTIONS: &[&str] = &[
    "sale", "discount", "offer", "coupon", "promo", "shop", "save", "shipping", "exclusive",
    "limited", "newsletter", "subscribe", "percent", "price", "buy", "store", "collection",
    "arrivals", "deal", "deals", "code", "savings", "clearance", "membership",
];

const SPAM: &[&str] = &[
    "winner", "won", "prize", "lottery", "claim", "bitcoin", "crypto", "inheritance", "million",
    "casino", "congratulations", "selected", "guaranteed", "cash", "verify", "suspended",
    "password", "wire", "beneficiary", "investment", "loan", "pills",
];

const EDUCATION: &[&str] = &[
    "course", "class", "lecture", "assignment", "exam", "university", "student", "semester",
    "homework", "professor", "enrollment", "tuition", "webinar", "lesson", "tutorial",
    "certificate", "grade", "school", "learning", "degree", "campus", "syllabus",
];

const POSITIVE: &[&str] = &[
    "thanks", "thank", "great", "happy", "pleased", "excellent", "glad", "appreciate",
    "wonderful", "love", "awesome", "good", "welcome", "excited", "delighted", "perfect",
    "success", "enjoy", "congratulations", "nice",
];

const NEGATIVE: &[&str] = &[
    "problem", "issue", "urgent", "complaint", "disappointed", "unfortunately", "error",
    "failed", "failure", "overdue", "angry", "cancel", "refund", "delay", "broken", "wrong",
    "bad", "concern", "unable", "suspended", "warning", "immediately", "frustrated", "late",
];

/// Scores texts by counting category and sentiment keywords.
///
/// Category scores are hit counts with additive smoothing, normalised to sum
/// to one. Sentiment is whichever of positive/negative has more hits, with a
/// score in `[0.5, 1.0)` growing with the margin; ties are neutral at 0.5.
#[derive(Debug, Clone)]
pub struct LexiconEngine {
    categories: Vec<(Category, HashSet<&'static str>)>,
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
}

impl LexiconEngine {
    /// Creates an engine with the built-in English word lists.
    #[must_use]
    pub fn new() -> Self {
        let lists: [&[&'static str]; 5] = [BUSINESS, PERSONAL, PROMOTIONS, SPAM, EDUCATION];
        let categories = Category::CANDIDATES
            .into_iter()
            .zip(lists)
            .map(|(category, words)| (category, words.iter().copied().collect()))
            .collect();

        Self {
            categories,
            positive: POSITIVE.iter().copied().collect(),
            negative: NEGATIVE.iter().copied().collect(),
        }
    }

    /// Scores one text synchronously.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score_text(&self, text: &str) -> RawScores {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter(|token| !token.is_empty())
            .collect();

        let hits: Vec<usize> = self
            .categories
            .iter()
            .map(|(_, words)| tokens.iter().filter(|t| contains_word(words, t)).count())
            .collect();
        let total = hits.iter().sum::<usize>() as f64 + SMOOTHING * hits.len() as f64;
        let categories = self
            .categories
            .iter()
            .zip(&hits)
            .map(|((category, _), &count)| (*category, (count as f64 + SMOOTHING) / total))
            .collect();

        let positive = tokens.iter().filter(|t| contains_word(&self.positive, t)).count();
        let negative = tokens.iter().filter(|t| contains_word(&self.negative, t)).count();
        let margin = positive.abs_diff(negative) as f64 / (positive + negative + 1) as f64;
        let sentiment = match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        };

        RawScores {
            categories,
            sentiment,
            sentiment_score: 0.5 + 0.5 * margin,
        }
    }
}

impl Default for LexiconEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Matches a token or its plural-stripped form.
fn contains_word(words: &HashSet<&'static str>, token: &str) -> bool {
    words.contains(token) || token.strip_suffix('s').is_some_and(|stem| words.contains(stem))
}

#[async_trait]
impl ClassificationEngine for LexiconEngine {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    async fn score(&self, texts: &[String]) -> Result<Vec<RawScores>, ClassifyError> {
        Ok(texts.iter().map(|text| self.score_text(text)).collect())
    }
}
