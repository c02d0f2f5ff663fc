//! Classification data models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentiment scores above this decide priority.
pub const PRIORITY_SENTIMENT_THRESHOLD: f64 = 0.70;

/// Category assigned to a message.
///
/// Engines only produce the five [`Category::CANDIDATES`]; `Social` and `Ham`
/// exist because labels coming from callers of the manual reply path may use
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Work and commerce correspondence.
    Business,
    /// Mail from people the owner knows.
    Personal,
    /// Marketing and newsletters.
    Promotions,
    /// Unsolicited bulk mail.
    Spam,
    /// Courses, schools, learning platforms.
    Education,
    /// Social network notifications.
    Social,
    /// Legitimate mail without a finer category.
    Ham,
    /// Anything unrecognised.
    Unknown,
}

impl Category {
    /// Labels offered to classification engines, in a fixed order.
    pub const CANDIDATES: [Self; 5] = [
        Self::Business,
        Self::Personal,
        Self::Promotions,
        Self::Spam,
        Self::Education,
    ];

    /// Parse from string representation (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "business" => Self::Business,
            "personal" => Self::Personal,
            "promotions" | "promotion" => Self::Promotions,
            "spam" => Self::Spam,
            "education" => Self::Education,
            "social" => Self::Social,
            "ham" => Self::Ham,
            _ => Self::Unknown,
        }
    }

    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Personal => "personal",
            Self::Promotions => "promotions",
            Self::Spam => "spam",
            Self::Education => "education",
            Self::Social => "social",
            Self::Ham => "ham",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Overall tone of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    /// Favourable tone.
    Positive,
    /// No clear tone.
    #[default]
    Neutral,
    /// Unfavourable tone.
    Negative,
}

impl Sentiment {
    /// Parse from string representation; anything unknown is neutral.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            _ => Self::Neutral,
        }
    }

    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

/// Urgency derived from sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Confidently positive.
    Low,
    /// Everything else.
    #[default]
    Medium,
    /// Confidently negative.
    High,
}

impl Priority {
    /// Derives priority from a sentiment and its score.
    ///
    /// `High` for negative above the threshold, `Low` for positive above
    /// it, `Medium` otherwise.
    #[must_use]
    pub fn derive(sentiment: Sentiment, score: f64) -> Self {
        match sentiment {
            Sentiment::Negative if score > PRIORITY_SENTIMENT_THRESHOLD => Self::High,
            Sentiment::Positive if score > PRIORITY_SENTIMENT_THRESHOLD => Self::Low,
            _ => Self::Medium,
        }
    }

    /// Parse from string representation; anything unknown is medium.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }

    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Raw engine output for one text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScores {
    /// Score per candidate category.
    pub categories: Vec<(Category, f64)>,
    /// Detected sentiment.
    pub sentiment: Sentiment,
    /// Engine confidence in `sentiment`.
    pub sentiment_score: f64,
}

/// Classification of a single text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Highest-scoring category.
    pub label: Category,
    /// Score of `label`, in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Detected sentiment.
    pub sentiment: Sentiment,
    /// Priority derived from the sentiment.
    pub priority: Priority,
}

impl ClassificationResult {
    /// Reduces raw scores to a result.
    ///
    /// The label is the first category with the maximum score and the
    /// confidence is that maximum. Returns `None` when there are no scores.
    #[must_use]
    pub fn from_scores(raw: &RawScores) -> Option<Self> {
        let (label, confidence) = raw
            .categories
            .iter()
            .copied()
            .fold(None, |best: Option<(Category, f64)>, (category, score)| {
                match best {
                    Some((_, top)) if top >= score => best,
                    _ => Some((category, score)),
                }
            })?;

        Some(Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            sentiment: raw.sentiment,
            priority: Priority::derive(raw.sentiment, raw.sentiment_score),
        })
    }
}
