//! Hosted inference engine (Hugging Face Inference API).
//!
//! Two models are queried per text: a zero-shot classifier over the
//! candidate categories and a binary sentiment model.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::adapter::{ClassificationEngine, ClassifyError};
use super::model::{Category, RawScores, Sentiment};

/// Default inference endpoint.
pub const DEFAULT_HF_BASE_URL: &str = "https://api-inference.huggingface.co";

/// Default zero-shot classification model.
pub const DEFAULT_ZERO_SHOT_MODEL: &str = "valhalla/distilbart-mnli-12-1";

/// Default sentiment model.
pub const DEFAULT_SENTIMENT_MODEL: &str = "distilbert-base-uncased-finetuned-sst-2-english";

#[derive(Debug, Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters,
}

#[derive(Debug, Serialize)]
struct ZeroShotParameters {
    candidate_labels: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ZeroShotResponse {
    labels: Vec<String>,
    scores: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// The sentiment pipeline answers either `[[...]]` or `[...]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SentimentResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

/// Classification engine backed by hosted models.
#[derive(Debug, Clone)]
pub struct HuggingFaceEngine {
    http: reqwest::Client,
    base_url: String,
    token: String,
    zero_shot_model: String,
    sentiment_model: String,
}

impl HuggingFaceEngine {
    /// Creates an engine using the default endpoint and models.
    ///
    /// # Errors
    ///
    /// Returns `ClassifyError::Unavailable` if the token is empty or the
    /// HTTP client cannot be built.
    pub fn new(token: impl Into<String>) -> Result<Self, ClassifyError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ClassifyError::Unavailable("inference token is empty".into()));
        }
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url: DEFAULT_HF_BASE_URL.to_string(),
            token,
            zero_shot_model: DEFAULT_ZERO_SHOT_MODEL.to_string(),
            sentiment_model: DEFAULT_SENTIMENT_MODEL.to_string(),
        })
    }

    /// Overrides the inference endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the zero-shot and sentiment models.
    #[must_use]
    pub fn with_models(
        mut self,
        zero_shot_model: impl Into<String>,
        sentiment_model: impl Into<String>,
    ) -> Self {
        self.zero_shot_model = zero_shot_model.into();
        self.sentiment_model = sentiment_model.into();
        self
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/models/{model}", self.base_url)
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        model: &str,
        body: &B,
    ) -> Result<T, ClassifyError> {
        let response = self
            .http
            .post(self.model_url(model))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClassifyError::Unavailable(format!(
                "{model} returned {status}: {text}"
            )));
        }
        serde_json::from_str(&text)
            .map_err(|e| ClassifyError::Unavailable(format!("{model} returned bad JSON: {e}")))
    }

    async fn score_one(&self, text: &str) -> Result<RawScores, ClassifyError> {
        let request = ZeroShotRequest {
            inputs: text,
            parameters: ZeroShotParameters {
                candidate_labels: Category::CANDIDATES.iter().map(Category::as_str).collect(),
            },
        };
        let zero_shot: ZeroShotResponse = self.post(&self.zero_shot_model, &request).await?;
        let sentiment: SentimentResponse = self
            .post(&self.sentiment_model, &TextRequest { inputs: text })
            .await?;

        let (sentiment, sentiment_score) = top_sentiment(sentiment);
        Ok(RawScores {
            categories: category_scores(&zero_shot),
            sentiment,
            sentiment_score,
        })
    }
}

/// Pairs zero-shot labels with their scores, ignoring unknown labels.
fn category_scores(response: &ZeroShotResponse) -> Vec<(Category, f64)> {
    response
        .labels
        .iter()
        .zip(&response.scores)
        .map(|(label, &score)| (Category::parse(label), score))
        .filter(|(category, _)| *category != Category::Unknown)
        .collect()
}

/// Picks the highest-scoring sentiment label.
fn top_sentiment(response: SentimentResponse) -> (Sentiment, f64) {
    let labels: Vec<LabelScore> = match response {
        SentimentResponse::Nested(nested) => nested.into_iter().flatten().collect(),
        SentimentResponse::Flat(flat) => flat,
    };
    labels
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map_or((Sentiment::Neutral, 0.0), |best| {
            (Sentiment::parse(&best.label), best.score)
        })
}

#[async_trait]
impl ClassificationEngine for HuggingFaceEngine {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    async fn score(&self, texts: &[String]) -> Result<Vec<RawScores>, ClassifyError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.score_one(text).await?);
        }
        debug!(count = out.len(), model = %self.zero_shot_model, "Scored texts");
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_shot_response_mapping() {
        let response: ZeroShotResponse = serde_json::from_str(
            r#"{"sequence": "x", "labels": ["spam", "business", "mystery"], "scores": [0.7, 0.2, 0.1]}"#,
        )
        .unwrap();
        assert_eq!(
            category_scores(&response),
            vec![(Category::Spam, 0.7), (Category::Business, 0.2)]
        );
    }

    #[test]
    fn test_sentiment_nested_and_flat() {
        let nested: SentimentResponse = serde_json::from_str(
            r#"[[{"label": "POSITIVE", "score": 0.1}, {"label": "NEGATIVE", "score": 0.9}]]"#,
        )
        .unwrap();
        assert_eq!(top_sentiment(nested), (Sentiment::Negative, 0.9));

        let flat: SentimentResponse =
            serde_json::from_str(r#"[{"label": "POSITIVE", "score": 0.95}]"#).unwrap();
        assert_eq!(top_sentiment(flat), (Sentiment::Positive, 0.95));

        let empty: SentimentResponse = serde_json::from_str("[]").unwrap();
        assert_eq!(top_sentiment(empty), (Sentiment::Neutral, 0.0));
    }

    #[test]
    fn test_rejects_empty_token() {
        assert!(HuggingFaceEngine::new("").is_err());
    }

    #[test]
    fn test_model_url() {
        let engine = HuggingFaceEngine::new("hf_token")
            .unwrap()
            .with_base_url("http://localhost:8080/");
        assert_eq!(
            engine.model_url("org/model"),
            "http://localhost:8080/models/org/model"
        );
    }
}
