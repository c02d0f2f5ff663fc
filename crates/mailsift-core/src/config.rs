//! Runtime configuration from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use mailsift_gmail::ClientConfig;
use serde::Serialize;

use crate::classify::{
    ClassificationEngine, DEFAULT_HF_BASE_URL, DEFAULT_SENTIMENT_MODEL, DEFAULT_ZERO_SHOT_MODEL,
    HuggingFaceEngine, LexiconEngine,
};
use crate::ingest::DEFAULT_RECONCILE_LIMIT;
use crate::reply::{DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_URL, OpenAiGenerator, ReplyGenerator};
use crate::{Error, Result};

/// Default listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Default reconciliation interval in seconds.
pub const DEFAULT_RECONCILE_SECS: u64 = 300;

/// Default bound on external calls in seconds.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Service configuration.
///
/// Secrets are never serialized.
#[derive(Clone, Serialize)]
pub struct Config {
    /// `SQLite` database file.
    pub database_path: PathBuf,
    /// Gmail `OAuth2` access token.
    #[serde(skip)]
    pub gmail_access_token: Option<String>,
    /// Gmail mailbox owner.
    pub gmail_user: String,
    /// Gmail API endpoint.
    pub gmail_api_base: String,
    /// Pub/Sub topic for watch registration; `None` disables push.
    pub pubsub_topic: Option<String>,
    /// Reply generator API key; `None` disables drafting.
    #[serde(skip)]
    pub openai_api_key: Option<String>,
    /// Reply generator model.
    pub openai_model: String,
    /// Reply generator endpoint.
    pub openai_url: String,
    /// Hosted classifier token; `None` selects the local lexicon engine.
    #[serde(skip)]
    pub hf_api_token: Option<String>,
    /// Hosted classifier endpoint.
    pub hf_api_base: String,
    /// Hosted zero-shot model.
    pub hf_zero_shot_model: String,
    /// Hosted sentiment model.
    pub hf_sentiment_model: String,
    /// HTTP listen address.
    pub bind_addr: String,
    /// Reconciliation interval; `None` disables it.
    pub reconcile_interval: Option<Duration>,
    /// Messages listed per reconciliation pass.
    pub reconcile_limit: u32,
    /// Bound on each external call.
    pub call_timeout: Duration,
    /// Whether ingestion sends replies on its own.
    pub auto_reply: bool,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a value is malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a value is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let database_path = get("MAILSIFT_DATABASE").map_or_else(default_database_path, PathBuf::from);

        let bind_addr = match (get("MAILSIFT_BIND"), get("PORT")) {
            (Some(bind), _) => bind,
            (None, Some(port)) => format!("0.0.0.0:{}", parse::<u16>("PORT", &port)?),
            (None, None) => DEFAULT_BIND.to_string(),
        };

        let reconcile_secs = get("MAILSIFT_RECONCILE_SECS")
            .map(|v| parse::<u64>("MAILSIFT_RECONCILE_SECS", &v))
            .transpose()?
            .unwrap_or(DEFAULT_RECONCILE_SECS);

        let call_timeout_secs = get("MAILSIFT_CALL_TIMEOUT_SECS")
            .map(|v| parse::<u64>("MAILSIFT_CALL_TIMEOUT_SECS", &v))
            .transpose()?
            .unwrap_or(DEFAULT_CALL_TIMEOUT_SECS);
        if call_timeout_secs == 0 {
            return Err(Error::Config(
                "MAILSIFT_CALL_TIMEOUT_SECS must be positive".into(),
            ));
        }

        Ok(Self {
            database_path,
            gmail_access_token: get("GMAIL_ACCESS_TOKEN"),
            gmail_user: or("GMAIL_USER", "me"),
            gmail_api_base: or("GMAIL_API_BASE", mailsift_gmail::DEFAULT_BASE_URL),
            pubsub_topic: get("PUBSUB_TOPIC"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: or("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
            openai_url: or("OPENAI_URL", DEFAULT_OPENAI_URL),
            hf_api_token: get("HF_API_TOKEN"),
            hf_api_base: or("HF_API_BASE", DEFAULT_HF_BASE_URL),
            hf_zero_shot_model: or("HF_ZERO_SHOT_MODEL", DEFAULT_ZERO_SHOT_MODEL),
            hf_sentiment_model: or("HF_SENTIMENT_MODEL", DEFAULT_SENTIMENT_MODEL),
            bind_addr,
            reconcile_interval: (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs)),
            reconcile_limit: get("MAILSIFT_RECONCILE_LIMIT")
                .map(|v| parse::<u32>("MAILSIFT_RECONCILE_LIMIT", &v))
                .transpose()?
                .unwrap_or(DEFAULT_RECONCILE_LIMIT),
            call_timeout: Duration::from_secs(call_timeout_secs),
            auto_reply: get("MAILSIFT_AUTO_REPLY")
                .map(|v| parse_bool("MAILSIFT_AUTO_REPLY", &v))
                .transpose()?
                .unwrap_or(true),
        })
    }

    /// Gmail client settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no access token is configured.
    pub fn gmail_client_config(&self) -> Result<ClientConfig> {
        let token = self
            .gmail_access_token
            .as_deref()
            .ok_or_else(|| Error::Config("GMAIL_ACCESS_TOKEN is not set".into()))?;

        Ok(ClientConfig::new(token)
            .with_base_url(&self.gmail_api_base)
            .with_user(&self.gmail_user)
            .with_timeout(self.call_timeout))
    }

    /// The classification engine selected by the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::ClassificationUnavailable` if the hosted engine cannot
    /// be constructed.
    pub fn classification_engine(&self) -> Result<Arc<dyn ClassificationEngine>> {
        let engine: Arc<dyn ClassificationEngine> = match &self.hf_api_token {
            Some(token) => Arc::new(
                HuggingFaceEngine::new(token)?
                    .with_base_url(&self.hf_api_base)
                    .with_models(&self.hf_zero_shot_model, &self.hf_sentiment_model),
            ),
            None => Arc::new(LexiconEngine::new()),
        };
        Ok(engine)
    }

    /// The reply generator, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns `Error::GenerationFailed` if the generator cannot be constructed.
    pub fn reply_generator(&self) -> Result<Option<Arc<dyn ReplyGenerator>>> {
        let Some(key) = &self.openai_api_key else {
            return Ok(None);
        };
        let generator: Arc<dyn ReplyGenerator> = Arc::new(
            OpenAiGenerator::new(key)?
                .with_url(&self.openai_url)
                .with_model(&self.openai_model),
        );
        Ok(Some(generator))
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("gmail_user", &self.gmail_user)
            .field("pubsub_topic", &self.pubsub_topic)
            .field("openai_model", &self.openai_model)
            .field("hosted_classifier", &self.hf_api_token.is_some())
            .field("bind_addr", &self.bind_addr)
            .field("reconcile_interval", &self.reconcile_interval)
            .field("call_timeout", &self.call_timeout)
            .field("auto_reply", &self.auto_reply)
            .finish_non_exhaustive()
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailsift")
        .join("emails.db")
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{name} has invalid value {value:?}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{name} has invalid value {value:?}"))),
    }
}
