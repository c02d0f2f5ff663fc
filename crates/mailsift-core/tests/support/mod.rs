//! In-process collaborators for ingestion tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use mailsift_core::classify::{ClassifyError, RawScores};
use mailsift_core::ingest::Notification;
use mailsift_core::reply::GenerationError;
use mailsift_core::service::{
    FullMessage, HistoryDelta, MessageAdded, OutgoingMessage, ProviderError, SentMessage, WatchAck,
};
use mailsift_core::{
    Broadcaster, Category, ClassificationAdapter, ClassificationEngine, CursorState, CursorStore,
    HistoryId, IngestionEngine, MailboxProvider, NewRecord, ProcessedMessage, RecordStore,
    ReplyGenerator, ReplyOrchestrator, Sentiment,
};

pub const TIMEOUT: Duration = Duration::from_secs(30);

type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Pauses one message fetch until the test releases it.
#[derive(Default)]
pub struct FetchGate {
    /// Signalled once the fetch is waiting.
    pub entered: Notify,
    /// Signal to let the fetch finish.
    pub release: Notify,
}

/// Mailbox whose history is appended to by the test.
#[derive(Default)]
pub struct FakeMailbox {
    messages: Mutex<HashMap<String, FullMessage>>,
    history: Mutex<Vec<MessageAdded>>,
    inbox: Mutex<Vec<String>>,
    next_history: AtomicU32,
    failing_fetches: Mutex<HashSet<String>>,
    held_fetches: Mutex<HashMap<String, Arc<FetchGate>>>,
    pub delta_unavailable: AtomicBool,
    pub list_unavailable: AtomicBool,
    pub history_expired: AtomicBool,
    pub delta_calls: AtomicU32,
    pub fetches: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<OutgoingMessage>>,
}

impl FakeMailbox {
    pub fn new(start: u32) -> Arc<Self> {
        let mailbox = Self::default();
        mailbox.next_history.store(start, Ordering::SeqCst);
        Arc::new(mailbox)
    }

    /// Adds a message and a history event for it; returns the event position.
    pub fn deliver(&self, id: &str, subject: &str, body: &str) -> HistoryId {
        let message_id = format!("<{id}@mail.example.com>");
        self.messages.lock().unwrap().insert(
            id.to_string(),
            FullMessage {
                id: id.to_string(),
                thread_id: Some(format!("thread-{id}")),
                headers: [
                    ("From", "Dana <dana@example.com>"),
                    ("To", "me@example.com"),
                    ("Message-ID", message_id.as_str()),
                ]
                .into_iter()
                .collect(),
                subject: subject.to_string(),
                body: body.to_string(),
                snippet: String::new(),
                received_at: None,
            },
        );
        self.inbox.lock().unwrap().insert(0, id.to_string());
        self.add_event(id)
    }

    /// Records another history event for an existing message.
    pub fn add_event(&self, id: &str) -> HistoryId {
        let history_id = HistoryId(u64::from(self.next_history.fetch_add(1, Ordering::SeqCst) + 1));
        self.history.lock().unwrap().push(MessageAdded {
            history_id,
            message_id: id.to_string(),
        });
        history_id
    }

    pub fn current(&self) -> HistoryId {
        HistoryId(u64::from(self.next_history.load(Ordering::SeqCst)))
    }

    pub fn fail_fetch(&self, id: &str, failing: bool) {
        let mut failing_fetches = self.failing_fetches.lock().unwrap();
        if failing {
            failing_fetches.insert(id.to_string());
        } else {
            failing_fetches.remove(id);
        }
    }

    /// Makes the next fetch of `id` wait on the returned gate.
    pub fn hold_fetch(&self, id: &str) -> Arc<FetchGate> {
        let gate = Arc::new(FetchGate::default());
        self.held_fetches
            .lock()
            .unwrap()
            .insert(id.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn fetch_count(&self, id: &str) -> usize {
        self.fetches.lock().unwrap().iter().filter(|f| *f == id).count()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MailboxProvider for FakeMailbox {
    async fn list_message_ids(&self, _query: &str, limit: u32) -> ProviderResult<Vec<String>> {
        if self.list_unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("listing unavailable".into()));
        }
        let inbox = self.inbox.lock().unwrap();
        Ok(inbox.iter().take(limit as usize).cloned().collect())
    }

    async fn get_full_message(&self, id: &str) -> ProviderResult<FullMessage> {
        self.fetches.lock().unwrap().push(id.to_string());
        let held = self.held_fetches.lock().unwrap().remove(id);
        if let Some(gate) = held {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.failing_fetches.lock().unwrap().contains(id) {
            return Err(ProviderError::Unavailable(format!("fetch of {id} failed")));
        }
        self.messages
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::Unavailable(format!("{id} not found")))
    }

    async fn get_history_delta(&self, start: HistoryId) -> ProviderResult<HistoryDelta> {
        self.delta_calls.fetch_add(1, Ordering::SeqCst);
        if self.delta_unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("history unavailable".into()));
        }
        if self.history_expired.load(Ordering::SeqCst) {
            return Err(ProviderError::HistoryExpired(start.to_string()));
        }
        let events = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.history_id > start)
            .cloned()
            .collect();
        Ok(HistoryDelta {
            events,
            high_water: Some(self.current()),
        })
    }

    async fn send(&self, message: OutgoingMessage) -> ProviderResult<SentMessage> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message);
        Ok(SentMessage {
            id: format!("reply-{}", sent.len()),
        })
    }

    async fn register_watch(&self, _topic: &str) -> ProviderResult<WatchAck> {
        Ok(WatchAck {
            history_id: self.current(),
            expiration_ms: None,
        })
    }
}

/// Classifier that labels texts by keyword.
pub struct KeywordEngine {
    rules: Vec<(&'static str, Category, f64)>,
    pub calls: AtomicU32,
}

impl KeywordEngine {
    /// Texts matching no rule are `personal` at 0.5; `poison` fails.
    pub fn new(rules: Vec<(&'static str, Category, f64)>) -> Arc<Self> {
        Arc::new(Self {
            rules,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl ClassificationEngine for KeywordEngine {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn score(&self, texts: &[String]) -> std::result::Result<Vec<RawScores>, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts
            .iter()
            .map(|text| {
                if text.contains("poison") {
                    return Err(ClassifyError::Unavailable("model crashed".into()));
                }
                let (label, confidence) = self
                    .rules
                    .iter()
                    .find(|(needle, _, _)| text.contains(needle))
                    .map_or((Category::Personal, 0.5), |(_, label, confidence)| {
                        (*label, *confidence)
                    });
                Ok(RawScores {
                    categories: vec![(label, confidence)],
                    sentiment: Sentiment::Neutral,
                    sentiment_score: 0.5,
                })
            })
            .collect()
    }
}

/// Generator that replays a script, then keeps answering with `fallback`.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<std::result::Result<String, GenerationError>>>,
    fallback: Option<String>,
    pub calls: AtomicU32,
}

impl ScriptedGenerator {
    pub fn replying(text: &str) -> Arc<Self> {
        Self::scripted(Vec::new(), Some(text))
    }

    pub fn always_rate_limited() -> Arc<Self> {
        Self::scripted(Vec::new(), None)
    }

    pub fn scripted(
        script: Vec<std::result::Result<String, GenerationError>>,
        fallback: Option<&str>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback: fallback.map(str::to_string),
            calls: AtomicU32::new(0),
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplyGenerator for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(
        &self,
        _content: &str,
        _label: Category,
    ) -> std::result::Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        self.fallback.clone().ok_or(GenerationError::RateLimited)
    }
}

/// Record and cursor store kept in memory, counting saves per message.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, ProcessedMessage>>,
    saves: Mutex<HashMap<String, usize>>,
    cursors: Mutex<HashMap<String, CursorState>>,
    persist_cursor: bool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            persist_cursor: true,
            ..Self::default()
        })
    }

    /// A store that forgets the cursor, as after a restart without persistence.
    pub fn without_cursor() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn save_count(&self, message_id: &str) -> usize {
        self.saves
            .lock()
            .unwrap()
            .get(message_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn max_saves(&self) -> usize {
        self.saves.lock().unwrap().values().copied().max().unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn exists(&self, message_id: &str) -> mailsift_core::Result<bool> {
        Ok(self.records.lock().unwrap().contains_key(message_id))
    }

    async fn save(&self, record: NewRecord) -> mailsift_core::Result<ProcessedMessage> {
        *self
            .saves
            .lock()
            .unwrap()
            .entry(record.message_id.clone())
            .or_default() += 1;

        // Yield so concurrent invocations interleave between check and save.
        tokio::task::yield_now().await;

        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.message_id) {
            return Err(mailsift_core::Error::DuplicateRecord(record.message_id));
        }
        let stored = ProcessedMessage {
            id: i64::try_from(records.len()).unwrap() + 1,
            message_id: record.message_id.clone(),
            subject: record.subject,
            raw_body: record.raw_body,
            normalized_text: record.normalized_text,
            model_text: record.model_text,
            predicted_label: record.classification.label,
            confidence: record.classification.confidence,
            sentiment: record.classification.sentiment,
            priority: record.classification.priority,
            received_at: record.received_at,
        };
        records.insert(record.message_id, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    async fn load_cursor(&self, mailbox: &str) -> mailsift_core::Result<Option<CursorState>> {
        Ok(self.cursors.lock().unwrap().get(mailbox).cloned())
    }

    async fn store_cursor(&self, mailbox: &str, state: &CursorState) -> mailsift_core::Result<()> {
        if self.persist_cursor {
            self.cursors
                .lock()
                .unwrap()
                .insert(mailbox.to_string(), state.clone());
        }
        Ok(())
    }
}

/// Everything an ingestion test needs.
pub struct Harness {
    pub mailbox: Arc<FakeMailbox>,
    pub store: Arc<MemoryStore>,
    pub classifier: Arc<KeywordEngine>,
    pub generator: Arc<ScriptedGenerator>,
    pub broadcaster: Broadcaster,
    pub engine: IngestionEngine,
}

impl Harness {
    pub async fn new(
        rules: Vec<(&'static str, Category, f64)>,
        generator: Arc<ScriptedGenerator>,
    ) -> Self {
        let harness = Self::build(FakeMailbox::new(100), MemoryStore::new(), rules, generator).await;
        harness.engine.prime(HistoryId(100)).await.unwrap();
        harness
    }

    pub async fn build(
        mailbox: Arc<FakeMailbox>,
        store: Arc<MemoryStore>,
        rules: Vec<(&'static str, Category, f64)>,
        generator: Arc<ScriptedGenerator>,
    ) -> Self {
        let classifier = KeywordEngine::new(rules);
        let broadcaster = Broadcaster::new(64);
        let replies = ReplyOrchestrator::new(mailbox.clone(), TIMEOUT).with_generator(generator.clone());
        let engine = IngestionEngine::new(
            mailbox.clone(),
            ClassificationAdapter::new(classifier.clone(), TIMEOUT),
            store.clone(),
            store.clone(),
            broadcaster.clone(),
            "me",
        )
        .await
        .unwrap()
        .with_replies(replies);

        Self {
            mailbox,
            store,
            classifier,
            generator,
            broadcaster,
            engine,
        }
    }
}

/// A notification carrying `history_id`.
pub fn notification(history_id: HistoryId) -> Notification {
    Notification {
        history_id,
        email_address: Some("me@example.com".to_string()),
        delivery_id: None,
    }
}
