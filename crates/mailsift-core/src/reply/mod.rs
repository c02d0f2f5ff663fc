//! Automated replies.
//!
//! A message is first checked against the reply policy ([`is_repliable`],
//! [`should_auto_send`]); qualifying messages get generated text, retried
//! only on rate limiting, which is cleaned of markdown and sent as a
//! threaded reply through the mailbox provider.

mod compose;
mod generate;
mod openai;
mod orchestrator;
mod policy;

pub use compose::compose_reply;
pub use generate::{
    GenerationError, MAX_ATTEMPTS, RATE_LIMIT_BACKOFF, ReplyGenerator, generate_with_retry,
};
pub use openai::{DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_URL, OpenAiGenerator};
pub use orchestrator::{ReplyDraft, ReplyOrchestrator};
pub use policy::{
    AUTO_SEND_CATEGORIES, FALLBACK_DRAFT, OPT_OUT_PHRASES, REPLY_CONFIDENCE_THRESHOLD,
    is_repliable, rejection_reason, should_auto_send, tone,
};
