//! `mailsift` - push-driven Gmail ingestion service
//!
//! Receives Pub/Sub change notifications, classifies and stores new inbox
//! messages, streams them to live subscribers and answers the repliable ones.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod routes;
mod tasks;

use std::sync::Arc;

use anyhow::Context;
use mailsift_core::{
    Broadcaster, ClassificationAdapter, Config, GmailMailbox, IngestionEngine, MailboxProvider,
    RecordRepository, ReplyOrchestrator,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsift=info,mailsift_core=info,mailsift_gmail=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting mailsift");

    let config = Config::from_env().context("invalid configuration")?;
    debug!(?config, "Loaded configuration");

    if let Some(dir) = config.database_path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let database = config.database_path.to_string_lossy();
    let records = Arc::new(
        RecordRepository::new(&database)
            .await
            .with_context(|| format!("failed to open database {database}"))?,
    );

    let provider: Arc<dyn MailboxProvider> =
        Arc::new(GmailMailbox::new(config.gmail_client_config()?)?);
    let classifier =
        ClassificationAdapter::new(config.classification_engine()?, config.call_timeout);
    let broadcaster = Broadcaster::default();

    let mut replies = ReplyOrchestrator::new(Arc::clone(&provider), config.call_timeout)
        .with_auto_send(config.auto_reply);
    match config.reply_generator()? {
        Some(generator) => {
            info!(generator = generator.name(), auto_send = config.auto_reply, "Reply generation enabled");
            replies = replies.with_generator(generator);
        }
        None => warn!("OPENAI_API_KEY is not set; drafting and auto-reply are disabled"),
    }

    let engine = Arc::new(
        IngestionEngine::new(
            Arc::clone(&provider),
            classifier,
            records.clone(),
            records,
            broadcaster.clone(),
            config.gmail_user.as_str(),
        )
        .await?
        .with_replies(replies.clone())
        .with_timeout(config.call_timeout)
        .with_reconcile_limit(config.reconcile_limit),
    );

    match &config.pubsub_topic {
        Some(topic) => {
            tasks::spawn_watch_renewal(Arc::clone(&engine), topic.clone());
        }
        None => info!("PUBSUB_TOPIC is not set; relying on pull and reconciliation"),
    }
    if let Some(every) = config.reconcile_interval {
        tasks::spawn_reconciler(Arc::clone(&engine), every, config.reconcile_limit);
    }

    let app = routes::router(AppState::new(engine, replies, broadcaster));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopped mailsift");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
