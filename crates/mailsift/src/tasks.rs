//! Background work: watch registration and periodic reconciliation.

use std::sync::Arc;
use std::time::Duration;

use mailsift_core::IngestionEngine;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Gmail watches expire after seven days; renew well before that.
pub const WATCH_RENEWAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Registers the watch now and every [`WATCH_RENEWAL`] after.
pub fn spawn_watch_renewal(engine: Arc<IngestionEngine>, topic: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(WATCH_RENEWAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = engine.register_watch(&topic).await {
                warn!(topic = %topic, error = %e, "Watch registration failed");
            }
        }
    })
}

/// Runs a pull every `every` to catch messages automatic ingestion missed.
pub fn spawn_reconciler(engine: Arc<IngestionEngine>, every: Duration, limit: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match engine.pull(limit).await {
                Ok(report) if report.processed.is_empty() && report.failed.is_empty() => {
                    debug!(skipped = report.skipped.len(), "Reconciliation found nothing new");
                }
                Ok(report) => info!(
                    processed = report.processed.len(),
                    skipped = report.skipped.len(),
                    failed = report.failed.len(),
                    "Reconciliation pass complete"
                ),
                Err(e) => warn!(error = %e, "Reconciliation pass failed"),
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;

    use mailsift_core::Error;

    use super::*;
    use crate::routes::tests::{StubMailbox, engine_with, engine_with_timeout};

    #[tokio::test]
    async fn test_watch_renewal_registers_and_primes() {
        let mailbox = StubMailbox::new();
        let engine = engine_with(mailbox.clone()).await;

        let handle = spawn_watch_renewal(Arc::clone(&engine), "projects/p/topics/t".into());
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(
            engine.cursor_state().await.position.map(|h| h.0),
            Some(42)
        );
        assert_eq!(
            mailbox.watched.lock().unwrap().as_slice(),
            ["projects/p/topics/t"]
        );
    }

    #[tokio::test]
    async fn test_stalled_watch_registration_times_out() {
        let mailbox = StubMailbox::new();
        mailbox.stall_watch.store(true, Ordering::SeqCst);
        let engine = engine_with_timeout(mailbox.clone(), Duration::from_millis(20)).await;

        let err = engine.register_watch("projects/p/topics/t").await.unwrap_err();

        assert!(matches!(
            err,
            Error::Timeout {
                operation: "watch registration"
            }
        ));
        assert_eq!(engine.cursor_state().await.position, None);
    }

    #[tokio::test]
    async fn test_reconciler_pulls_on_interval() {
        let mailbox = StubMailbox::new();
        let engine = engine_with(mailbox.clone()).await;

        let handle = spawn_reconciler(Arc::clone(&engine), Duration::from_millis(20), 5);
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        assert!(mailbox.listed.load(Ordering::SeqCst) >= 1);
        assert_eq!(engine.cursor_state().await.position, None);
    }
}
