//! Deferred retry of an acquisition while connectivity is down.
//!
//! Resending the location request helps on devices that only bring wifi up
//! while the screen is on: the first attempt races the reassociation, so a
//! couple of short deferrals catch connectivity coming back. The retry state
//! is persisted before the wake timer is armed, so a request survives the
//! owning process being killed and replayed later.

use std::sync::Arc;
use std::time::Duration;

use geofix_store::{LocationStore, RetryState};
use tokio::sync::mpsc::UnboundedSender;

use crate::service::Msg;
use crate::types::Command;

/// Minimum delay before a retry fires.
pub const RETRY_MIN_DELAY: Duration = Duration::from_secs(10);
/// Slack on top of the minimum delay tolerated for platform-level coalescing
/// of deferred work; a retry must fire within `[min, min + slack]`.
pub const RETRY_DEADLINE_SLACK: Duration = Duration::from_secs(5);
/// Attempts beyond this count abandon the acquisition as not reachable.
pub const MAX_RETRY_ATTEMPTS: u32 = 2;

/// Parameters replayed to the orchestrator when a retry fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryRequest {
    pub by_last_location_only: bool,
    pub attempts: u32,
}

/// Durable, at-least-once deferred execution of a retry request.
pub trait DeferredScheduler: Send + Sync {
    fn schedule(&self, request: RetryRequest);
}

/// Tokio-backed scheduler. The request is written through the store before
/// the wake timer is armed; [`TokioRetryScheduler::resume_persisted`] replays
/// anything found there after a restart.
pub struct TokioRetryScheduler {
    store: Arc<LocationStore>,
    commands: UnboundedSender<Msg>,
}

impl TokioRetryScheduler {
    pub fn new(store: Arc<LocationStore>, commands: UnboundedSender<Msg>) -> Self {
        Self { store, commands }
    }

    /// Replay a retry request persisted by a previous process instance.
    /// The minimum delay is assumed to have elapsed while we were gone.
    pub fn resume_persisted(&self) {
        match self.store.load_retry_state() {
            Ok(Some(state)) => {
                tracing::info!(attempts = state.attempts, "resuming persisted location retry");
                let _ = self.commands.send(Msg::Command(Command::LocationUpdateRetry {
                    by_last_location_only: state.by_last_location_only,
                    attempts: state.attempts,
                }));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("failed to read persisted retry state: {e:#}"),
        }
    }
}

impl DeferredScheduler for TokioRetryScheduler {
    fn schedule(&self, request: RetryRequest) {
        if let Err(e) = self.store.save_retry_state(RetryState {
            by_last_location_only: request.by_last_location_only,
            attempts: request.attempts,
        }) {
            tracing::warn!("failed to persist retry state: {e:#}");
        }

        let commands = self.commands.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RETRY_MIN_DELAY).await;
            tracing::debug!(attempts = request.attempts, "deferred location retry firing");
            let _ = commands.send(Msg::Command(Command::LocationUpdateRetry {
                by_last_location_only: request.by_last_location_only,
                attempts: request.attempts,
            }));
        });
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_retry_fires_inside_deadline_window() {
        let store = Arc::new(LocationStore::in_memory().unwrap());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = TokioRetryScheduler::new(store.clone(), tx);

        let started = tokio::time::Instant::now();
        scheduler.schedule(RetryRequest { by_last_location_only: false, attempts: 1 });

        let msg = rx.recv().await.expect("retry command");
        let elapsed = started.elapsed();
        assert!(elapsed >= RETRY_MIN_DELAY, "fired too early: {elapsed:?}");
        assert!(
            elapsed <= RETRY_MIN_DELAY + RETRY_DEADLINE_SLACK,
            "fired too late: {elapsed:?}"
        );
        assert_eq!(
            msg,
            Msg::Command(Command::LocationUpdateRetry {
                by_last_location_only: false,
                attempts: 1
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_persisted_before_firing() {
        let store = Arc::new(LocationStore::in_memory().unwrap());
        let (tx, _rx) = mpsc::unbounded_channel();
        let scheduler = TokioRetryScheduler::new(store.clone(), tx);

        scheduler.schedule(RetryRequest { by_last_location_only: true, attempts: 2 });

        // Visible immediately, before the timer fires: this is what survives
        // a process kill between scheduling and firing.
        let state = store.load_retry_state().unwrap().expect("persisted state");
        assert!(state.by_last_location_only);
        assert_eq!(state.attempts, 2);
    }

    #[tokio::test]
    async fn test_resume_persisted_replays_request() {
        let store = Arc::new(LocationStore::in_memory().unwrap());
        store
            .save_retry_state(RetryState { by_last_location_only: false, attempts: 2 })
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = TokioRetryScheduler::new(store, tx);
        scheduler.resume_persisted();

        let msg = rx.recv().await.expect("replayed command");
        assert_eq!(
            msg,
            Msg::Command(Command::LocationUpdateRetry {
                by_last_location_only: false,
                attempts: 2
            })
        );
    }
}
