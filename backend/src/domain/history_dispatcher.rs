//! Bounded background delivery of history entries.
//!
//! Services hand their committed history to [`HistoryDispatcher::dispatch`],
//! which never blocks and never fails. One worker task drains the queue and
//! appends each entry to the [`HistorySink`], retrying transient failures
//! with exponential backoff. Entries that still cannot be written, or that
//! arrive while the queue is full, are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::history::HistoryEntry;
use crate::domain::ports::HistorySink;

/// Queue and retry settings for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryDispatcherConfig {
    /// Entries held before new ones are dropped.
    pub capacity: usize,
    /// Append attempts per entry, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any retry delay.
    pub max_backoff: Duration,
}

impl Default for HistoryDispatcherConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl HistoryDispatcherConfig {
    fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(exponent)
            .min(self.max_backoff)
    }
}

enum Command {
    Append(HistoryEntry),
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle onto the history worker.
#[derive(Debug, Clone)]
pub struct HistoryDispatcher {
    sender: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Append(entry) => f.debug_tuple("Append").field(&entry.action).finish(),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl HistoryDispatcher {
    /// Start the worker on the current Tokio runtime.
    ///
    /// The worker stops once every handle has been dropped and the queue is
    /// drained.
    pub fn spawn(
        sink: Arc<dyn HistorySink>,
        config: HistoryDispatcherConfig,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let worker = tokio::spawn(run_worker(sink, config, receiver));
        (Self { sender }, worker)
    }

    /// Queue entries for delivery without waiting.
    pub fn dispatch(&self, entries: impl IntoIterator<Item = HistoryEntry>) {
        for entry in entries {
            match self.sender.try_send(Command::Append(entry)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(Command::Append(entry))) => {
                    warn!(
                        entity_type = %entry.entity_type,
                        entity_id = %entry.entity_id,
                        action = %entry.action,
                        "HistoryWriteFailed: history queue full, entry dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_) | mpsc::error::TrySendError::Full(_)) => {
                    warn!("HistoryWriteFailed: history worker stopped, entry dropped");
                }
            }
        }
    }

    /// Wait until every entry queued before this call has been handled.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Command::Flush(done)).await.is_err() {
            return;
        }
        // A dropped acknowledgement means the worker has already stopped.
        let _ = wait.await;
    }
}

async fn run_worker(
    sink: Arc<dyn HistorySink>,
    config: HistoryDispatcherConfig,
    mut receiver: mpsc::Receiver<Command>,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Append(entry) => deliver(sink.as_ref(), &config, &entry).await,
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("history worker stopped");
}

async fn deliver(sink: &dyn HistorySink, config: &HistoryDispatcherConfig, entry: &HistoryEntry) {
    let max_attempts = config.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match sink.append(entry).await {
            Ok(()) => return,
            Err(error) if error.is_transient() && attempt < max_attempts => {
                debug!(%error, attempt, "history append failed, retrying");
                tokio::time::sleep(config.retry_delay(attempt)).await;
            }
            Err(error) => {
                warn!(
                    %error,
                    attempts = attempt,
                    entity_type = %entry.entity_type,
                    entity_id = %entry.entity_id,
                    action = %entry.action,
                    "HistoryWriteFailed: history entry dropped"
                );
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::UserId;
    use crate::domain::history::{HistoryAction, HistoryEntityType};
    use crate::domain::ports::{HistorySinkError, MockHistorySink};

    #[fixture]
    fn entry() -> HistoryEntry {
        let at = Utc
            .with_ymd_and_hms(2026, 5, 4, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        HistoryEntry::new(
            HistoryEntityType::DefectRecord,
            uuid::Uuid::new_v4(),
            HistoryAction::Created,
            UserId::random(),
            at,
        )
    }

    fn fast_config(max_attempts: u32) -> HistoryDispatcherConfig {
        HistoryDispatcherConfig {
            capacity: 8,
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<HistoryEntry>>,
    }

    #[async_trait]
    impl HistorySink for RecordingSink {
        async fn append(&self, entry: &HistoryEntry) -> Result<(), HistorySinkError> {
            self.entries
                .lock()
                .expect("entries mutex")
                .push(entry.clone());
            Ok(())
        }
    }

    #[rstest]
    #[tokio::test]
    async fn dispatched_entries_reach_the_sink(entry: HistoryEntry) {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, _worker) = HistoryDispatcher::spawn(sink.clone(), fast_config(3));

        dispatcher.dispatch([entry.clone(), entry.clone()]);
        dispatcher.flush().await;

        assert_eq!(sink.entries.lock().expect("entries mutex").len(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn transient_failures_are_retried(entry: HistoryEntry) {
        let mut sink = MockHistorySink::new();
        let mut seq = mockall::Sequence::new();
        sink.expect_append()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(HistorySinkError::unavailable("db restarting")));
        sink.expect_append()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let (dispatcher, _worker) = HistoryDispatcher::spawn(Arc::new(sink), fast_config(3));

        dispatcher.dispatch([entry]);
        dispatcher.flush().await;
    }

    #[rstest]
    #[tokio::test]
    async fn rejected_entries_are_not_retried(entry: HistoryEntry) {
        let mut sink = MockHistorySink::new();
        sink.expect_append()
            .times(1)
            .returning(|_| Err(HistorySinkError::rejected("payload too large")));
        let (dispatcher, _worker) = HistoryDispatcher::spawn(Arc::new(sink), fast_config(5));

        dispatcher.dispatch([entry]);
        dispatcher.flush().await;
    }

    #[rstest]
    #[tokio::test]
    async fn retries_stop_at_max_attempts(entry: HistoryEntry) {
        let mut sink = MockHistorySink::new();
        sink.expect_append()
            .times(2)
            .returning(|_| Err(HistorySinkError::unavailable("down")));
        let (dispatcher, _worker) = HistoryDispatcher::spawn(Arc::new(sink), fast_config(2));

        dispatcher.dispatch([entry]);
        dispatcher.flush().await;
    }

    #[rstest]
    #[tokio::test]
    async fn worker_stops_when_handles_drop(entry: HistoryEntry) {
        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, worker) = HistoryDispatcher::spawn(sink.clone(), fast_config(1));

        dispatcher.dispatch([entry]);
        drop(dispatcher);
        worker.await.expect("worker exits cleanly");

        assert_eq!(sink.entries.lock().expect("entries mutex").len(), 1);
    }

    #[rstest]
    #[case(1, 10)]
    #[case(2, 20)]
    #[case(3, 40)]
    #[case(6, 100)]
    fn retry_delay_doubles_up_to_the_cap(#[case] attempt: u32, #[case] millis: u64) {
        let config = HistoryDispatcherConfig {
            capacity: 1,
            max_attempts: 10,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
        };
        assert_eq!(config.retry_delay(attempt), Duration::from_millis(millis));
    }
}
