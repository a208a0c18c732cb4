//! History sink that keeps entries in memory.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::history::{HistoryAction, HistoryEntry};
use crate::domain::ports::{HistorySink, HistorySinkError};

/// Records every appended entry; can be told to reject appends.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistorySink {
    entries: Arc<Mutex<Vec<HistoryEntry>>>,
    unavailable: Arc<Mutex<bool>>,
}

impl InMemoryHistorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later append fail as unavailable, or recover.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut flag) = self.unavailable.lock() {
            *flag = unavailable;
        }
    }

    /// Entries appended so far.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Actions appended so far, in order.
    pub fn actions(&self) -> Vec<HistoryAction> {
        self.entries().into_iter().map(|entry| entry.action).collect()
    }
}

#[async_trait]
impl HistorySink for InMemoryHistorySink {
    async fn append(&self, entry: &HistoryEntry) -> Result<(), HistorySinkError> {
        let unavailable = self
            .unavailable
            .lock()
            .map(|flag| *flag)
            .map_err(|_| HistorySinkError::rejected("history flag lock poisoned"))?;
        if unavailable {
            return Err(HistorySinkError::unavailable("in-memory sink switched off"));
        }
        self.entries
            .lock()
            .map_err(|_| HistorySinkError::rejected("history lock poisoned"))?
            .push(entry.clone());
        Ok(())
    }
}
