//! Port for the append-only history log.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::history::HistoryEntry;

define_port_error! {
    /// Errors raised by history sink adapters.
    pub enum HistorySinkError {
        /// The sink could not be reached.
        Unavailable { message: String } [transient] =>
            "history sink unavailable: {message}",
        /// The sink refused the entry.
        Rejected { message: String } =>
            "history sink rejected entry: {message}",
    }
}

/// Fire-and-forget append of history facts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Append one entry.
    async fn append(&self, entry: &HistoryEntry) -> Result<(), HistorySinkError>;
}

/// Sink that discards every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureHistorySink;

#[async_trait]
impl HistorySink for FixtureHistorySink {
    async fn append(&self, _entry: &HistoryEntry) -> Result<(), HistorySinkError> {
        Ok(())
    }
}
