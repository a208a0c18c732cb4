//! PostgreSQL-backed [`HistorySink`].

use async_trait::async_trait;
use diesel_async::RunQueryDsl;

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::NewHistoryRow;
use super::pool::DbPool;
use super::schema::history_entries;
use crate::domain::history::HistoryEntry;
use crate::domain::ports::{HistorySink, HistorySinkError, StoreError};

fn to_sink_error(error: StoreError) -> HistorySinkError {
    if error.is_transient() {
        HistorySinkError::unavailable(error.to_string())
    } else {
        HistorySinkError::rejected(error.to_string())
    }
}

/// Appends history entries to the `history_entries` table.
#[derive(Clone)]
pub struct DieselHistorySink {
    pool: DbPool,
}

impl DieselHistorySink {
    /// Create a new sink with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistorySink for DieselHistorySink {
    async fn append(&self, entry: &HistoryEntry) -> Result<(), HistorySinkError> {
        let row = NewHistoryRow::from_domain(entry).map_err(to_sink_error)?;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|error| to_sink_error(map_pool_error(error)))?;
        diesel::insert_into(history_entries::table)
            .values(row)
            .execute(&mut conn)
            .await
            .map_err(|error| to_sink_error(map_diesel_error(error, "history entry")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for sink error translation.

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn connection_loss_is_retryable() {
        let error = to_sink_error(StoreError::connection("reset by peer"));

        assert!(error.is_transient());
    }

    #[rstest]
    fn query_failures_are_rejections() {
        let error = to_sink_error(StoreError::query("value too long"));

        assert!(matches!(error, HistorySinkError::Rejected { .. }));
    }
}
