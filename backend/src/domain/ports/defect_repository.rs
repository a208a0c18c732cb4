//! Port for reading defect records.
//!
//! Writes never go through this port; they are planned into a
//! [`UnitOfWork`](crate::domain::UnitOfWork) and committed by the
//! [`WorkflowStore`](super::WorkflowStore).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::StoreError;
use crate::domain::defects::{
    DefectFilter, DefectPage, DefectRecord, DefectStats, DefectStatsFilter, PartCategory,
};
use crate::domain::{DefectId, ServerId};

/// Read access to defect records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DefectRepository: Send + Sync {
    /// Find a record by id.
    async fn find_by_id(&self, id: DefectId) -> Result<Option<DefectRecord>, StoreError>;

    /// Most recently detected RESOLVED or CLOSED record for the server and
    /// part category detected at or after `since`.
    async fn find_latest_finished(
        &self,
        server_id: ServerId,
        category: PartCategory,
        since: DateTime<Utc>,
    ) -> Result<Option<DefectRecord>, StoreError>;

    /// One page of records matching the filter, newest detection first.
    async fn list(&self, filter: &DefectFilter, now: DateTime<Utc>)
    -> Result<DefectPage, StoreError>;

    /// Aggregate counts over the scoped records.
    async fn stats(
        &self,
        filter: &DefectStatsFilter,
        now: DateTime<Utc>,
    ) -> Result<DefectStats, StoreError>;
}

/// Fixture implementation for tests that do not exercise defect reads.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDefectRepository;

#[async_trait]
impl DefectRepository for FixtureDefectRepository {
    async fn find_by_id(&self, _id: DefectId) -> Result<Option<DefectRecord>, StoreError> {
        Ok(None)
    }

    async fn find_latest_finished(
        &self,
        _server_id: ServerId,
        _category: PartCategory,
        _since: DateTime<Utc>,
    ) -> Result<Option<DefectRecord>, StoreError> {
        Ok(None)
    }

    async fn list(
        &self,
        filter: &DefectFilter,
        _now: DateTime<Utc>,
    ) -> Result<DefectPage, StoreError> {
        Ok(DefectPage {
            rows: Vec::new(),
            total: 0,
            limit: filter.effective_limit(),
            offset: filter.offset,
        })
    }

    async fn stats(
        &self,
        _filter: &DefectStatsFilter,
        _now: DateTime<Utc>,
    ) -> Result<DefectStats, StoreError> {
        Ok(DefectStats::default())
    }
}
