//! PostgreSQL-backed [`DefectRepository`].
//!
//! Indexed columns narrow each query; the remaining filter terms (free-text
//! search, repeat and SLA flags) run on the decoded records so listing
//! semantics match the in-memory adapter exactly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::DefectRow;
use super::pool::DbPool;
use super::schema::defect_records;
use crate::domain::{DefectId, ServerId};
use crate::domain::defects::{
    DefectFilter, DefectPage, DefectRecord, DefectStats, DefectStatsFilter, DefectStatus,
    PartCategory,
};
use crate::domain::ports::{DefectRepository, StoreError, entity};

/// Diesel-backed defect record reads.
#[derive(Clone)]
pub struct DieselDefectRepository {
    pool: DbPool,
}

impl DieselDefectRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_matching(
        &self,
        filter: &DefectFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<DefectRecord>, StoreError> {
        let mut query = defect_records::table
            .select(DefectRow::as_select())
            .order_by(defect_records::detected_at.desc())
            .into_boxed();
        if let Some(server_id) = filter.server_id {
            query = query.filter(defect_records::server_id.eq(*server_id.as_uuid()));
        }
        if !filter.statuses.is_empty() {
            let statuses: Vec<&str> = filter.statuses.iter().map(DefectStatus::as_str).collect();
            query = query.filter(defect_records::status.eq_any(statuses));
        }
        if let Some(category) = filter.category {
            query = query.filter(defect_records::category.eq(category.as_str()));
        }
        if let Some(from) = filter.detected_from {
            query = query.filter(defect_records::detected_at.ge(from));
        }
        if let Some(to) = filter.detected_to {
            query = query.filter(defect_records::detected_at.le(to));
        }

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<DefectRow> = query
            .load(&mut conn)
            .await
            .map_err(|error| map_diesel_error(error, entity::DEFECT))?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = row.into_domain()?;
            if filter.matches(&record, now) {
                records.push(record);
            }
        }
        debug!(matched = records.len(), "defect query loaded");
        Ok(records)
    }
}

#[async_trait]
impl DefectRepository for DieselDefectRepository {
    async fn find_by_id(&self, id: DefectId) -> Result<Option<DefectRecord>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<DefectRow> = defect_records::table
            .find(*id.as_uuid())
            .select(DefectRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| map_diesel_error(error, entity::DEFECT))?;
        row.map(DefectRow::into_domain).transpose()
    }

    async fn find_latest_finished(
        &self,
        server_id: ServerId,
        category: PartCategory,
        since: DateTime<Utc>,
    ) -> Result<Option<DefectRecord>, StoreError> {
        let finished = vec![DefectStatus::Resolved.as_str(), DefectStatus::Closed.as_str()];
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<DefectRow> = defect_records::table
            .filter(defect_records::server_id.eq(*server_id.as_uuid()))
            .filter(defect_records::category.eq(category.as_str()))
            .filter(defect_records::status.eq_any(finished))
            .filter(defect_records::detected_at.ge(since))
            .order_by(defect_records::detected_at.desc())
            .select(DefectRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| map_diesel_error(error, entity::DEFECT))?;
        row.map(DefectRow::into_domain).transpose()
    }

    async fn list(
        &self,
        filter: &DefectFilter,
        now: DateTime<Utc>,
    ) -> Result<DefectPage, StoreError> {
        let matching = self.load_matching(filter, now).await?;
        let total = matching.len();
        let limit = filter.effective_limit();
        let rows = matching
            .into_iter()
            .skip(filter.offset)
            .take(limit)
            .collect();
        Ok(DefectPage {
            rows,
            total,
            limit,
            offset: filter.offset,
        })
    }

    async fn stats(
        &self,
        filter: &DefectStatsFilter,
        now: DateTime<Utc>,
    ) -> Result<DefectStats, StoreError> {
        let records = self.load_matching(&filter.as_filter(), now).await?;
        Ok(DefectStats::collect(&records, now))
    }
}
