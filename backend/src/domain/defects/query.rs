//! Filters and aggregates for defect queries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::classification::PartCategory;
use super::record::DefectRecord;
use super::status::DefectStatus;
use crate::domain::{ServerId, UserId};

/// Default page size for defect listings.
pub const DEFAULT_PAGE_LIMIT: usize = 50;
/// Largest page size a caller may request.
pub const MAX_PAGE_LIMIT: usize = 500;

/// Filter for listing defect records, newest detection first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefectFilter {
    /// Only this server.
    pub server_id: Option<ServerId>,
    /// Only these statuses (any of).
    pub statuses: Vec<DefectStatus>,
    /// Only this part category.
    pub category: Option<PartCategory>,
    /// Only records diagnosed by this user.
    pub diagnostician: Option<UserId>,
    /// Only repeated (or only non-repeated) defects.
    pub repeated: Option<bool>,
    /// Only records whose SLA deadline has passed unfinished.
    pub sla_breached: Option<bool>,
    /// Detected at or after.
    pub detected_from: Option<DateTime<Utc>>,
    /// Detected at or before.
    pub detected_to: Option<DateTime<Utc>>,
    /// Case-insensitive search over ticket number, description, and serials.
    pub search: Option<String>,
    /// Page size; defaults to [`DEFAULT_PAGE_LIMIT`], capped at [`MAX_PAGE_LIMIT`].
    pub limit: Option<usize>,
    /// Rows to skip.
    pub offset: usize,
}

impl DefectFilter {
    /// Effective page size.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    /// Trimmed, non-empty search term.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    /// Evaluate every predicate except paging against one record.
    ///
    /// Storage adapters that cannot push a predicate down use this to keep
    /// semantics identical across backends.
    pub fn matches(&self, record: &DefectRecord, now: DateTime<Utc>) -> bool {
        if self.server_id.is_some_and(|server| server != record.server_id) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&record.status()) {
            return false;
        }
        if self.category.is_some_and(|category| category != record.category) {
            return false;
        }
        if self.diagnostician.is_some()
            && self.diagnostician != record.diagnosis.diagnostician
        {
            return false;
        }
        if self
            .repeated
            .is_some_and(|repeated| repeated != record.is_repeated_defect())
        {
            return false;
        }
        if self
            .sla_breached
            .is_some_and(|breached| breached != record.is_sla_breached(now))
        {
            return false;
        }
        if self.detected_from.is_some_and(|from| record.detected_at < from) {
            return false;
        }
        if self.detected_to.is_some_and(|to| record.detected_at > to) {
            return false;
        }
        self.search_term()
            .is_none_or(|term| record_matches_search(record, term))
    }
}

fn record_matches_search(record: &DefectRecord, term: &str) -> bool {
    let needle = term.to_lowercase();
    let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);
    record.vendor.ticket_number.as_deref().is_some_and(contains)
        || contains(&record.description)
        || record.defective_part.serials.iter().any(contains)
}

/// One page of defect records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectPage {
    /// Records on this page.
    pub rows: Vec<DefectRecord>,
    /// Total records matching the filter.
    pub total: usize,
    /// Page size used.
    pub limit: usize,
    /// Offset used.
    pub offset: usize,
}

/// Scope for defect statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefectStatsFilter {
    /// Only this server.
    pub server_id: Option<ServerId>,
    /// Detected at or after.
    pub detected_from: Option<DateTime<Utc>>,
    /// Detected at or before.
    pub detected_to: Option<DateTime<Utc>>,
}

impl DefectStatsFilter {
    /// Convert into a list filter without paging.
    pub fn as_filter(&self) -> DefectFilter {
        DefectFilter {
            server_id: self.server_id,
            detected_from: self.detected_from,
            detected_to: self.detected_to,
            ..DefectFilter::default()
        }
    }
}

/// Aggregate defect counts and repair times.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectStats {
    /// Records in scope.
    pub total: usize,
    /// Count per status.
    pub by_status: BTreeMap<DefectStatus, usize>,
    /// Count per part category.
    pub by_category: BTreeMap<PartCategory, usize>,
    /// Repeated defects in scope.
    pub repeated: usize,
    /// Records whose SLA deadline has passed unfinished.
    pub sla_breached: usize,
    /// Mean downtime of resolved records, in minutes.
    pub average_repair_minutes: Option<i64>,
}

impl DefectStats {
    /// Fold records into counts as of `now`.
    pub fn collect<'a>(records: impl IntoIterator<Item = &'a DefectRecord>, now: DateTime<Utc>) -> Self {
        let mut stats = Self::default();
        let mut downtime_total: i64 = 0;
        let mut downtime_count: i64 = 0;
        for record in records {
            stats.total += 1;
            *stats.by_status.entry(record.status()).or_default() += 1;
            *stats.by_category.entry(record.category).or_default() += 1;
            if record.is_repeated_defect() {
                stats.repeated += 1;
            }
            if record.is_sla_breached(now) {
                stats.sla_breached += 1;
            }
            if let Some(minutes) = record.resolution.total_downtime_minutes {
                downtime_total = downtime_total.saturating_add(minutes);
                downtime_count += 1;
            }
        }
        if downtime_count > 0 {
            stats.average_repair_minutes = Some(
                downtime_total
                    .saturating_add(downtime_count.div_euclid(2))
                    .div_euclid(downtime_count),
            );
        }
        stats
    }

    /// Mean downtime in whole hours, rounded to the nearest hour.
    pub fn average_repair_hours(&self) -> Option<i64> {
        self.average_repair_minutes
            .map(|minutes| minutes.saturating_add(30).div_euclid(60))
    }
}
