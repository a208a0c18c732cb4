//! Filters and aggregates for inventory queries.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::component::{ComponentCondition, InventoryComponent, InventoryStatus};
use crate::domain::ServerId;
use crate::domain::defects::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, PartCategory};

/// Filter for listing inventory components, newest intake first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentFilter {
    /// Only this category.
    pub category: Option<PartCategory>,
    /// Only this status.
    pub status: Option<InventoryStatus>,
    /// Only this condition.
    pub condition: Option<ComponentCondition>,
    /// Manufacturer substring, case-insensitive.
    pub manufacturer: Option<String>,
    /// Model substring, case-insensitive.
    pub model: Option<String>,
    /// Location substring, case-insensitive.
    pub location: Option<String>,
    /// Only parts linked to this server.
    pub server_id: Option<ServerId>,
    /// Only parts whose warranty has (or has not) lapsed.
    pub warranty_expired: Option<bool>,
    /// Search over serials, manufacturer, and model.
    pub search: Option<String>,
    /// Page size; defaults to 50, capped at 500.
    pub limit: Option<usize>,
    /// Rows to skip.
    pub offset: usize,
}

fn contains_ci(haystack: Option<&str>, needle: Option<&str>) -> bool {
    let Some(needle) = needle.map(str::trim).filter(|value| !value.is_empty()) else {
        return true;
    };
    haystack.is_some_and(|value| value.to_lowercase().contains(&needle.to_lowercase()))
}

impl ComponentFilter {
    /// Effective page size.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    /// Evaluate every predicate except paging against one component.
    pub fn matches(&self, component: &InventoryComponent, today: NaiveDate) -> bool {
        if self.category.is_some_and(|category| category != component.category) {
            return false;
        }
        if self.status.is_some_and(|status| status != component.status()) {
            return false;
        }
        if self
            .condition
            .is_some_and(|condition| condition != component.condition)
        {
            return false;
        }
        if self.server_id.is_some() && self.server_id != component.current_server_id {
            return false;
        }
        if self
            .warranty_expired
            .is_some_and(|expired| expired != component.warranty_expired(today))
        {
            return false;
        }
        if !contains_ci(component.manufacturer.as_deref(), self.manufacturer.as_deref())
            || !contains_ci(component.model.as_deref(), self.model.as_deref())
            || !contains_ci(component.location.as_deref(), self.location.as_deref())
        {
            return false;
        }
        let search = self.search.as_deref();
        contains_ci(Some(component.serial_number.as_str()), search)
            || contains_ci(component.vendor_serial.as_deref(), search)
            || contains_ci(component.manufacturer.as_deref(), search)
            || contains_ci(component.model.as_deref(), search)
    }
}

/// One page of inventory components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentPage {
    /// Components on this page.
    pub rows: Vec<InventoryComponent>,
    /// Total components matching the filter.
    pub total: usize,
    /// Page size used.
    pub limit: usize,
    /// Offset used.
    pub offset: usize,
}

/// Ledger-wide counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    /// Components in the ledger.
    pub total: usize,
    /// Count per status.
    pub by_status: BTreeMap<InventoryStatus, usize>,
    /// Count per category and status.
    pub by_category: BTreeMap<PartCategory, BTreeMap<InventoryStatus, usize>>,
    /// Non-scrapped parts whose warranty lapses within the window.
    pub warranty_expiring: usize,
}

impl InventoryStats {
    /// Fold components into counts; `horizon` bounds the warranty window.
    pub fn collect<'a>(
        components: impl IntoIterator<Item = &'a InventoryComponent>,
        today: NaiveDate,
        horizon: NaiveDate,
    ) -> Self {
        let mut stats = Self::default();
        for component in components {
            stats.total += 1;
            *stats.by_status.entry(component.status()).or_default() += 1;
            *stats
                .by_category
                .entry(component.category)
                .or_default()
                .entry(component.status())
                .or_default() += 1;
            if warranty_lapses_within(component, today, horizon) {
                stats.warranty_expiring += 1;
            }
        }
        stats
    }

    /// Count for one status.
    pub fn count(&self, status: InventoryStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or_default()
    }
}

/// Whether a live component's warranty lapses between `today` and `horizon`.
pub fn warranty_lapses_within(
    component: &InventoryComponent,
    today: NaiveDate,
    horizon: NaiveDate,
) -> bool {
    !component.status().is_terminal()
        && component
            .warranty_expires
            .is_some_and(|expires| expires >= today && expires <= horizon)
}
