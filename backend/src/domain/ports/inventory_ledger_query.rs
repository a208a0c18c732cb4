//! Driving port for inventory ledger reads.

use async_trait::async_trait;

use crate::domain::defects::PartCategory;
use crate::domain::inventory::{ComponentFilter, ComponentPage, InventoryComponent, InventoryStats};
use crate::domain::{ComponentId, Error};

/// Driving port for inventory ledger reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryLedgerQuery: Send + Sync {
    /// Load one component.
    async fn get(&self, component_id: ComponentId) -> Result<InventoryComponent, Error>;

    /// Load a component by either serial, ignoring case.
    async fn get_by_serial(&self, serial: String) -> Result<InventoryComponent, Error>;

    /// One page of components matching the filter.
    async fn list(&self, filter: ComponentFilter) -> Result<ComponentPage, Error>;

    /// Available stock of one category, best condition then oldest first.
    async fn available_by_category(
        &self,
        category: PartCategory,
    ) -> Result<Vec<InventoryComponent>, Error>;

    /// Ledger-wide counts.
    async fn stats(&self) -> Result<InventoryStats, Error>;

    /// Live components whose warranty lapses within `days`.
    async fn warranty_expiring(&self, days: u32) -> Result<Vec<InventoryComponent>, Error>;
}
