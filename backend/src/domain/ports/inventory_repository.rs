//! Port for reading inventory components and installed-part records.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::StoreError;
use crate::domain::defects::{PartCategory, PartSerials};
use crate::domain::inventory::{
    ComponentFilter, ComponentPage, InventoryComponent, InventoryStats, ServerComponent,
};
use crate::domain::{ComponentId, ServerId};

/// Read access to the inventory ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Find a component by id.
    async fn find_by_id(&self, id: ComponentId) -> Result<Option<InventoryComponent>, StoreError>;

    /// Find a component whose primary or vendor serial equals `serial`,
    /// ignoring case.
    async fn find_by_serial(&self, serial: &str)
    -> Result<Option<InventoryComponent>, StoreError>;

    /// Find the installed-part record in `server_id` matching either serial.
    ///
    /// A record of the same category is preferred when several match.
    async fn find_server_component(
        &self,
        server_id: ServerId,
        category: PartCategory,
        serials: &PartSerials,
    ) -> Result<Option<ServerComponent>, StoreError>;

    /// One page of components matching the filter, newest intake first.
    async fn list(
        &self,
        filter: &ComponentFilter,
        today: NaiveDate,
    ) -> Result<ComponentPage, StoreError>;

    /// Available components of one category, best condition then oldest first.
    async fn available_by_category(
        &self,
        category: PartCategory,
    ) -> Result<Vec<InventoryComponent>, StoreError>;

    /// Ledger-wide counts; `horizon` bounds the warranty window.
    async fn stats(&self, today: NaiveDate, horizon: NaiveDate)
    -> Result<InventoryStats, StoreError>;

    /// Live components whose warranty lapses between `today` and `horizon`,
    /// soonest first.
    async fn warranty_expiring(
        &self,
        today: NaiveDate,
        horizon: NaiveDate,
    ) -> Result<Vec<InventoryComponent>, StoreError>;
}
