//! Driving port for inventory ledger mutations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::inventory::{ComponentCondition, InventoryComponent, NewInventoryComponent};
use crate::domain::{ComponentId, DefectId, Error, ServerId, UserId};

/// Where a component goes when it is pulled from a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalOutcome {
    /// Back on the shelf.
    ReturnToStock,
    /// Known bad.
    Defective,
}

/// Removal of a component from its server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalRequest {
    /// Why the part was pulled.
    pub reason: String,
    /// Defect being worked when the part was pulled.
    #[serde(default)]
    pub defect_id: Option<DefectId>,
    /// Where the part goes.
    pub outcome: RemovalOutcome,
}

/// Per-item outcome of a bulk intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkIntakeReport {
    /// Components registered.
    pub received: Vec<InventoryComponent>,
    /// Serials that were rejected, with the reason.
    pub rejected: Vec<BulkIntakeRejection>,
}

/// One rejected intake item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkIntakeRejection {
    /// Serial as submitted.
    pub serial_number: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Driving port for inventory ledger mutations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryLedgerCommand: Send + Sync {
    /// Register a new component; serials must be unique.
    async fn add_to_inventory(
        &self,
        intake: NewInventoryComponent,
        actor: UserId,
    ) -> Result<InventoryComponent, Error>;

    /// Register many components, reporting failures per item.
    async fn bulk_add_to_inventory(
        &self,
        intake: Vec<NewInventoryComponent>,
        actor: UserId,
    ) -> Result<BulkIntakeReport, Error>;

    /// AVAILABLE → RESERVED for the defect.
    async fn reserve(
        &self,
        component_id: ComponentId,
        defect_id: DefectId,
        actor: UserId,
    ) -> Result<InventoryComponent, Error>;

    /// RESERVED → AVAILABLE.
    async fn release(
        &self,
        component_id: ComponentId,
        actor: UserId,
        notes: Option<String>,
    ) -> Result<InventoryComponent, Error>;

    /// AVAILABLE or RESERVED → IN_USE in the server.
    async fn install_to_server(
        &self,
        component_id: ComponentId,
        server_id: ServerId,
        actor: UserId,
        defect_id: Option<DefectId>,
    ) -> Result<InventoryComponent, Error>;

    /// IN_USE → AVAILABLE or DEFECTIVE, clearing the server link.
    async fn remove_from_server(
        &self,
        component_id: ComponentId,
        actor: UserId,
        request: RemovalRequest,
    ) -> Result<InventoryComponent, Error>;

    /// DEFECTIVE → IN_REPAIR under the vendor ticket.
    async fn send_to_vendor(
        &self,
        component_id: ComponentId,
        ticket_number: String,
        actor: UserId,
    ) -> Result<InventoryComponent, Error>;

    /// IN_REPAIR → AVAILABLE; condition defaults to refurbished.
    async fn return_from_vendor(
        &self,
        component_id: ComponentId,
        actor: UserId,
        condition: Option<ComponentCondition>,
    ) -> Result<InventoryComponent, Error>;

    /// Any live status → SCRAPPED.
    async fn scrap(
        &self,
        component_id: ComponentId,
        actor: UserId,
        reason: String,
    ) -> Result<InventoryComponent, Error>;

    /// Record a bench test; a pass makes the part available, a fail defective.
    async fn mark_tested(
        &self,
        component_id: ComponentId,
        actor: UserId,
        passed: bool,
        notes: Option<String>,
    ) -> Result<InventoryComponent, Error>;

    /// Move the part to another shelf or warehouse.
    async fn update_location(
        &self,
        component_id: ComponentId,
        location: String,
        actor: UserId,
    ) -> Result<InventoryComponent, Error>;
}
