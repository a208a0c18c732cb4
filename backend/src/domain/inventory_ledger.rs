//! Inventory ledger service.
//!
//! The ledger is the only writer of component status. Each public operation
//! loads the component, checks the required pre-state, and commits one
//! compare-and-set on the status it saw. The `plan_*` methods expose the same
//! transitions to the lifecycle orchestrator, which folds them into its own
//! unit of work instead of committing them separately.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use mockable::Clock;
use tracing::info;

use crate::domain::defects::{PartCategory, PartSerials};
use crate::domain::history::{HistoryAction, HistoryEntityType, HistoryEntry};
use crate::domain::inventory::{
    ComponentCondition, ComponentFilter, ComponentPage, InventoryComponent, InventoryStats,
    InventoryStatus, NewInventoryComponent, ServerComponent,
};
use crate::domain::ports::{
    BulkIntakeRejection, BulkIntakeReport, InventoryLedgerCommand, InventoryLedgerQuery,
    InventoryRepository, RemovalOutcome, RemovalRequest, WorkflowStore,
};
use crate::domain::store_errors::{commit_unit, map_store_error};
use crate::domain::unit_of_work::EntityWrite;
use crate::domain::{
    ComponentId, DefectId, Error, HistoryDispatcher, ServerId, UnitOfWork, UserId,
};

/// Days ahead counted as "warranty expiring" in ledger statistics.
pub const WARRANTY_HORIZON_DAYS: u64 = 30;

/// A planned component change and the unit of work that commits it.
#[derive(Debug, Clone)]
pub(crate) struct PlannedChange {
    pub(crate) component: InventoryComponent,
    pub(crate) unit: UnitOfWork,
}

/// Ledger of serialised components.
#[derive(Clone)]
pub struct InventoryLedger {
    components: Arc<dyn InventoryRepository>,
    store: Arc<dyn WorkflowStore>,
    history: HistoryDispatcher,
    clock: Arc<dyn Clock>,
}

impl InventoryLedger {
    /// Build a ledger over the given ports.
    pub fn new(
        components: Arc<dyn InventoryRepository>,
        store: Arc<dyn WorkflowStore>,
        history: HistoryDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            components,
            store,
            history,
            clock,
        }
    }

    /// Load a component or fail with `NotFound`.
    pub(crate) async fn load(&self, id: ComponentId) -> Result<InventoryComponent, Error> {
        self.components
            .find_by_id(id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("component {id} not found")))
    }

    /// Load a component if it exists.
    pub(crate) async fn find(&self, id: ComponentId) -> Result<Option<InventoryComponent>, Error> {
        self.components.find_by_id(id).await.map_err(map_store_error)
    }

    /// Find a component by either serial.
    pub(crate) async fn find_by_serial(
        &self,
        serial: &str,
    ) -> Result<Option<InventoryComponent>, Error> {
        self.components
            .find_by_serial(serial)
            .await
            .map_err(map_store_error)
    }

    /// Find the installed-part record in `server_id` matching `serials`.
    pub(crate) async fn find_server_component(
        &self,
        server_id: ServerId,
        category: PartCategory,
        serials: &PartSerials,
    ) -> Result<Option<ServerComponent>, Error> {
        self.components
            .find_server_component(server_id, category, serials)
            .await
            .map_err(map_store_error)
    }

    async fn commit(&self, planned: PlannedChange) -> Result<InventoryComponent, Error> {
        let PlannedChange { component, unit } = planned;
        commit_unit(self.store.as_ref(), &self.history, unit).await?;
        info!(
            component_id = %component.id,
            status = %component.status(),
            "inventory component updated"
        );
        Ok(component)
    }

    fn today(&self) -> NaiveDate {
        self.clock.utc().date_naive()
    }

    async fn ensure_serial_free(&self, serial: &str) -> Result<(), Error> {
        if let Some(existing) = self.find_by_serial(serial).await? {
            return Err(duplicate_serial(serial, existing.id));
        }
        Ok(())
    }

    /// Plan a reservation for `defect_id`.
    pub(crate) async fn plan_reserve(
        &self,
        component_id: ComponentId,
        defect_id: DefectId,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<PlannedChange, Error> {
        let component = self.load(component_id).await?;
        reserve(component, defect_id, actor, at)
    }

    /// Plan an installation into `server_id`.
    pub(crate) async fn plan_install(
        &self,
        component_id: ComponentId,
        server_id: ServerId,
        actor: UserId,
        defect_id: Option<DefectId>,
        at: DateTime<Utc>,
    ) -> Result<PlannedChange, Error> {
        let component = self.load(component_id).await?;
        install(component, server_id, actor, defect_id, at)
    }
}

fn duplicate_serial(serial: &str, existing: ComponentId) -> Error {
    Error::conflict(format!("serial {serial} is already registered")).with_details(
        serde_json::json!({
            "serial": serial,
            "existingComponentId": existing.to_string(),
            "code": "duplicate_serial",
        }),
    )
}

fn wrong_state(component: &InventoryComponent, wanted: &str) -> Error {
    Error::invalid_state(format!(
        "component {} is {}, expected {wanted}",
        component.id,
        component.status()
    ))
    .with_details(serde_json::json!({
        "componentId": component.id.to_string(),
        "status": component.status().as_str(),
        "expected": wanted,
    }))
}

fn require_reason(reason: &str, what: &str) -> Result<String, Error> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_request(format!("{what} requires a reason")));
    }
    Ok(trimmed.to_owned())
}

fn entry(
    component: &InventoryComponent,
    action: HistoryAction,
    actor: UserId,
    at: DateTime<Utc>,
) -> HistoryEntry {
    HistoryEntry::new(HistoryEntityType::Component, component.id, action, actor, at)
        .with_meta("serialNumber", component.serial_number.clone())
}

fn planned(
    before: InventoryStatus,
    component: InventoryComponent,
    history: HistoryEntry,
) -> PlannedChange {
    let mut unit = UnitOfWork::new();
    unit.update_component(before, component.clone());
    unit.record(history);
    PlannedChange { component, unit }
}

/// AVAILABLE → RESERVED for `defect_id`.
pub(crate) fn reserve(
    mut component: InventoryComponent,
    defect_id: DefectId,
    actor: UserId,
    at: DateTime<Utc>,
) -> Result<PlannedChange, Error> {
    let before = component.status();
    if before != InventoryStatus::Available {
        return Err(wrong_state(&component, "AVAILABLE"));
    }
    component.reserved_for_defect_id = Some(defect_id);
    component.set_status(InventoryStatus::Reserved, at);
    let history = entry(&component, HistoryAction::Reserved, actor, at)
        .with_meta("defectId", defect_id.to_string());
    Ok(planned(before, component, history))
}

/// RESERVED → AVAILABLE.
pub(crate) fn release(
    mut component: InventoryComponent,
    actor: UserId,
    notes: Option<&str>,
    at: DateTime<Utc>,
) -> Result<PlannedChange, Error> {
    let before = component.status();
    if before != InventoryStatus::Reserved {
        return Err(wrong_state(&component, "RESERVED"));
    }
    let owner = component.reserved_for_defect_id.take();
    component.set_status(InventoryStatus::Available, at);
    let mut history = entry(&component, HistoryAction::Released, actor, at);
    if let Some(owner) = owner {
        history = history.with_meta("defectId", owner.to_string());
    }
    if let Some(notes) = notes {
        history = history.with_note(notes);
    }
    Ok(planned(before, component, history))
}

/// AVAILABLE or RESERVED → IN_USE in `server_id`.
pub(crate) fn install(
    mut component: InventoryComponent,
    server_id: ServerId,
    actor: UserId,
    defect_id: Option<DefectId>,
    at: DateTime<Utc>,
) -> Result<PlannedChange, Error> {
    let before = component.status();
    if !matches!(
        before,
        InventoryStatus::Available | InventoryStatus::Reserved
    ) {
        return Err(wrong_state(&component, "AVAILABLE or RESERVED"));
    }
    if let Some(current) = component.current_server_id.filter(|current| *current != server_id) {
        return Err(Error::invalid_state(format!(
            "component {} is linked to server {current}",
            component.id
        )));
    }
    if let Some(owner) = component.reserved_for_defect_id {
        if defect_id != Some(owner) {
            return Err(Error::invalid_state(format!(
                "component {} is reserved for defect {owner}",
                component.id
            )));
        }
    }
    component.reserved_for_defect_id = None;
    component.current_server_id = Some(server_id);
    component.set_status(InventoryStatus::InUse, at);
    let mut history = entry(&component, HistoryAction::Installed, actor, at)
        .with_meta("serverId", server_id.to_string());
    if let Some(defect_id) = defect_id {
        history = history.with_meta("defectId", defect_id.to_string());
    }
    Ok(planned(before, component, history))
}

/// IN_USE → AVAILABLE or DEFECTIVE, clearing the server link.
pub(crate) fn remove(
    mut component: InventoryComponent,
    actor: UserId,
    request: &RemovalRequest,
    at: DateTime<Utc>,
) -> Result<PlannedChange, Error> {
    let reason = require_reason(&request.reason, "removal")?;
    let before = component.status();
    if before != InventoryStatus::InUse {
        return Err(wrong_state(&component, "IN_USE"));
    }
    let server = component.current_server_id.take();
    let (status, action) = match request.outcome {
        RemovalOutcome::ReturnToStock => (InventoryStatus::Available, HistoryAction::Removed),
        RemovalOutcome::Defective => {
            component.condition = ComponentCondition::Defective;
            (InventoryStatus::Defective, HistoryAction::MarkedDefective)
        }
    };
    component.set_status(status, at);
    let mut history = entry(&component, action, actor, at).with_note(reason);
    if let Some(server) = server {
        history = history.with_meta("fromServerId", server.to_string());
    }
    if let Some(defect_id) = request.defect_id {
        history = history.with_meta("defectId", defect_id.to_string());
    }
    Ok(planned(before, component, history))
}

/// AVAILABLE or IN_USE → DEFECTIVE, keeping any server link.
pub(crate) fn mark_defective(
    mut component: InventoryComponent,
    actor: UserId,
    defect_id: DefectId,
    note: &str,
    at: DateTime<Utc>,
) -> Result<PlannedChange, Error> {
    let before = component.status();
    if !matches!(before, InventoryStatus::Available | InventoryStatus::InUse) {
        return Err(wrong_state(&component, "AVAILABLE or IN_USE"));
    }
    component.condition = ComponentCondition::Defective;
    component.set_status(InventoryStatus::Defective, at);
    let mut history = entry(&component, HistoryAction::MarkedDefective, actor, at)
        .with_meta("defectId", defect_id.to_string())
        .with_note(note);
    if let Some(server) = component.current_server_id {
        history = history.with_meta("serverId", server.to_string());
    }
    Ok(planned(before, component, history))
}

/// IN_USE or DEFECTIVE → DEFECTIVE with the server link cleared.
pub(crate) fn detach_defective(
    mut component: InventoryComponent,
    actor: UserId,
    defect_id: DefectId,
    at: DateTime<Utc>,
) -> Result<PlannedChange, Error> {
    let before = component.status();
    if !matches!(before, InventoryStatus::InUse | InventoryStatus::Defective) {
        return Err(wrong_state(&component, "IN_USE or DEFECTIVE"));
    }
    let Some(server) = component.current_server_id.take() else {
        return Err(Error::invalid_state(format!(
            "component {} is not installed in a server",
            component.id
        )));
    };
    component.condition = ComponentCondition::Defective;
    component.set_status(InventoryStatus::Defective, at);
    let history = entry(&component, HistoryAction::Removed, actor, at)
        .with_meta("fromServerId", server.to_string())
        .with_meta("defectId", defect_id.to_string());
    Ok(planned(before, component, history))
}

/// DEFECTIVE → IN_REPAIR under `ticket_number`.
pub(crate) fn send_to_vendor(
    mut component: InventoryComponent,
    ticket_number: &str,
    actor: UserId,
    at: DateTime<Utc>,
) -> Result<PlannedChange, Error> {
    let ticket_number = ticket_number.trim();
    if ticket_number.is_empty() {
        return Err(Error::invalid_request("a vendor ticket number is required"));
    }
    let before = component.status();
    if before != InventoryStatus::Defective {
        return Err(wrong_state(&component, "DEFECTIVE"));
    }
    component.current_server_id = None;
    component.vendor_ticket_number = Some(ticket_number.to_owned());
    component.set_status(InventoryStatus::InRepair, at);
    let history = entry(&component, HistoryAction::SentToVendor, actor, at)
        .with_meta("ticketNumber", ticket_number);
    Ok(planned(before, component, history))
}

/// IN_REPAIR → AVAILABLE; condition defaults to refurbished.
pub(crate) fn return_from_vendor(
    mut component: InventoryComponent,
    actor: UserId,
    condition: Option<ComponentCondition>,
    at: DateTime<Utc>,
) -> Result<PlannedChange, Error> {
    let before = component.status();
    if before != InventoryStatus::InRepair {
        return Err(wrong_state(&component, "IN_REPAIR"));
    }
    component.condition = condition.unwrap_or(ComponentCondition::Refurbished);
    component.set_status(InventoryStatus::Available, at);
    let mut history = entry(&component, HistoryAction::ReturnedFromVendor, actor, at)
        .with_meta("condition", component.condition.as_str());
    if let Some(ticket) = component.vendor_ticket_number.as_deref() {
        history = history.with_meta("ticketNumber", ticket);
    }
    Ok(planned(before, component, history))
}

/// Any live status → SCRAPPED with both links cleared.
pub(crate) fn scrap(
    mut component: InventoryComponent,
    actor: UserId,
    reason: &str,
    at: DateTime<Utc>,
) -> Result<PlannedChange, Error> {
    let reason = require_reason(reason, "scrapping")?;
    let before = component.status();
    if before.is_terminal() {
        return Err(wrong_state(&component, "a live status"));
    }
    component.current_server_id = None;
    component.reserved_for_defect_id = None;
    component.set_status(InventoryStatus::Scrapped, at);
    let history = entry(&component, HistoryAction::Scrapped, actor, at).with_note(reason);
    Ok(planned(before, component, history))
}

/// AVAILABLE or DEFECTIVE (uninstalled) → AVAILABLE on a pass, DEFECTIVE on a fail.
pub(crate) fn mark_tested(
    mut component: InventoryComponent,
    actor: UserId,
    passed: bool,
    notes: Option<&str>,
    at: DateTime<Utc>,
) -> Result<PlannedChange, Error> {
    let before = component.status();
    if !matches!(
        before,
        InventoryStatus::Available | InventoryStatus::Defective
    ) {
        return Err(wrong_state(&component, "AVAILABLE or DEFECTIVE"));
    }
    if component.current_server_id.is_some() {
        return Err(Error::invalid_state(format!(
            "component {} must be pulled from its server before testing",
            component.id
        )));
    }
    if passed {
        if component.condition == ComponentCondition::Defective {
            component.condition = ComponentCondition::Refurbished;
        }
        component.set_status(InventoryStatus::Available, at);
    } else {
        component.condition = ComponentCondition::Defective;
        component.set_status(InventoryStatus::Defective, at);
    }
    component.last_tested_at = Some(at);
    let mut history =
        entry(&component, HistoryAction::Tested, actor, at).with_meta("passed", passed);
    if let Some(notes) = notes {
        history = history.with_note(notes);
    }
    Ok(planned(before, component, history))
}

/// Move a live component to `location`.
pub(crate) fn relocate(
    mut component: InventoryComponent,
    location: &str,
    actor: UserId,
    at: DateTime<Utc>,
) -> Result<PlannedChange, Error> {
    let location = location.trim();
    if location.is_empty() {
        return Err(Error::invalid_request("location must not be blank"));
    }
    let before = component.status();
    if before.is_terminal() {
        return Err(wrong_state(&component, "a live status"));
    }
    let previous = component.location.replace(location.to_owned());
    component.set_status(before, at);
    let mut history = entry(&component, HistoryAction::Transferred, actor, at)
        .with_meta("toLocation", location);
    if let Some(previous) = previous {
        history = history.with_meta("fromLocation", previous);
    }
    Ok(planned(before, component, history))
}

/// Build the intake unit for a new component.
pub(crate) fn receive(
    intake: NewInventoryComponent,
    actor: UserId,
    at: DateTime<Utc>,
) -> Result<PlannedChange, Error> {
    if intake.serial_number.trim().is_empty() {
        return Err(Error::invalid_request("serial number must not be blank"));
    }
    let component = InventoryComponent::receive(ComponentId::random(), intake, actor, at);
    let mut history = entry(&component, HistoryAction::Received, actor, at)
        .with_meta("category", component.category.as_str());
    if let Some(location) = component.location.as_deref() {
        history = history.with_meta("location", location);
    }
    let mut unit = UnitOfWork::new();
    unit.push(EntityWrite::InsertComponent(component.clone()));
    unit.record(history);
    Ok(PlannedChange { component, unit })
}

#[async_trait]
impl InventoryLedgerCommand for InventoryLedger {
    async fn add_to_inventory(
        &self,
        intake: NewInventoryComponent,
        actor: UserId,
    ) -> Result<InventoryComponent, Error> {
        let change = receive(intake, actor, self.clock.utc())?;
        self.ensure_serial_free(&change.component.serial_number)
            .await?;
        if let Some(vendor_serial) = change.component.vendor_serial.as_deref() {
            self.ensure_serial_free(vendor_serial).await?;
        }
        self.commit(change).await
    }

    async fn bulk_add_to_inventory(
        &self,
        intake: Vec<NewInventoryComponent>,
        actor: UserId,
    ) -> Result<BulkIntakeReport, Error> {
        let mut report = BulkIntakeReport {
            received: Vec::with_capacity(intake.len()),
            rejected: Vec::new(),
        };
        for item in intake {
            let serial_number = item.serial_number.trim().to_owned();
            match self.add_to_inventory(item, actor).await {
                Ok(component) => report.received.push(component),
                Err(error) => report.rejected.push(BulkIntakeRejection {
                    serial_number,
                    reason: error.message().to_owned(),
                }),
            }
        }
        Ok(report)
    }

    async fn reserve(
        &self,
        component_id: ComponentId,
        defect_id: DefectId,
        actor: UserId,
    ) -> Result<InventoryComponent, Error> {
        let change = self
            .plan_reserve(component_id, defect_id, actor, self.clock.utc())
            .await?;
        self.commit(change).await
    }

    async fn release(
        &self,
        component_id: ComponentId,
        actor: UserId,
        notes: Option<String>,
    ) -> Result<InventoryComponent, Error> {
        let component = self.load(component_id).await?;
        let change = release(component, actor, notes.as_deref(), self.clock.utc())?;
        self.commit(change).await
    }

    async fn install_to_server(
        &self,
        component_id: ComponentId,
        server_id: ServerId,
        actor: UserId,
        defect_id: Option<DefectId>,
    ) -> Result<InventoryComponent, Error> {
        let change = self
            .plan_install(component_id, server_id, actor, defect_id, self.clock.utc())
            .await?;
        self.commit(change).await
    }

    async fn remove_from_server(
        &self,
        component_id: ComponentId,
        actor: UserId,
        request: RemovalRequest,
    ) -> Result<InventoryComponent, Error> {
        let component = self.load(component_id).await?;
        let change = remove(component, actor, &request, self.clock.utc())?;
        self.commit(change).await
    }

    async fn send_to_vendor(
        &self,
        component_id: ComponentId,
        ticket_number: String,
        actor: UserId,
    ) -> Result<InventoryComponent, Error> {
        let component = self.load(component_id).await?;
        let change = send_to_vendor(component, &ticket_number, actor, self.clock.utc())?;
        self.commit(change).await
    }

    async fn return_from_vendor(
        &self,
        component_id: ComponentId,
        actor: UserId,
        condition: Option<ComponentCondition>,
    ) -> Result<InventoryComponent, Error> {
        let component = self.load(component_id).await?;
        let change = return_from_vendor(component, actor, condition, self.clock.utc())?;
        self.commit(change).await
    }

    async fn scrap(
        &self,
        component_id: ComponentId,
        actor: UserId,
        reason: String,
    ) -> Result<InventoryComponent, Error> {
        let component = self.load(component_id).await?;
        let change = scrap(component, actor, &reason, self.clock.utc())?;
        self.commit(change).await
    }

    async fn mark_tested(
        &self,
        component_id: ComponentId,
        actor: UserId,
        passed: bool,
        notes: Option<String>,
    ) -> Result<InventoryComponent, Error> {
        let component = self.load(component_id).await?;
        let change = mark_tested(component, actor, passed, notes.as_deref(), self.clock.utc())?;
        self.commit(change).await
    }

    async fn update_location(
        &self,
        component_id: ComponentId,
        location: String,
        actor: UserId,
    ) -> Result<InventoryComponent, Error> {
        let component = self.load(component_id).await?;
        let change = relocate(component, &location, actor, self.clock.utc())?;
        self.commit(change).await
    }
}

#[async_trait]
impl InventoryLedgerQuery for InventoryLedger {
    async fn get(&self, component_id: ComponentId) -> Result<InventoryComponent, Error> {
        self.load(component_id).await
    }

    async fn get_by_serial(&self, serial: String) -> Result<InventoryComponent, Error> {
        let serial = serial.trim();
        if serial.is_empty() {
            return Err(Error::invalid_request("serial must not be blank"));
        }
        self.find_by_serial(serial)
            .await?
            .ok_or_else(|| Error::not_found(format!("no component with serial {serial}")))
    }

    async fn list(&self, filter: ComponentFilter) -> Result<ComponentPage, Error> {
        self.components
            .list(&filter, self.today())
            .await
            .map_err(map_store_error)
    }

    async fn available_by_category(
        &self,
        category: PartCategory,
    ) -> Result<Vec<InventoryComponent>, Error> {
        self.components
            .available_by_category(category)
            .await
            .map_err(map_store_error)
    }

    async fn stats(&self) -> Result<InventoryStats, Error> {
        let today = self.today();
        let horizon = horizon(today, WARRANTY_HORIZON_DAYS)?;
        self.components
            .stats(today, horizon)
            .await
            .map_err(map_store_error)
    }

    async fn warranty_expiring(&self, days: u32) -> Result<Vec<InventoryComponent>, Error> {
        let today = self.today();
        let horizon = horizon(today, u64::from(days))?;
        self.components
            .warranty_expiring(today, horizon)
            .await
            .map_err(map_store_error)
    }
}

fn horizon(today: NaiveDate, days: u64) -> Result<NaiveDate, Error> {
    today
        .checked_add_days(Days::new(days))
        .ok_or_else(|| Error::invalid_request(format!("{days} days is out of range")))
}

#[cfg(test)]
#[path = "inventory_ledger_tests.rs"]
mod tests;
