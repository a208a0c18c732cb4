//! Defect lifecycle orchestrator.
//!
//! [`DefectLifecycleService`] implements both driving ports for defects.
//! Every mutation follows the same shape: load the record, resolve and
//! assert the target status, plan every write (defect, components, ticket,
//! substitute, server) into one [`UnitOfWork`], commit it, and hand the
//! history to the dispatcher. Nothing is written when any step fails. The
//! automatic substitute return after a finishing step is the one exception:
//! it commits separately, after the defect is finished.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::defects::{
    DefectAction, DefectFilter, DefectPage, DefectRecord, DefectStateMachine, DefectStats,
    DefectStatsFilter, DefectStatus, Transition,
};
use crate::domain::history::{HistoryAction, HistoryEntityType, HistoryEntry};
use crate::domain::inventory::{InventoryComponent, InventoryStatus};
use crate::domain::ports::{
    CreateDefectRequest, DefectLifecycleCommand, DefectLifecycleQuery, DefectRepository,
    DiagnosisRevision, ReplacementRequest, ResolveRequest, ServerRegistry, SlaCalculator,
    UserDirectory, VendorReturn, WorkflowStore,
};
use crate::domain::store_errors::{commit_unit, map_store_error};
use crate::domain::unit_of_work::DefectVersion;
use crate::domain::vendor_ticket::{VendorTicket, VendorTicketRequest};
use crate::domain::{
    ComponentId, DefectId, Error, HistoryDispatcher, InventoryLedger, SubstituteId,
    SubstitutePoolCoordinator, UnitOfWork, UserId, VendorTicketCoordinator,
};

#[path = "defect_lifecycle_closure.rs"]
mod closure;
#[path = "defect_lifecycle_intake.rs"]
mod intake;
#[path = "defect_lifecycle_vendor.rs"]
mod vendor;
#[path = "defect_lifecycle_workflow.rs"]
mod workflow;

/// Driven ports the orchestrator reads from and commits through.
#[derive(Clone)]
pub struct LifecyclePorts {
    /// Defect record reads.
    pub defects: Arc<dyn DefectRepository>,
    /// Server lookups.
    pub servers: Arc<dyn ServerRegistry>,
    /// User lookups.
    pub users: Arc<dyn UserDirectory>,
    /// Atomic commit of planned writes.
    pub store: Arc<dyn WorkflowStore>,
    /// SLA deadlines.
    pub sla: Arc<dyn SlaCalculator>,
}

/// Domain services the orchestrator delegates to.
#[derive(Clone)]
pub struct LifecycleCollaborators {
    /// Sole writer of component status.
    pub ledger: InventoryLedger,
    /// Vendor ticket planning.
    pub tickets: VendorTicketCoordinator,
    /// Substitute loans.
    pub substitutes: SubstitutePoolCoordinator,
    /// Post-commit history delivery.
    pub history: HistoryDispatcher,
    /// Transition table.
    pub machine: DefectStateMachine,
}

/// Tunables for the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// A new defect repeats a resolved one detected this many days back.
    pub repeat_lookback_days: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            repeat_lookback_days: 30,
        }
    }
}

/// Orchestrates the defect workflow across the ledger and coordinators.
#[derive(Clone)]
pub struct DefectLifecycleService {
    ports: LifecyclePorts,
    ledger: InventoryLedger,
    tickets: VendorTicketCoordinator,
    substitutes: SubstitutePoolCoordinator,
    history: HistoryDispatcher,
    machine: DefectStateMachine,
    config: LifecycleConfig,
    clock: Arc<dyn Clock>,
}

impl DefectLifecycleService {
    /// Assemble the orchestrator.
    pub fn new(
        ports: LifecyclePorts,
        collaborators: LifecycleCollaborators,
        config: LifecycleConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let LifecycleCollaborators {
            ledger,
            tickets,
            substitutes,
            history,
            machine,
        } = collaborators;
        Self {
            ports,
            ledger,
            tickets,
            substitutes,
            history,
            machine,
            config,
            clock,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    async fn load(&self, id: DefectId) -> Result<DefectRecord, Error> {
        self.ports
            .defects
            .find_by_id(id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("defect {id} not found")))
    }

    async fn ensure_user(&self, id: UserId) -> Result<(), Error> {
        self.ports
            .users
            .find_user(id)
            .await
            .map_err(map_store_error)?
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("user {id} not found")))
    }

    /// Status reached by `action`, or `IllegalTransition` when it is not offered.
    fn target(&self, record: &DefectRecord, action: DefectAction) -> Result<DefectStatus, Error> {
        let current = record.status();
        self.machine.ensure_mutable(current)?;
        let Some(next) = self.machine.target_for(current, action) else {
            return Err(Error::illegal_transition(format!(
                "cannot {} a defect that is {current}",
                action.label().to_lowercase()
            ))
            .with_details(json!({ "from": current, "action": action })));
        };
        self.machine.assert_transition(current, next)?;
        Ok(next)
    }

    fn guard_move(&self, record: &DefectRecord, to: DefectStatus) -> Result<(), Error> {
        self.machine.ensure_mutable(record.status())?;
        self.machine.assert_transition(record.status(), to)
    }

    async fn commit(
        &self,
        unit: UnitOfWork,
        record: &DefectRecord,
        step: &'static str,
    ) -> Result<(), Error> {
        commit_unit(self.ports.store.as_ref(), &self.history, unit).await?;
        info!(defect_id = %record.id, status = %record.status(), step, "defect updated");
        Ok(())
    }

    /// The inventory entry of the defective part, if intake resolved one.
    async fn tracked_component(
        &self,
        record: &DefectRecord,
    ) -> Result<Option<InventoryComponent>, Error> {
        match record.defective_part.inventory_id {
            Some(id) => self.ledger.find(id).await,
            None => Ok(None),
        }
    }

    /// The replacement still held in reserve for this defect.
    async fn reserved_replacement(
        &self,
        record: &DefectRecord,
    ) -> Result<Option<InventoryComponent>, Error> {
        if record.replacement.server_component_id.is_some() {
            return Ok(None);
        }
        let Some(id) = record.replacement.inventory_id else {
            return Ok(None);
        };
        Ok(self.ledger.find(id).await?.filter(|component| {
            component.status() == InventoryStatus::Reserved
                && component.reserved_for_defect_id == Some(record.id)
        }))
    }

    /// Give an outstanding substitute back to the pool once the defect has
    /// been finished. Runs as its own unit: a failure is logged and leaves
    /// the finished defect holding the substitute.
    async fn auto_return_substitute(
        &self,
        record: &mut DefectRecord,
        actor: UserId,
        at: DateTime<Utc>,
    ) {
        let Some(assignment) = record.substitute.clone() else {
            return;
        };
        let returned = match self
            .substitutes
            .plan_return(assignment.entry_id, record.id, actor, at)
            .await
        {
            Ok(plan) => plan,
            Err(error) => {
                warn!(
                    %error,
                    defect_id = %record.id,
                    substitute_id = %assignment.entry_id,
                    "ExternalDependencyDegraded: substitute not returned automatically"
                );
                return;
            }
        };

        let expected = DefectVersion::of(record);
        let mut cleared = record.clone();
        cleared.substitute = None;
        cleared.touch(at);
        let mut unit = UnitOfWork::new();
        unit.update_defect(expected, cleared.clone());
        unit.absorb(returned.unit);
        unit.record(
            defect_entry(
                &cleared,
                HistoryAction::SubstituteReturned,
                actor,
                cleared.status(),
                at,
            )
            .with_meta("substituteSerial", assignment.serial),
        );
        match self.commit(unit, &cleared, "substitute returned").await {
            Ok(()) => *record = cleared,
            Err(error) => warn!(
                %error,
                defect_id = %record.id,
                substitute_id = %assignment.entry_id,
                "ExternalDependencyDegraded: substitute return not committed"
            ),
        }
    }

    async fn notify_closed(&self, tickets: &[VendorTicket]) {
        for ticket in tickets {
            self.tickets.notify_closed(ticket).await;
        }
    }
}

/// History entry for a defect record, after its status was updated.
fn defect_entry(
    record: &DefectRecord,
    action: HistoryAction,
    actor: UserId,
    previous: DefectStatus,
    at: DateTime<Utc>,
) -> HistoryEntry {
    let entry = HistoryEntry::new(HistoryEntityType::DefectRecord, record.id, action, actor, at)
        .with_meta("newStatus", record.status().as_str());
    if previous == record.status() {
        entry
    } else {
        entry.with_meta("previousStatus", previous.as_str())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_owned)
}

#[async_trait]
impl DefectLifecycleCommand for DefectLifecycleService {
    async fn create(&self, request: CreateDefectRequest) -> Result<DefectRecord, Error> {
        self.open_defect(request).await
    }

    async fn start_diagnosis(
        &self,
        defect_id: DefectId,
        actor: UserId,
    ) -> Result<DefectRecord, Error> {
        self.begin_diagnosis(defect_id, actor).await
    }

    async fn complete_diagnosis(
        &self,
        defect_id: DefectId,
        actor: UserId,
        revision: DiagnosisRevision,
    ) -> Result<DefectRecord, Error> {
        self.finish_diagnosis(defect_id, actor, revision).await
    }

    async fn set_waiting_parts(
        &self,
        defect_id: DefectId,
        actor: UserId,
        notes: Option<String>,
    ) -> Result<DefectRecord, Error> {
        self.await_parts(defect_id, actor, notes).await
    }

    async fn start_repair(&self, defect_id: DefectId, actor: UserId) -> Result<DefectRecord, Error> {
        self.begin_repair(defect_id, actor).await
    }

    async fn update_status(
        &self,
        defect_id: DefectId,
        actor: UserId,
        status: DefectStatus,
        comment: Option<String>,
    ) -> Result<DefectRecord, Error> {
        self.change_status(defect_id, actor, status, comment).await
    }

    async fn reserve_replacement_part(
        &self,
        defect_id: DefectId,
        component_id: ComponentId,
        actor: UserId,
    ) -> Result<DefectRecord, Error> {
        self.reserve_part(defect_id, component_id, actor).await
    }

    async fn perform_replacement(
        &self,
        defect_id: DefectId,
        actor: UserId,
        request: ReplacementRequest,
    ) -> Result<DefectRecord, Error> {
        self.replace_part(defect_id, actor, request).await
    }

    async fn send_to_vendor(
        &self,
        defect_id: DefectId,
        actor: UserId,
        ticket: VendorTicketRequest,
    ) -> Result<DefectRecord, Error> {
        self.ship_to_vendor(defect_id, actor, ticket).await
    }

    async fn return_from_vendor(
        &self,
        defect_id: DefectId,
        actor: UserId,
        details: VendorReturn,
    ) -> Result<DefectRecord, Error> {
        self.receive_from_vendor(defect_id, actor, details).await
    }

    async fn issue_substitute(
        &self,
        defect_id: DefectId,
        actor: UserId,
        entry: Option<SubstituteId>,
    ) -> Result<DefectRecord, Error> {
        self.lend_substitute(defect_id, actor, entry).await
    }

    async fn return_substitute(
        &self,
        defect_id: DefectId,
        actor: UserId,
    ) -> Result<DefectRecord, Error> {
        self.take_back_substitute(defect_id, actor).await
    }

    async fn resolve(
        &self,
        defect_id: DefectId,
        actor: UserId,
        request: ResolveRequest,
    ) -> Result<DefectRecord, Error> {
        self.resolve_defect(defect_id, actor, request).await
    }

    async fn close(&self, defect_id: DefectId, actor: UserId) -> Result<DefectRecord, Error> {
        self.close_defect(defect_id, actor).await
    }

    async fn scrap(
        &self,
        defect_id: DefectId,
        actor: UserId,
        reason: String,
    ) -> Result<DefectRecord, Error> {
        self.scrap_defect(defect_id, actor, reason).await
    }

    async fn cancel(
        &self,
        defect_id: DefectId,
        actor: UserId,
        reason: String,
    ) -> Result<DefectRecord, Error> {
        self.cancel_defect(defect_id, actor, reason).await
    }
}

#[async_trait]
impl DefectLifecycleQuery for DefectLifecycleService {
    async fn get(&self, defect_id: DefectId) -> Result<DefectRecord, Error> {
        self.load(defect_id).await
    }

    async fn list(&self, filter: DefectFilter) -> Result<DefectPage, Error> {
        self.ports
            .defects
            .list(&filter, self.now())
            .await
            .map_err(map_store_error)
    }

    async fn stats(&self, filter: DefectStatsFilter) -> Result<DefectStats, Error> {
        self.ports
            .defects
            .stats(&filter, self.now())
            .await
            .map_err(map_store_error)
    }

    async fn available_actions(&self, defect_id: DefectId) -> Result<Vec<Transition>, Error> {
        let record = self.load(defect_id).await?;
        Ok(self.machine.available_actions(record.status()).to_vec())
    }

    async fn vendor_tickets(&self, defect_id: DefectId) -> Result<Vec<VendorTicket>, Error> {
        let record = self.load(defect_id).await?;
        self.tickets.list_for_defect(record.id).await
    }
}

#[cfg(test)]
#[path = "defect_lifecycle_service_tests.rs"]
mod tests;
