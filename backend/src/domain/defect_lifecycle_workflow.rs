//! Diagnosis, repair, generic status changes and replacement parts.

use chrono::{DateTime, Utc};
use serde_json::json;

use super::{DefectLifecycleService, defect_entry, non_blank};
use crate::domain::defects::{
    DefectAction, DefectRecord, DefectStatus, ReplacementDetails,
};
use crate::domain::history::HistoryAction;
use crate::domain::inventory::{InventoryStatus, ServerComponent};
use crate::domain::inventory_ledger;
use crate::domain::ports::{
    DiagnosisRevision, ReplacementRequest, ReplacementSource, ResolveRequest, VendorReturn,
};
use crate::domain::unit_of_work::{DefectVersion, EntityWrite};
use crate::domain::vendor_ticket::VendorTicketRequest;
use crate::domain::{ComponentId, DefectId, Error, ServerComponentId, UnitOfWork, UserId};

impl DefectLifecycleService {
    pub(super) async fn begin_diagnosis(
        &self,
        defect_id: DefectId,
        diagnostician: UserId,
    ) -> Result<DefectRecord, Error> {
        self.ensure_user(diagnostician).await?;
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        let next = self.target(&record, DefectAction::StartDiagnosis)?;
        let expected = DefectVersion::of(&record);
        let at = self.now();

        record.diagnosis.diagnostician = Some(diagnostician);
        record.diagnosis.started_at = Some(at);
        record.move_to(next, at);

        let mut unit = UnitOfWork::new();
        unit.update_defect(expected, record.clone());
        unit.record(defect_entry(
            &record,
            HistoryAction::DiagnosisStarted,
            diagnostician,
            previous,
            at,
        ));
        self.commit(unit, &record, "diagnosis started").await?;
        Ok(record)
    }

    /// Record the diagnosis outcome.
    ///
    /// Without an explicit next status the record takes the diagnosis
    /// action's target; a record already past diagnosis keeps its status.
    pub(super) async fn finish_diagnosis(
        &self,
        defect_id: DefectId,
        actor: UserId,
        revision: DiagnosisRevision,
    ) -> Result<DefectRecord, Error> {
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        self.machine.ensure_mutable(previous)?;
        let next = match revision.next_status {
            Some(next) if next.is_finished() => {
                return Err(Error::invalid_request(format!(
                    "diagnosis cannot move a defect to {next}"
                )));
            }
            Some(next) => {
                self.machine.assert_transition(previous, next)?;
                next
            }
            None => self
                .machine
                .target_for(previous, DefectAction::CompleteDiagnosis)
                .or_else(|| {
                    self.machine
                        .target_for(previous, DefectAction::MarkDiagnosed)
                })
                .unwrap_or(previous),
        };
        if next == previous && matches!(previous, DefectStatus::New | DefectStatus::Repeated) {
            return Err(Error::illegal_transition(format!(
                "diagnosis of defect {defect_id} has not started"
            )));
        }
        let expected = DefectVersion::of(&record);
        let at = self.now();
        let mut unit = UnitOfWork::new();

        if let Some(category) = revision.category {
            record.category = category;
        }
        if let Some(description) = non_blank(revision.description.as_deref()) {
            record.description = description;
        }
        if let Some(serials) = revision.serials.filter(|serials| !serials.is_empty()) {
            let unlinked = record.defective_part.inventory_id.is_none()
                && record.defective_part.server_component_id.is_none();
            if unlinked {
                record.defective_part = self
                    .resolve_defective_part(record.server_id, record.category, serials)
                    .await?;
                if let Some(marked) = self.plan_mark_defective(&record, actor, at).await? {
                    unit.absorb(marked);
                }
            } else {
                record.defective_part.serials = serials;
            }
        }
        record.append_note("Diagnosis", revision.notes.as_deref());
        record.diagnosis.completed_at = Some(at);
        if record.diagnosis.diagnostician.is_none() {
            record.diagnosis.diagnostician = Some(actor);
        }
        record.move_to(next, at);

        unit.update_defect(expected, record.clone());
        unit.record(
            defect_entry(&record, HistoryAction::DiagnosisCompleted, actor, previous, at)
                .with_meta("category", record.category.as_str()),
        );
        self.commit(unit, &record, "diagnosis completed").await?;
        Ok(record)
    }

    pub(super) async fn await_parts(
        &self,
        defect_id: DefectId,
        actor: UserId,
        notes: Option<String>,
    ) -> Result<DefectRecord, Error> {
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        self.guard_move(&record, DefectStatus::WaitingParts)?;
        let expected = DefectVersion::of(&record);
        let at = self.now();

        record.append_note("Waiting for parts", notes.as_deref());
        record.move_to(DefectStatus::WaitingParts, at);

        let mut unit = UnitOfWork::new();
        unit.update_defect(expected, record.clone());
        unit.record(
            defect_entry(&record, HistoryAction::StatusChanged, actor, previous, at)
                .with_note(notes.unwrap_or_default()),
        );
        self.commit(unit, &record, "waiting for parts").await?;
        Ok(record)
    }

    pub(super) async fn begin_repair(
        &self,
        defect_id: DefectId,
        actor: UserId,
    ) -> Result<DefectRecord, Error> {
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        self.guard_move(&record, DefectStatus::Repairing)?;
        let expected = DefectVersion::of(&record);
        let at = self.now();

        if record.repair.started_at.is_none() {
            record.repair.started_at = Some(at);
        }
        record.move_to(DefectStatus::Repairing, at);

        let mut unit = UnitOfWork::new();
        unit.update_defect(expected, record.clone());
        unit.record(defect_entry(
            &record,
            HistoryAction::RepairStarted,
            actor,
            previous,
            at,
        ));
        self.commit(unit, &record, "repair started").await?;
        Ok(record)
    }

    /// Guarded move to any status, routed through the dedicated operation
    /// when that status carries its own bookkeeping.
    pub(super) async fn change_status(
        &self,
        defect_id: DefectId,
        actor: UserId,
        status: DefectStatus,
        comment: Option<String>,
    ) -> Result<DefectRecord, Error> {
        let record = self.load(defect_id).await?;
        let previous = record.status();
        self.guard_move(&record, status)?;
        if status != previous {
            match status {
                DefectStatus::Diagnosing => return self.begin_diagnosis(defect_id, actor).await,
                DefectStatus::WaitingParts => {
                    return self.await_parts(defect_id, actor, comment).await;
                }
                DefectStatus::Repairing => return self.begin_repair(defect_id, actor).await,
                DefectStatus::SentToVendor | DefectStatus::InVendorRepair => {
                    return self
                        .ship_to_vendor(defect_id, actor, VendorTicketRequest::default())
                        .await;
                }
                DefectStatus::Returned => {
                    let details = VendorReturn {
                        resolution: comment,
                        ..VendorReturn::default()
                    };
                    return self.receive_from_vendor(defect_id, actor, details).await;
                }
                DefectStatus::SubstituteIssued => {
                    return self.lend_substitute(defect_id, actor, None).await;
                }
                DefectStatus::Resolved => {
                    let request = ResolveRequest {
                        resolution: comment.unwrap_or_default(),
                        repair_details: None,
                        notes: None,
                    };
                    return self.resolve_defect(defect_id, actor, request).await;
                }
                DefectStatus::Closed => return self.close_defect(defect_id, actor).await,
                DefectStatus::Scrapped => {
                    return self
                        .scrap_defect(defect_id, actor, comment.unwrap_or_default())
                        .await;
                }
                DefectStatus::Cancelled => {
                    return self
                        .cancel_defect(defect_id, actor, comment.unwrap_or_default())
                        .await;
                }
                _ => {}
            }
        }
        self.plain_status_change(record, actor, status, comment).await
    }

    async fn plain_status_change(
        &self,
        mut record: DefectRecord,
        actor: UserId,
        status: DefectStatus,
        comment: Option<String>,
    ) -> Result<DefectRecord, Error> {
        let previous = record.status();
        let expected = DefectVersion::of(&record);
        let at = self.now();
        let comment = non_blank(comment.as_deref());

        record.metadata.last_status_comment.clone_from(&comment);
        record.move_to(status, at);

        let mut unit = UnitOfWork::new();
        unit.update_defect(expected, record.clone());
        unit.record(
            defect_entry(&record, HistoryAction::StatusChanged, actor, previous, at)
                .with_note(comment.unwrap_or_default()),
        );
        self.commit(unit, &record, "status changed").await?;
        Ok(record)
    }

    /// Reserve `component_id` as the replacement, releasing any earlier pick.
    pub(super) async fn reserve_part(
        &self,
        defect_id: DefectId,
        component_id: ComponentId,
        actor: UserId,
    ) -> Result<DefectRecord, Error> {
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        self.machine.ensure_mutable(previous)?;
        if record.replacement.server_component_id.is_some() {
            return Err(Error::invalid_state(format!(
                "defect {defect_id} already has its replacement installed"
            )));
        }
        let expected = DefectVersion::of(&record);
        let at = self.now();
        let mut unit = UnitOfWork::new();

        if let Some(earlier) = self.reserved_replacement(&record).await? {
            if earlier.id == component_id {
                return Err(Error::invalid_state(format!(
                    "component {component_id} is already reserved for defect {defect_id}"
                ))
                .with_details(json!({
                    "componentId": component_id.to_string(),
                    "code": "already_reserved",
                })));
            }
            let released = inventory_ledger::release(
                earlier,
                actor,
                Some("superseded by another reservation"),
                at,
            )?;
            unit.absorb(released.unit);
        }
        let reserved = self
            .ledger
            .plan_reserve(component_id, record.id, actor, at)
            .await?;

        record.replacement.inventory_id = Some(component_id);
        record.replacement.serials = reserved.component.serials();
        match self.machine.target_for(previous, DefectAction::ReserveParts) {
            Some(next) => record.move_to(next, at),
            None => record.touch(at),
        }

        unit.update_defect(expected, record.clone());
        unit.absorb(reserved.unit);
        unit.record(
            defect_entry(&record, HistoryAction::PartReserved, actor, previous, at)
                .with_meta("componentId", component_id.to_string()),
        );
        self.commit(unit, &record, "replacement reserved").await?;
        Ok(record)
    }

    /// Swap the defective part for a ledger component or an off-ledger part.
    pub(super) async fn replace_part(
        &self,
        defect_id: DefectId,
        actor: UserId,
        request: ReplacementRequest,
    ) -> Result<DefectRecord, Error> {
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        self.machine.ensure_mutable(previous)?;
        if record.replacement.server_component_id.is_some() {
            return Err(Error::invalid_state(format!(
                "defect {defect_id} already has its replacement installed"
            )));
        }
        let expected = DefectVersion::of(&record);
        let at = self.now();
        let mut unit = UnitOfWork::new();

        let reserved = self.reserved_replacement(&record).await?;
        let mut history = match request.source {
            ReplacementSource::Inventory { component_id } => {
                if let Some(other) = reserved.filter(|reserved| reserved.id != component_id) {
                    let released = inventory_ledger::release(
                        other,
                        actor,
                        Some("replaced by another component"),
                        at,
                    )?;
                    unit.absorb(released.unit);
                }
                let installed = self
                    .ledger
                    .plan_install(component_id, record.server_id, actor, Some(record.id), at)
                    .await?;
                let part = ServerComponent {
                    id: ServerComponentId::random(),
                    server_id: record.server_id,
                    category: installed.component.category,
                    serials: installed.component.serials(),
                    manufacturer: installed.component.manufacturer.clone(),
                    model: installed.component.model.clone(),
                    inventory_id: Some(component_id),
                    installed_during_defect: Some(record.id),
                    installed_by: actor,
                    installed_at: at,
                };
                record.replacement = ReplacementDetails {
                    serials: part.serials.clone(),
                    inventory_id: Some(component_id),
                    server_component_id: Some(part.id),
                    replaced_by: Some(actor),
                    replaced_at: Some(at),
                };
                unit.absorb(installed.unit);
                unit.push(EntityWrite::InsertServerComponent(part));
                self.plan_detach(&record, actor, at, &mut unit).await?;
                defect_entry(&record, HistoryAction::PartReplaced, actor, previous, at)
                    .with_meta("componentId", component_id.to_string())
            }
            ReplacementSource::RawSerials { serials } => {
                if serials.is_empty() {
                    return Err(Error::invalid_request(
                        "replacement serials must not be blank",
                    ));
                }
                if let Some(unused) = reserved {
                    let released = inventory_ledger::release(
                        unused,
                        actor,
                        Some("replaced by an off-ledger part"),
                        at,
                    )?;
                    unit.absorb(released.unit);
                }
                record.replacement = ReplacementDetails {
                    serials,
                    inventory_id: None,
                    server_component_id: None,
                    replaced_by: Some(actor),
                    replaced_at: Some(at),
                };
                defect_entry(&record, HistoryAction::PartReplaced, actor, previous, at)
            }
        };
        record.append_note("Replacement", request.notes.as_deref());
        record.touch(at);
        if let Some(serial) = record.replacement.serials.iter().next() {
            history = history.with_meta("replacementSerial", serial);
        }

        unit.update_defect(expected, record.clone());
        unit.record(history);
        self.commit(unit, &record, "part replaced").await?;
        Ok(record)
    }

    /// Pull the defective component out of the server when it is still in.
    async fn plan_detach(
        &self,
        record: &DefectRecord,
        actor: UserId,
        at: DateTime<Utc>,
        unit: &mut UnitOfWork,
    ) -> Result<(), Error> {
        let Some(component) = self.tracked_component(record).await? else {
            return Ok(());
        };
        let in_server = component.current_server_id == Some(record.server_id)
            && matches!(
                component.status(),
                InventoryStatus::InUse | InventoryStatus::Defective
            );
        if in_server {
            let detached = inventory_ledger::detach_defective(component, actor, record.id, at)?;
            unit.absorb(detached.unit);
        }
        Ok(())
    }
}
