//! Substitute loans and the finishing operations: resolve, close, scrap, cancel.

use chrono::{DateTime, Utc};

use super::{DefectLifecycleService, defect_entry};
use crate::domain::defects::{
    DefectAction, DefectRecord, ResolutionDetails, SubstituteAssignment,
};
use crate::domain::history::HistoryAction;
use crate::domain::inventory::InventoryStatus;
use crate::domain::inventory_ledger;
use crate::domain::ports::ResolveRequest;
use crate::domain::servers::ServerStatus;
use crate::domain::unit_of_work::{DefectVersion, EntityWrite};
use crate::domain::vendor_ticket::VendorTicket;
use crate::domain::{DefectId, Error, SubstituteId, UnitOfWork, UserId};

impl DefectLifecycleService {
    pub(super) async fn lend_substitute(
        &self,
        defect_id: DefectId,
        actor: UserId,
        entry: Option<SubstituteId>,
    ) -> Result<DefectRecord, Error> {
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        self.machine.ensure_mutable(previous)?;
        if let Some(current) = &record.substitute {
            return Err(Error::invalid_state(format!(
                "defect {defect_id} already holds substitute {}",
                current.serial
            )));
        }
        let expected = DefectVersion::of(&record);
        let at = self.now();
        let issued = self
            .substitutes
            .plan_issue(record.id, entry, actor, at)
            .await?;

        record.substitute = Some(SubstituteAssignment {
            entry_id: issued.entry.id,
            server_id: issued.entry.server_id,
            serial: issued.entry.serial_number.clone(),
            issued_at: at,
        });
        match self.machine.target_for(previous, DefectAction::IssueSubstitute) {
            Some(next) => record.move_to(next, at),
            None => record.touch(at),
        }

        let mut unit = UnitOfWork::new();
        unit.update_defect(expected, record.clone());
        unit.absorb(issued.unit);
        unit.record(
            defect_entry(&record, HistoryAction::SubstituteIssued, actor, previous, at)
                .with_meta("substituteSerial", issued.entry.serial_number),
        );
        self.commit(unit, &record, "substitute issued").await?;
        Ok(record)
    }

    pub(super) async fn take_back_substitute(
        &self,
        defect_id: DefectId,
        actor: UserId,
    ) -> Result<DefectRecord, Error> {
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        self.machine.ensure_mutable(previous)?;
        let Some(assignment) = record.substitute.clone() else {
            return Err(Error::invalid_request(format!(
                "defect {defect_id} has no substitute issued"
            )));
        };
        let expected = DefectVersion::of(&record);
        let at = self.now();
        let returned = self
            .substitutes
            .plan_return(assignment.entry_id, record.id, actor, at)
            .await?;

        record.substitute = None;
        match self.machine.target_for(previous, DefectAction::ReturnSubstitute) {
            Some(next) => record.move_to(next, at),
            None => record.touch(at),
        }

        let mut unit = UnitOfWork::new();
        unit.update_defect(expected, record.clone());
        unit.absorb(returned.unit);
        unit.record(
            defect_entry(&record, HistoryAction::SubstituteReturned, actor, previous, at)
                .with_meta("substituteSerial", assignment.serial),
        );
        self.commit(unit, &record, "substitute returned").await?;
        Ok(record)
    }

    /// Resolve the defect, closing its tickets and returning any substitute.
    pub(super) async fn resolve_defect(
        &self,
        defect_id: DefectId,
        actor: UserId,
        request: ResolveRequest,
    ) -> Result<DefectRecord, Error> {
        let resolution = request.resolution.trim().to_owned();
        if resolution.is_empty() {
            return Err(Error::invalid_request("a resolution is required"));
        }
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        let next = self.target(&record, DefectAction::Resolve)?;
        let expected = DefectVersion::of(&record);
        let at = self.now();
        let downtime = record.downtime_minutes(at);

        let mut unit = UnitOfWork::new();
        let closed = self.plan_ticket_closure(&record, actor, at, &mut unit).await?;

        record.resolution = ResolutionDetails {
            resolution: Some(resolution),
            resolved_by: Some(actor),
            resolved_at: Some(at),
            total_downtime_minutes: Some(downtime),
        };
        record.repair.completed_at = Some(at);
        if let Some(details) = request
            .repair_details
            .as_deref()
            .map(str::trim)
            .filter(|details| !details.is_empty())
        {
            record.repair.details = Some(details.to_owned());
        }
        record.append_note("Resolution", request.notes.as_deref());
        record.move_to(next, at);

        unit.update_defect(expected, record.clone());
        unit.push(EntityWrite::SetServerStatus {
            server_id: record.server_id,
            status: ServerStatus::Done,
        });
        unit.record(
            defect_entry(&record, HistoryAction::Resolved, actor, previous, at)
                .with_meta("downtimeMinutes", downtime),
        );
        self.commit(unit, &record, "defect resolved").await?;
        self.notify_closed(&closed).await;
        self.auto_return_substitute(&mut record, actor, at).await;
        Ok(record)
    }

    pub(super) async fn close_defect(
        &self,
        defect_id: DefectId,
        actor: UserId,
    ) -> Result<DefectRecord, Error> {
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        let next = self.target(&record, DefectAction::Close)?;
        let expected = DefectVersion::of(&record);
        let at = self.now();

        let mut unit = UnitOfWork::new();
        let closed = self.plan_ticket_closure(&record, actor, at, &mut unit).await?;
        record.move_to(next, at);

        unit.update_defect(expected, record.clone());
        unit.record(defect_entry(
            &record,
            HistoryAction::Closed,
            actor,
            previous,
            at,
        ));
        self.commit(unit, &record, "defect closed").await?;
        self.notify_closed(&closed).await;
        self.auto_return_substitute(&mut record, actor, at).await;
        Ok(record)
    }

    /// Write the defect off, scrapping the defective component with it.
    pub(super) async fn scrap_defect(
        &self,
        defect_id: DefectId,
        actor: UserId,
        reason: String,
    ) -> Result<DefectRecord, Error> {
        let reason = required_reason(&reason, "scrapping")?;
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        let next = self.target(&record, DefectAction::Scrap)?;
        let expected = DefectVersion::of(&record);
        let at = self.now();

        let mut unit = UnitOfWork::new();
        self.plan_reservation_release(&record, actor, at, &mut unit)
            .await?;
        if let Some(component) = self.tracked_component(&record).await? {
            if component.status() == InventoryStatus::Defective {
                let scrapped = inventory_ledger::scrap(component, actor, &reason, at)?;
                unit.absorb(scrapped.unit);
            }
        }
        let closed = self.plan_ticket_closure(&record, actor, at, &mut unit).await?;
        record.metadata.scrap_reason = Some(reason.clone());
        record.move_to(next, at);

        unit.update_defect(expected, record.clone());
        unit.record(
            defect_entry(&record, HistoryAction::Scrapped, actor, previous, at).with_note(reason),
        );
        self.commit(unit, &record, "defect scrapped").await?;
        self.notify_closed(&closed).await;
        self.auto_return_substitute(&mut record, actor, at).await;
        Ok(record)
    }

    pub(super) async fn cancel_defect(
        &self,
        defect_id: DefectId,
        actor: UserId,
        reason: String,
    ) -> Result<DefectRecord, Error> {
        let reason = required_reason(&reason, "cancelling")?;
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        let next = self.target(&record, DefectAction::Cancel)?;
        let expected = DefectVersion::of(&record);
        let at = self.now();

        let mut unit = UnitOfWork::new();
        self.plan_reservation_release(&record, actor, at, &mut unit)
            .await?;
        let closed = self.plan_ticket_closure(&record, actor, at, &mut unit).await?;
        record.metadata.cancel_reason = Some(reason.clone());
        record.move_to(next, at);

        unit.update_defect(expected, record.clone());
        unit.record(
            defect_entry(&record, HistoryAction::Cancelled, actor, previous, at).with_note(reason),
        );
        self.commit(unit, &record, "defect cancelled").await?;
        self.notify_closed(&closed).await;
        self.auto_return_substitute(&mut record, actor, at).await;
        Ok(record)
    }

    async fn plan_ticket_closure(
        &self,
        record: &DefectRecord,
        actor: UserId,
        at: DateTime<Utc>,
        unit: &mut UnitOfWork,
    ) -> Result<Vec<VendorTicket>, Error> {
        let plans = self.tickets.plan_closure(record.id, actor, at).await?;
        Ok(plans
            .into_iter()
            .map(|plan| {
                unit.absorb(plan.unit);
                plan.ticket
            })
            .collect())
    }

    async fn plan_reservation_release(
        &self,
        record: &DefectRecord,
        actor: UserId,
        at: DateTime<Utc>,
        unit: &mut UnitOfWork,
    ) -> Result<(), Error> {
        if let Some(reserved) = self.reserved_replacement(record).await? {
            let note = format!("defect {} withdrawn", record.id);
            let released = inventory_ledger::release(reserved, actor, Some(&note), at)?;
            unit.absorb(released.unit);
        }
        Ok(())
    }
}

fn required_reason(reason: &str, what: &str) -> Result<String, Error> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_request(format!("{what} requires a reason")));
    }
    Ok(trimmed.to_owned())
}
