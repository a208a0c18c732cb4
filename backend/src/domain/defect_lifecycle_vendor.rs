//! Vendor round trip of a defective part or unit.

use tracing::debug;

use super::{DefectLifecycleService, defect_entry, non_blank};
use crate::domain::defects::{DefectAction, DefectRecord, VendorTracking};
use crate::domain::history::HistoryAction;
use crate::domain::inventory::InventoryStatus;
use crate::domain::inventory_ledger;
use crate::domain::ports::VendorReturn;
use crate::domain::store_errors::map_store_error;
use crate::domain::unit_of_work::DefectVersion;
use crate::domain::vendor_ticket::VendorTicketRequest;
use crate::domain::{DefectId, Error, UnitOfWork, UserId};

impl DefectLifecycleService {
    pub(super) async fn ship_to_vendor(
        &self,
        defect_id: DefectId,
        actor: UserId,
        request: VendorTicketRequest,
    ) -> Result<DefectRecord, Error> {
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        let next = self.target(&record, DefectAction::SendToVendor)?;
        let expected = DefectVersion::of(&record);
        let at = self.now();
        let server = self
            .ports
            .servers
            .find_server(record.server_id)
            .await
            .map_err(map_store_error)?;

        let ticket = self
            .tickets
            .plan_submission(&record, server.as_ref(), &request, actor, at)
            .await?;
        let mut unit = UnitOfWork::new();
        if let Some(component) = self.tracked_component(&record).await? {
            if component.status() == InventoryStatus::Defective {
                let shipped = inventory_ledger::send_to_vendor(
                    component,
                    &ticket.ticket.ticket_number,
                    actor,
                    at,
                )?;
                unit.absorb(shipped.unit);
            } else {
                debug!(
                    component_id = %component.id,
                    status = %component.status(),
                    "tracked component not shipped with the defect"
                );
            }
        }

        record.vendor = VendorTracking {
            ticket_number: Some(ticket.ticket.ticket_number.clone()),
            sent_at: Some(at),
            returned_at: None,
        };
        record.move_to(next, at);

        unit.update_defect(expected, record.clone());
        unit.record(
            defect_entry(&record, HistoryAction::SentToVendor, actor, previous, at)
                .with_meta("ticketNumber", ticket.ticket.ticket_number.clone())
                .with_meta("placeholder", ticket.ticket.placeholder),
        );
        unit.absorb(ticket.unit);
        self.commit(unit, &record, "sent to vendor").await?;
        Ok(record)
    }

    pub(super) async fn receive_from_vendor(
        &self,
        defect_id: DefectId,
        actor: UserId,
        details: VendorReturn,
    ) -> Result<DefectRecord, Error> {
        let mut record = self.load(defect_id).await?;
        let previous = record.status();
        let next = self.target(&record, DefectAction::ReturnFromVendor)?;
        let expected = DefectVersion::of(&record);
        let at = self.now();
        let resolution = non_blank(details.resolution.as_deref());
        let replacement_serials = details
            .replacement_serials
            .filter(|serials| !serials.is_empty());

        let receipt = self
            .tickets
            .plan_receipt(
                record.id,
                resolution.as_deref(),
                replacement_serials.as_ref(),
                actor,
                at,
            )
            .await?;
        let mut unit = UnitOfWork::new();
        if let Some(component) = self.tracked_component(&record).await? {
            if component.status() == InventoryStatus::InRepair {
                let returned =
                    inventory_ledger::return_from_vendor(component, actor, details.condition, at)?;
                unit.absorb(returned.unit);
            }
        }

        record.vendor.returned_at = Some(at);
        record.append_note("Vendor resolution", resolution.as_deref());
        if let Some(serials) = &replacement_serials {
            record.replacement.serials = record.replacement.serials.merged_with(serials);
        }
        record.move_to(next, at);

        unit.update_defect(expected, record.clone());
        let mut history = defect_entry(
            &record,
            HistoryAction::ReturnedFromVendor,
            actor,
            previous,
            at,
        );
        if let Some(number) = record.vendor.ticket_number.as_deref() {
            history = history.with_meta("ticketNumber", number);
        }
        unit.record(history);
        let received = receipt.map(|plan| {
            unit.absorb(plan.unit);
            plan.ticket
        });
        self.commit(unit, &record, "returned from vendor").await?;
        if let Some(ticket) = &received {
            self.tickets.notify_received(ticket).await;
        }
        Ok(record)
    }
}
