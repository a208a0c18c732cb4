//! Vendor ticket bookkeeping for defects sent out for repair.
//!
//! Planning never talks to the vendor except to obtain a ticket number; the
//! received and closed notifications are sent only after the local unit of
//! work has committed, and their failures are logged rather than returned.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::warn;

use crate::domain::defects::{DefectRecord, PartSerials};
use crate::domain::history::{HistoryAction, HistoryEntityType, HistoryEntry};
use crate::domain::ports::{
    VendorGateway, VendorTicketRepository, VendorTicketSubmission,
};
use crate::domain::servers::ServerSummary;
use crate::domain::store_errors::map_store_error;
use crate::domain::unit_of_work::EntityWrite;
use crate::domain::vendor_ticket::{
    TicketStatus, TicketType, VendorTicket, VendorTicketRequest,
};
use crate::domain::{DefectId, Error, UnitOfWork, UserId, VendorTicketId};

/// A ticket change and the unit of work that commits it.
#[derive(Debug, Clone)]
pub(crate) struct TicketPlan {
    pub(crate) ticket: VendorTicket,
    pub(crate) unit: UnitOfWork,
}

/// Ticket number used when the vendor system cannot issue one.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use repair_backend::domain::{DefectId, placeholder_ticket_number};
///
/// let at = Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap();
/// let id: DefectId = "0a1b2c3d-0000-4000-8000-000000000000".parse().unwrap();
/// assert_eq!(placeholder_ticket_number(at, id), "YT-PENDING-20260309140507-0A1B2C3D");
/// ```
pub fn placeholder_ticket_number(at: DateTime<Utc>, defect_id: DefectId) -> String {
    let simple = defect_id.as_uuid().simple().to_string();
    let prefix: String = simple.chars().take(8).collect();
    format!(
        "YT-PENDING-{}-{}",
        at.format("%Y%m%d%H%M%S"),
        prefix.to_ascii_uppercase()
    )
}

/// Opens, receives, and closes vendor tickets on behalf of defects.
#[derive(Clone)]
pub struct VendorTicketCoordinator {
    tickets: Arc<dyn VendorTicketRepository>,
    gateway: Arc<dyn VendorGateway>,
}

impl VendorTicketCoordinator {
    /// Build a coordinator over the ticket store and vendor gateway.
    pub fn new(tickets: Arc<dyn VendorTicketRepository>, gateway: Arc<dyn VendorGateway>) -> Self {
        Self { tickets, gateway }
    }

    /// Every ticket raised for `defect_id`, oldest first.
    pub(crate) async fn list_for_defect(
        &self,
        defect_id: DefectId,
    ) -> Result<Vec<VendorTicket>, Error> {
        self.tickets
            .list_for_defect(defect_id)
            .await
            .map_err(map_store_error)
    }

    /// Plan the ticket for a send to the vendor.
    ///
    /// A caller-supplied number is reused when it already names an open
    /// ticket of the same defect; a RECEIVED ticket goes back to SUBMITTED
    /// for the new round trip. Without one the vendor is asked for a
    /// number, falling back to a placeholder when it cannot answer.
    pub(crate) async fn plan_submission(
        &self,
        record: &DefectRecord,
        server: Option<&ServerSummary>,
        request: &VendorTicketRequest,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<TicketPlan, Error> {
        let ticket_type = request.ticket_type.unwrap_or(TicketType::ComponentRepair);
        let subject = non_blank(request.subject.as_deref())
            .unwrap_or_else(|| default_subject(record, server));
        let description = non_blank(request.description.as_deref())
            .or_else(|| non_blank(Some(&record.description)));

        if let Some(number) = non_blank(request.ticket_number.as_deref()) {
            if let Some(existing) = self.reusable_ticket(record.id, &number).await? {
                return Ok(resubmitted(
                    existing,
                    non_blank(request.tracking_number.as_deref()),
                    actor,
                    at,
                ));
            }
            return Ok(new_ticket(
                record,
                NewTicket {
                    number,
                    placeholder: false,
                    ticket_type,
                    subject,
                    description,
                    tracking_number: non_blank(request.tracking_number.as_deref()),
                },
                actor,
                at,
            ));
        }

        let submission = VendorTicketSubmission {
            defect_id: record.id,
            server_id: record.server_id,
            ticket_type,
            category: record.category,
            serials: record.defective_part.serials.clone(),
            subject: subject.clone(),
            description: description.clone(),
        };
        let (number, placeholder) = match self.gateway.open_ticket(&submission).await {
            Ok(number) if !number.trim().is_empty() => (number.trim().to_owned(), false),
            Ok(_) => {
                warn!(
                    defect_id = %record.id,
                    "ExternalDependencyDegraded: vendor returned a blank ticket number, using placeholder"
                );
                (placeholder_ticket_number(at, record.id), true)
            }
            Err(error) => {
                warn!(
                    %error,
                    defect_id = %record.id,
                    "ExternalDependencyDegraded: vendor ticket not opened, using placeholder"
                );
                (placeholder_ticket_number(at, record.id), true)
            }
        };
        Ok(new_ticket(
            record,
            NewTicket {
                number,
                placeholder,
                ticket_type,
                subject,
                description,
                tracking_number: non_blank(request.tracking_number.as_deref()),
            },
            actor,
            at,
        ))
    }

    async fn reusable_ticket(
        &self,
        defect_id: DefectId,
        number: &str,
    ) -> Result<Option<VendorTicket>, Error> {
        let Some(existing) = self
            .tickets
            .find_by_number(number)
            .await
            .map_err(map_store_error)?
        else {
            return Ok(None);
        };
        if existing.defect_id != defect_id {
            return Err(Error::conflict(format!(
                "ticket {number} belongs to defect {}",
                existing.defect_id
            ))
            .with_details(json!({
                "ticketNumber": number,
                "defectId": existing.defect_id.to_string(),
                "code": "ticket_taken",
            })));
        }
        if !existing.status.is_open() {
            return Err(Error::conflict(format!("ticket {number} is already closed"))
                .with_details(json!({
                    "ticketNumber": number,
                    "code": "ticket_closed",
                })));
        }
        Ok(Some(existing))
    }

    /// Plan SUBMITTED → RECEIVED for the defect's open ticket.
    ///
    /// Returns `None` when the defect has no open ticket, which happens for
    /// records sent before tickets were tracked locally.
    pub(crate) async fn plan_receipt(
        &self,
        defect_id: DefectId,
        resolution: Option<&str>,
        replacement_serials: Option<&PartSerials>,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<TicketPlan>, Error> {
        let Some(mut ticket) = self.open_ticket_for(defect_id).await? else {
            return Ok(None);
        };
        if ticket.status != TicketStatus::Submitted {
            return Err(Error::invalid_state(format!(
                "ticket {} is {}, expected SUBMITTED",
                ticket.ticket_number, ticket.status
            )));
        }
        ticket.status = TicketStatus::Received;
        ticket.received_at = Some(at);
        if let Some(resolution) = non_blank(resolution) {
            ticket.resolution = Some(resolution);
        }
        if let Some(serials) = replacement_serials {
            ticket.replacement_serials = ticket.replacement_serials.merged_with(serials);
        }
        let history = ticket_entry(&ticket, HistoryAction::TicketReceived, actor, at);
        Ok(Some(updated(TicketStatus::Submitted, ticket, history)))
    }

    /// Plan closing every ticket of the defect that is still open.
    pub(crate) async fn plan_closure(
        &self,
        defect_id: DefectId,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<TicketPlan>, Error> {
        let open = self
            .list_for_defect(defect_id)
            .await?
            .into_iter()
            .filter(|ticket| ticket.status.is_open());
        Ok(open
            .map(|mut ticket| {
                let before = ticket.status;
                ticket.status = TicketStatus::Closed;
                ticket.closed_at = Some(at);
                let history = ticket_entry(&ticket, HistoryAction::TicketClosed, actor, at)
                    .with_meta("previousStatus", before.as_str());
                updated(before, ticket, history)
            })
            .collect())
    }

    async fn open_ticket_for(&self, defect_id: DefectId) -> Result<Option<VendorTicket>, Error> {
        self.tickets
            .find_open_for_defect(defect_id)
            .await
            .map_err(map_store_error)
    }

    /// Tell the vendor a committed receipt happened.
    pub(crate) async fn notify_received(&self, ticket: &VendorTicket) {
        if ticket.placeholder {
            return;
        }
        if let Err(error) = self.gateway.mark_received(&ticket.ticket_number).await {
            warn!(
                %error,
                ticket_number = %ticket.ticket_number,
                "ExternalDependencyDegraded: vendor not told about receipt"
            );
        }
    }

    /// Tell the vendor a committed closure happened.
    pub(crate) async fn notify_closed(&self, ticket: &VendorTicket) {
        if ticket.placeholder {
            return;
        }
        if let Err(error) = self.gateway.close_ticket(&ticket.ticket_number).await {
            warn!(
                %error,
                ticket_number = %ticket.ticket_number,
                "ExternalDependencyDegraded: vendor not told about closure"
            );
        }
    }
}

struct NewTicket {
    number: String,
    placeholder: bool,
    ticket_type: TicketType,
    subject: String,
    description: Option<String>,
    tracking_number: Option<String>,
}

fn new_ticket(record: &DefectRecord, new: NewTicket, actor: UserId, at: DateTime<Utc>) -> TicketPlan {
    let ticket = VendorTicket {
        id: VendorTicketId::random(),
        ticket_number: new.number,
        defect_id: record.id,
        server_id: record.server_id,
        ticket_type: new.ticket_type,
        status: TicketStatus::Submitted,
        subject: new.subject,
        description: new.description,
        category: record.category,
        serials: record.defective_part.serials.clone(),
        tracking_number: new.tracking_number,
        resolution: None,
        replacement_serials: PartSerials::default(),
        placeholder: new.placeholder,
        sent_at: at,
        received_at: None,
        closed_at: None,
        created_by: actor,
    };
    let history = ticket_entry(&ticket, HistoryAction::TicketOpened, actor, at)
        .with_meta("ticketType", ticket.ticket_type.as_str())
        .with_meta("placeholder", ticket.placeholder);
    let mut unit = UnitOfWork::new();
    unit.push(EntityWrite::InsertTicket(ticket.clone()));
    unit.record(history);
    TicketPlan { ticket, unit }
}

fn resubmitted(
    mut ticket: VendorTicket,
    tracking_number: Option<String>,
    actor: UserId,
    at: DateTime<Utc>,
) -> TicketPlan {
    let before = ticket.status;
    if before == TicketStatus::Submitted {
        let mut unit = UnitOfWork::new();
        unit.record(
            ticket_entry(&ticket, HistoryAction::TicketOpened, actor, at).with_meta("reused", true),
        );
        return TicketPlan { ticket, unit };
    }
    ticket.status = TicketStatus::Submitted;
    ticket.sent_at = at;
    ticket.received_at = None;
    if tracking_number.is_some() {
        ticket.tracking_number = tracking_number;
    }
    let history = ticket_entry(&ticket, HistoryAction::TicketOpened, actor, at)
        .with_meta("reused", true)
        .with_meta("previousStatus", before.as_str());
    updated(before, ticket, history)
}

fn updated(expected: TicketStatus, ticket: VendorTicket, history: HistoryEntry) -> TicketPlan {
    let mut unit = UnitOfWork::new();
    unit.push(EntityWrite::UpdateTicket {
        ticket: ticket.clone(),
        expected,
    });
    unit.record(history);
    TicketPlan { ticket, unit }
}

fn ticket_entry(
    ticket: &VendorTicket,
    action: HistoryAction,
    actor: UserId,
    at: DateTime<Utc>,
) -> HistoryEntry {
    HistoryEntry::new(HistoryEntityType::VendorTicket, ticket.id, action, actor, at)
        .with_meta("ticketNumber", ticket.ticket_number.clone())
        .with_meta("defectId", ticket.defect_id.to_string())
}

fn default_subject(record: &DefectRecord, server: Option<&ServerSummary>) -> String {
    let unit = server.map_or_else(
        || record.server_id.to_string(),
        |server| server.serial_number.clone(),
    );
    format!("Repair {} - server {unit}", record.category.label())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
#[path = "vendor_ticket_coordinator_tests.rs"]
mod tests;
