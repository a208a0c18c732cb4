//! Append-only history facts emitted after successful commits.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::UserId;
use crate::domain::text_enum::text_enum;

text_enum! {
    /// Kind of entity a history entry describes.
    pub enum HistoryEntityType ("history entity type") {
        /// A defect record.
        DefectRecord => "DEFECT_RECORD",
        /// An inventory component.
        Component => "COMPONENT",
        /// A vendor ticket.
        VendorTicket => "VENDOR_TICKET",
        /// A substitute pool entry.
        Substitute => "SUBSTITUTE",
    }
}

text_enum! {
    /// What happened.
    pub enum HistoryAction ("history action") {
        /// Defect record created.
        Created => "CREATED",
        /// Component received into inventory.
        Received => "RECEIVED",
        /// Component reserved.
        Reserved => "RESERVED",
        /// Reservation released.
        Released => "RELEASED",
        /// Component installed in a server.
        Installed => "INSTALLED",
        /// Component removed from a server.
        Removed => "REMOVED",
        /// Component or defect marked defective.
        MarkedDefective => "MARKED_DEFECTIVE",
        /// Sent to the vendor.
        SentToVendor => "SENT_TO_YADRO",
        /// Returned from the vendor.
        ReturnedFromVendor => "RETURNED_FROM_YADRO",
        /// Component bench-tested.
        Tested => "TESTED",
        /// Component moved to another location.
        Transferred => "TRANSFERRED",
        /// Written off.
        Scrapped => "SCRAPPED",
        /// Generic status change.
        StatusChanged => "STATUS_CHANGED",
        /// Diagnosis started.
        DiagnosisStarted => "DIAGNOSIS_STARTED",
        /// Diagnosis completed.
        DiagnosisCompleted => "DIAGNOSIS_COMPLETED",
        /// Repair started.
        RepairStarted => "REPAIR_STARTED",
        /// Replacement part reserved for a defect.
        PartReserved => "PART_RESERVED",
        /// Replacement part installed.
        PartReplaced => "PART_REPLACED",
        /// Substitute server issued.
        SubstituteIssued => "SUBSTITUTE_ISSUED",
        /// Substitute server returned.
        SubstituteReturned => "SUBSTITUTE_RETURNED",
        /// Defect resolved.
        Resolved => "RESOLVED",
        /// Defect closed.
        Closed => "CLOSED",
        /// Defect cancelled.
        Cancelled => "CANCELLED",
        /// Vendor ticket opened.
        TicketOpened => "TICKET_OPENED",
        /// Vendor ticket marked received.
        TicketReceived => "TICKET_RECEIVED",
        /// Vendor ticket closed.
        TicketClosed => "TICKET_CLOSED",
    }
}

/// One append-only history fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Kind of entity.
    pub entity_type: HistoryEntityType,
    /// Entity identifier.
    pub entity_id: Uuid,
    /// What happened.
    pub action: HistoryAction,
    /// Who did it.
    pub actor: UserId,
    /// Operator-facing note.
    pub note: Option<String>,
    /// Structured context such as previous and next status.
    pub metadata: BTreeMap<String, Value>,
    /// When it happened.
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Start an entry with no note or metadata.
    pub fn new(
        entity_type: HistoryEntityType,
        entity_id: impl Into<Uuid>,
        action: HistoryAction,
        actor: UserId,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            action,
            actor,
            note: None,
            metadata: BTreeMap::new(),
            recorded_at,
        }
    }

    /// Attach a note; blank notes are dropped.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let note = note.into();
        if !note.trim().is_empty() {
            self.note = Some(note);
        }
        self
    }

    /// Attach a metadata value.
    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }
}
