//! Vendor repair tickets mirrored locally for each send cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::defects::{PartCategory, PartSerials};
use crate::domain::text_enum::text_enum;
use crate::domain::{DefectId, ServerId, UserId, VendorTicketId};

text_enum! {
    /// What the vendor is asked to do.
    pub enum TicketType ("ticket type") {
        /// Repair a single part.
        ComponentRepair => "COMPONENT_REPAIR",
        /// Repair the whole server.
        ServerRepair => "SERVER_REPAIR",
        /// Swap the part for a new one.
        Replacement => "REPLACEMENT",
    }
}

text_enum! {
    /// Vendor ticket lifecycle.
    pub enum TicketStatus ("ticket status") {
        /// Shipped and logged with the vendor.
        Submitted => "SUBMITTED" | "SENT",
        /// The vendor sent the part or unit back.
        Received => "RECEIVED",
        /// Closed after the defect was resolved.
        Closed => "CLOSED",
    }
}

impl TicketStatus {
    /// Tickets that still track an active send cycle.
    pub const fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// Caller-supplied details for a send to the vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorTicketRequest {
    /// Ticket number already agreed with the vendor.
    #[serde(default)]
    pub ticket_number: Option<String>,
    /// Ticket type; defaults to component repair.
    #[serde(default)]
    pub ticket_type: Option<TicketType>,
    /// Subject line.
    #[serde(default)]
    pub subject: Option<String>,
    /// Description sent to the vendor.
    #[serde(default)]
    pub description: Option<String>,
    /// Courier tracking number.
    #[serde(default)]
    pub tracking_number: Option<String>,
}

/// Local mirror of one vendor repair engagement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorTicket {
    /// Local identifier.
    pub id: VendorTicketId,
    /// Ticket number shared with the vendor.
    pub ticket_number: String,
    /// Defect the ticket belongs to.
    pub defect_id: DefectId,
    /// Affected server.
    pub server_id: ServerId,
    /// Requested work.
    pub ticket_type: TicketType,
    /// Lifecycle status.
    pub status: TicketStatus,
    /// Subject line.
    pub subject: String,
    /// Description.
    pub description: Option<String>,
    /// Category of the part sent.
    pub category: PartCategory,
    /// Serials of the part sent.
    pub serials: PartSerials,
    /// Courier tracking number.
    pub tracking_number: Option<String>,
    /// Vendor's resolution text.
    pub resolution: Option<String>,
    /// Serials of any replacement the vendor sent back.
    pub replacement_serials: PartSerials,
    /// Whether the number was synthesized because the vendor was unreachable.
    pub placeholder: bool,
    /// When the part or unit was shipped.
    pub sent_at: DateTime<Utc>,
    /// When it came back.
    pub received_at: Option<DateTime<Utc>>,
    /// When the ticket was closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Who opened the ticket.
    pub created_by: UserId,
}
