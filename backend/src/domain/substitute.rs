//! Spare servers loaned out while an original unit is under repair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::text_enum::text_enum;
use crate::domain::{DefectId, ServerId, SubstituteId, UserId};

text_enum! {
    /// Pool status of a spare server.
    pub enum SubstituteStatus ("substitute status") {
        /// Ready to lend.
        Available => "AVAILABLE",
        /// On loan against a defect.
        Issued => "ISSUED" | "IN_USE",
        /// Temporarily withdrawn from the pool.
        Maintenance => "MAINTENANCE",
    }
}

/// One spare server in the substitute pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstitutePoolEntry {
    /// Pool entry identifier.
    pub id: SubstituteId,
    /// The spare server.
    pub server_id: ServerId,
    /// Chassis serial of the spare.
    pub serial_number: String,
    /// Pool status.
    pub status: SubstituteStatus,
    /// Defect the spare is currently issued against.
    pub current_defect_id: Option<DefectId>,
    /// Who took the spare.
    pub issued_to: Option<UserId>,
    /// When it was issued.
    pub issued_at: Option<DateTime<Utc>>,
    /// When it was last returned.
    pub returned_at: Option<DateTime<Utc>>,
    /// Completed loans.
    pub usage_count: u32,
}

impl SubstitutePoolEntry {
    /// A fresh pool entry, available for loan.
    pub const fn available(id: SubstituteId, server_id: ServerId, serial_number: String) -> Self {
        Self {
            id,
            server_id,
            serial_number,
            status: SubstituteStatus::Available,
            current_defect_id: None,
            issued_to: None,
            issued_at: None,
            returned_at: None,
            usage_count: 0,
        }
    }
}
