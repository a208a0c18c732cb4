//! Read models for the server registry and user directory collaborators.

use serde::{Deserialize, Serialize};

use crate::domain::text_enum::text_enum;
use crate::domain::{ServerId, UserId};

text_enum! {
    /// Production status of a server unit as kept by the registry.
    pub enum ServerStatus ("server status") {
        /// Registered, work not started.
        New => "NEW",
        /// On the assembly or test line.
        InProgress => "IN_PROGRESS" | "IN_WORK",
        /// Taken off the line because of a defect.
        Defect => "DEFECT",
        /// Finished and operational.
        Done => "DONE",
        /// Shipped or retired.
        Archived => "ARCHIVED",
    }
}

/// Minimal view of a server unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    /// Server identifier.
    pub id: ServerId,
    /// Chassis serial.
    pub serial_number: String,
    /// Current production status.
    pub status: ServerStatus,
}

/// Minimal view of a plant user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// User identifier.
    pub id: UserId,
    /// Name shown in history and lists.
    pub display_name: String,
}
