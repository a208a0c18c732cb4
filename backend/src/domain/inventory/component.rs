//! Serialised inventory components and installed-part records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::defects::{PartCategory, PartSerials};
use crate::domain::text_enum::text_enum;
use crate::domain::{ComponentId, DefectId, ServerComponentId, ServerId, UserId};

text_enum! {
    /// Ledger status of a physical component.
    pub enum InventoryStatus ("inventory status") {
        /// On the shelf, free to reserve or install.
        Available => "AVAILABLE",
        /// Held for a specific defect.
        Reserved => "RESERVED",
        /// Installed in a server.
        InUse => "IN_USE",
        /// Known bad.
        Defective => "DEFECTIVE",
        /// Out at the vendor.
        InRepair => "IN_REPAIR",
        /// Written off. Terminal.
        Scrapped => "SCRAPPED",
    }
}

impl InventoryStatus {
    /// Scrapped components never change again.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Scrapped)
    }
}

text_enum! {
    /// Physical condition of a component.
    pub enum ComponentCondition ("component condition") {
        /// Factory new.
        New => "NEW",
        /// Repaired by the vendor.
        Refurbished => "REFURBISHED",
        /// Pulled from another unit.
        Used => "USED",
        /// Known bad.
        Defective => "DEFECTIVE",
    }
}

impl ComponentCondition {
    /// Preference order when picking stock: new parts first.
    pub const fn preference_rank(&self) -> u8 {
        match self {
            Self::New => 0,
            Self::Refurbished => 1,
            Self::Used => 2,
            Self::Defective => 3,
        }
    }
}

/// Intake request for a new inventory component.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInventoryComponent {
    /// Primary serial, unique across the ledger.
    pub serial_number: String,
    /// Optional vendor serial, unique when present.
    #[serde(default)]
    pub vendor_serial: Option<String>,
    /// Part category.
    pub category: PartCategory,
    /// Manufacturer name.
    #[serde(default)]
    pub manufacturer: Option<String>,
    /// Model name.
    #[serde(default)]
    pub model: Option<String>,
    /// Condition at intake; defaults to new.
    #[serde(default)]
    pub condition: Option<ComponentCondition>,
    /// Shelf or warehouse location.
    #[serde(default)]
    pub location: Option<String>,
    /// Purchase date.
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
    /// Warranty expiry date.
    #[serde(default)]
    pub warranty_expires: Option<NaiveDate>,
    /// Catalogue reference.
    #[serde(default)]
    pub catalog_ref: Option<String>,
    /// Intake notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// One physically distinct spare or installed part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryComponent {
    /// Ledger identifier.
    pub id: ComponentId,
    /// Primary serial.
    pub serial_number: String,
    /// Secondary vendor serial.
    pub vendor_serial: Option<String>,
    /// Part category.
    pub category: PartCategory,
    /// Manufacturer name.
    pub manufacturer: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Physical condition.
    pub condition: ComponentCondition,
    pub(crate) status: InventoryStatus,
    /// Shelf or warehouse location.
    pub location: Option<String>,
    /// Purchase date.
    pub purchase_date: Option<NaiveDate>,
    /// Warranty expiry date.
    pub warranty_expires: Option<NaiveDate>,
    /// Catalogue reference.
    pub catalog_ref: Option<String>,
    /// Last bench test.
    pub last_tested_at: Option<DateTime<Utc>>,
    /// Server the part is installed in (or still sits in while defective).
    pub current_server_id: Option<ServerId>,
    /// Defect the part is reserved for.
    pub reserved_for_defect_id: Option<DefectId>,
    /// Vendor ticket covering the current repair cycle.
    pub vendor_ticket_number: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Who registered the part.
    pub created_by: Option<UserId>,
    /// Intake time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl InventoryComponent {
    /// Register a component in [`InventoryStatus::Available`].
    pub fn receive(
        id: ComponentId,
        intake: NewInventoryComponent,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            serial_number: intake.serial_number.trim().to_owned(),
            vendor_serial: intake
                .vendor_serial
                .map(|serial| serial.trim().to_owned())
                .filter(|serial| !serial.is_empty()),
            category: intake.category,
            manufacturer: intake.manufacturer,
            model: intake.model,
            condition: intake.condition.unwrap_or(ComponentCondition::New),
            status: InventoryStatus::Available,
            location: intake.location,
            purchase_date: intake.purchase_date,
            warranty_expires: intake.warranty_expires,
            catalog_ref: intake.catalog_ref,
            last_tested_at: None,
            current_server_id: None,
            reserved_for_defect_id: None,
            vendor_ticket_number: None,
            notes: intake.notes,
            created_by: Some(actor),
            created_at: at,
            updated_at: at,
        }
    }

    /// Rebuild a persisted component with its stored status.
    ///
    /// Only storage adapters should call this.
    #[must_use]
    pub fn restored_with_status(mut self, status: InventoryStatus) -> Self {
        self.status = status;
        self
    }

    /// Current ledger status.
    pub const fn status(&self) -> InventoryStatus {
        self.status
    }

    /// Serials in the shape used by defect records.
    pub fn serials(&self) -> PartSerials {
        PartSerials::new(
            self.vendor_serial.clone(),
            Some(self.serial_number.clone()),
        )
    }

    /// Case-insensitive match against either serial.
    pub fn has_serial(&self, serial: &str) -> bool {
        let wanted = serial.trim();
        self.serial_number.eq_ignore_ascii_case(wanted)
            || self
                .vendor_serial
                .as_deref()
                .is_some_and(|vendor| vendor.eq_ignore_ascii_case(wanted))
    }

    /// Whether the warranty has lapsed on `today`.
    pub fn warranty_expired(&self, today: NaiveDate) -> bool {
        self.warranty_expires.is_some_and(|expires| expires < today)
    }

    /// Whether the server and reservation links agree with the status.
    ///
    /// Reserved parts carry an owner and no server; installed parts carry a
    /// server and no owner; a defective part may still sit in its server
    /// until it is pulled; every other status carries neither link.
    pub const fn links_consistent(&self) -> bool {
        let server = self.current_server_id.is_some();
        let owner = self.reserved_for_defect_id.is_some();
        match self.status {
            InventoryStatus::Reserved => owner && !server,
            InventoryStatus::InUse => server && !owner,
            InventoryStatus::Defective => !owner,
            InventoryStatus::Available | InventoryStatus::InRepair | InventoryStatus::Scrapped => {
                !owner && !server
            }
        }
    }

    pub(crate) fn set_status(&mut self, status: InventoryStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }
}

/// A part installed in a server, created when a replacement goes in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerComponent {
    /// Record identifier.
    pub id: ServerComponentId,
    /// Host server.
    pub server_id: ServerId,
    /// Part category.
    pub category: PartCategory,
    /// Installed part serials.
    pub serials: PartSerials,
    /// Manufacturer name.
    pub manufacturer: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Ledger entry for the installed part.
    pub inventory_id: Option<ComponentId>,
    /// Defect being repaired when the part went in.
    pub installed_during_defect: Option<DefectId>,
    /// Technician who installed it.
    pub installed_by: UserId,
    /// Installation time.
    pub installed_at: DateTime<Utc>,
}
