//! Driving port for defect workflow mutations.
//!
//! Every operation takes the acting user, runs as one unit of work, and
//! returns the refreshed record.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::defects::{DefectPriority, DefectRecord, DefectStatus, PartCategory, PartSerials};
use crate::domain::inventory::ComponentCondition;
use crate::domain::vendor_ticket::VendorTicketRequest;
use crate::domain::{ComponentId, DefectId, Error, ServerId, SubstituteId, UserId};

/// Intake of a new defect.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDefectRequest {
    /// Affected server.
    pub server_id: ServerId,
    /// Reporting user.
    pub detected_by: UserId,
    /// Suspected part category.
    pub category: PartCategory,
    /// Problem description; must not be blank.
    pub description: String,
    /// Urgency; defaults to medium.
    #[serde(default)]
    pub priority: Option<DefectPriority>,
    /// Serials of the suspected part.
    #[serde(default)]
    pub serials: PartSerials,
    /// Vendor ticket already known at intake.
    #[serde(default)]
    pub vendor_ticket_number: Option<String>,
    /// Cluster tag.
    #[serde(default)]
    pub cluster_code: Option<String>,
    /// Intake notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Unstructured extras.
    #[serde(default)]
    pub extras: BTreeMap<String, Value>,
}

/// Findings recorded when diagnosis completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisRevision {
    /// Confirmed part category, when it differs from intake.
    #[serde(default)]
    pub category: Option<PartCategory>,
    /// Confirmed serials; present values replace the intake values.
    #[serde(default)]
    pub serials: Option<PartSerials>,
    /// Revised description.
    #[serde(default)]
    pub description: Option<String>,
    /// Notes appended to the record.
    #[serde(default)]
    pub notes: Option<String>,
    /// Status to move to; `None` keeps the current status.
    #[serde(default)]
    pub next_status: Option<DefectStatus>,
}

/// Where the replacement part comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ReplacementSource {
    /// A ledger component, installed through the inventory ledger.
    Inventory {
        /// The component to install.
        component_id: ComponentId,
    },
    /// Off-ledger stock; only the serials are recorded.
    RawSerials {
        /// Serials of the part that went in.
        serials: PartSerials,
    },
}

/// Replacement of the defective part.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacementRequest {
    /// Source of the new part.
    pub source: ReplacementSource,
    /// Notes appended to the record.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Return of a part or unit from the vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorReturn {
    /// Vendor's resolution text.
    #[serde(default)]
    pub resolution: Option<String>,
    /// Serials of a replacement the vendor sent instead.
    #[serde(default)]
    pub replacement_serials: Option<PartSerials>,
    /// Condition of the returned component; defaults to refurbished.
    #[serde(default)]
    pub condition: Option<ComponentCondition>,
}

/// Resolution of a defect.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    /// Resolution summary; must not be blank.
    pub resolution: String,
    /// Account of the repair work.
    #[serde(default)]
    pub repair_details: Option<String>,
    /// Notes appended to the record.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Driving port for defect workflow mutations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DefectLifecycleCommand: Send + Sync {
    /// Record a newly detected defect.
    async fn create(&self, request: CreateDefectRequest) -> Result<DefectRecord, Error>;

    /// Begin diagnosis.
    async fn start_diagnosis(&self, defect_id: DefectId, actor: UserId)
    -> Result<DefectRecord, Error>;

    /// Record diagnosis findings.
    async fn complete_diagnosis(
        &self,
        defect_id: DefectId,
        actor: UserId,
        revision: DiagnosisRevision,
    ) -> Result<DefectRecord, Error>;

    /// Park the defect until parts arrive.
    async fn set_waiting_parts(
        &self,
        defect_id: DefectId,
        actor: UserId,
        notes: Option<String>,
    ) -> Result<DefectRecord, Error>;

    /// Begin hands-on repair.
    async fn start_repair(&self, defect_id: DefectId, actor: UserId) -> Result<DefectRecord, Error>;

    /// Generic guarded status change.
    async fn update_status(
        &self,
        defect_id: DefectId,
        actor: UserId,
        status: DefectStatus,
        comment: Option<String>,
    ) -> Result<DefectRecord, Error>;

    /// Reserve a ledger component as the replacement part.
    async fn reserve_replacement_part(
        &self,
        defect_id: DefectId,
        component_id: ComponentId,
        actor: UserId,
    ) -> Result<DefectRecord, Error>;

    /// Swap the defective part for a replacement.
    async fn perform_replacement(
        &self,
        defect_id: DefectId,
        actor: UserId,
        request: ReplacementRequest,
    ) -> Result<DefectRecord, Error>;

    /// Ship the part or unit to the vendor.
    async fn send_to_vendor(
        &self,
        defect_id: DefectId,
        actor: UserId,
        ticket: VendorTicketRequest,
    ) -> Result<DefectRecord, Error>;

    /// Receive the part or unit back from the vendor.
    async fn return_from_vendor(
        &self,
        defect_id: DefectId,
        actor: UserId,
        details: VendorReturn,
    ) -> Result<DefectRecord, Error>;

    /// Lend a substitute server; any available one when `entry` is `None`.
    async fn issue_substitute(
        &self,
        defect_id: DefectId,
        actor: UserId,
        entry: Option<SubstituteId>,
    ) -> Result<DefectRecord, Error>;

    /// Take the substitute server back.
    async fn return_substitute(
        &self,
        defect_id: DefectId,
        actor: UserId,
    ) -> Result<DefectRecord, Error>;

    /// Mark the defect repaired.
    async fn resolve(
        &self,
        defect_id: DefectId,
        actor: UserId,
        request: ResolveRequest,
    ) -> Result<DefectRecord, Error>;

    /// Close a resolved defect.
    async fn close(&self, defect_id: DefectId, actor: UserId) -> Result<DefectRecord, Error>;

    /// Write the defect off; `reason` must not be blank.
    async fn scrap(
        &self,
        defect_id: DefectId,
        actor: UserId,
        reason: String,
    ) -> Result<DefectRecord, Error>;

    /// Withdraw the defect; `reason` must not be blank.
    async fn cancel(
        &self,
        defect_id: DefectId,
        actor: UserId,
        reason: String,
    ) -> Result<DefectRecord, Error>;
}
