//! Workflow statuses and the named actions that move a defect between them.

use crate::domain::text_enum::text_enum;

text_enum! {
    /// Workflow status of a defect record.
    ///
    /// The first block is the current workflow. The second block holds the
    /// statuses of the earlier approval-based workflow; records created under
    /// it still move through their original edges.
    pub enum DefectStatus ("defect status") {
        /// Just detected.
        New => "NEW",
        /// A technician is diagnosing the fault.
        Diagnosing => "DIAGNOSING",
        /// Diagnosis done, waiting on a replacement part.
        WaitingParts => "WAITING_PARTS",
        /// Repair in progress on site.
        Repairing => "REPAIRING",
        /// Shipped to the vendor for repair.
        SentToVendor => "SENT_TO_YADRO",
        /// Back from the vendor.
        Returned => "RETURNED",
        /// Repaired and verified.
        Resolved => "RESOLVED",
        /// Re-opened as a repeat of an earlier defect.
        Repeated => "REPEATED",
        /// Closed out. Terminal.
        Closed => "CLOSED",
        /// Legacy: queued for diagnosis.
        PendingDiagnosis => "PENDING_DIAGNOSIS",
        /// Legacy: diagnosis recorded.
        Diagnosed => "DIAGNOSED",
        /// Legacy: waiting for an approval gate.
        WaitingApproval => "WAITING_APPROVAL",
        /// Legacy: parts reserved.
        PartsReserved => "PARTS_RESERVED",
        /// Legacy: repaired without vendor involvement.
        RepairedLocally => "REPAIRED_LOCALLY",
        /// Legacy: at the vendor.
        InVendorRepair => "IN_YADRO_REPAIR",
        /// Legacy: a substitute server was issued.
        SubstituteIssued => "SUBSTITUTE_ISSUED",
        /// Written off. Terminal.
        Scrapped => "SCRAPPED",
        /// Withdrawn. Terminal.
        Cancelled => "CANCELLED",
    }
}

impl DefectStatus {
    /// Terminal statuses accept no further mutation.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Scrapped | Self::Cancelled)
    }

    /// Statuses that count as finished for SLA and repeat-defect purposes.
    pub const fn is_finished(&self) -> bool {
        matches!(
            self,
            Self::Resolved | Self::Closed | Self::Scrapped | Self::Cancelled
        )
    }

    /// Whether the record belongs to the earlier approval-based workflow.
    pub const fn is_legacy(&self) -> bool {
        matches!(
            self,
            Self::PendingDiagnosis
                | Self::Diagnosed
                | Self::WaitingApproval
                | Self::PartsReserved
                | Self::RepairedLocally
                | Self::InVendorRepair
                | Self::SubstituteIssued
        )
    }

    /// Display label for operator-facing lists.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Diagnosing => "Diagnosing",
            Self::WaitingParts => "Waiting for parts",
            Self::Repairing => "Repairing",
            Self::SentToVendor => "Sent to vendor",
            Self::Returned => "Returned from vendor",
            Self::Resolved => "Resolved",
            Self::Repeated => "Repeated defect",
            Self::Closed => "Closed",
            Self::PendingDiagnosis => "Pending diagnosis",
            Self::Diagnosed => "Diagnosed",
            Self::WaitingApproval => "Waiting for approval",
            Self::PartsReserved => "Parts reserved",
            Self::RepairedLocally => "Repaired locally",
            Self::InVendorRepair => "In vendor repair",
            Self::SubstituteIssued => "Substitute issued",
            Self::Scrapped => "Scrapped",
            Self::Cancelled => "Cancelled",
        }
    }
}

text_enum! {
    /// Named workflow action offered to operators.
    pub enum DefectAction ("defect action") {
        /// Begin diagnosis.
        StartDiagnosis => "START_DIAGNOSIS",
        /// Finish diagnosis.
        CompleteDiagnosis => "COMPLETE_DIAGNOSIS",
        /// Legacy: record the diagnosis.
        MarkDiagnosed => "MARK_DIAGNOSED",
        /// Legacy: request approval.
        RequestApproval => "REQUEST_APPROVAL",
        /// Legacy: reserve parts.
        ReserveParts => "RESERVE_PARTS",
        /// Begin repair.
        StartRepair => "START_REPAIR",
        /// Ship to the vendor.
        SendToVendor => "SEND_TO_VENDOR" | "SEND_TO_YADRO",
        /// Receive from the vendor.
        ReturnFromVendor => "RETURN_FROM_VENDOR" | "RETURN_FROM_YADRO",
        /// Legacy: issue a substitute.
        IssueSubstitute => "ISSUE_SUBSTITUTE",
        /// Legacy: take the substitute back.
        ReturnSubstitute => "RETURN_SUBSTITUTE",
        /// Mark repaired.
        Resolve => "RESOLVE",
        /// Close out.
        Close => "CLOSE",
        /// Write off.
        Scrap => "SCRAP",
        /// Withdraw.
        Cancel => "CANCEL",
    }
}

impl DefectAction {
    /// Display label for operator-facing lists.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::StartDiagnosis => "Start diagnosis",
            Self::CompleteDiagnosis => "Complete diagnosis",
            Self::MarkDiagnosed => "Mark diagnosed",
            Self::RequestApproval => "Request approval",
            Self::ReserveParts => "Reserve parts",
            Self::StartRepair => "Start repair",
            Self::SendToVendor => "Send to vendor",
            Self::ReturnFromVendor => "Return from vendor",
            Self::IssueSubstitute => "Issue substitute",
            Self::ReturnSubstitute => "Return substitute",
            Self::Resolve => "Resolve",
            Self::Close => "Close",
            Self::Scrap => "Scrap",
            Self::Cancel => "Cancel",
        }
    }
}
