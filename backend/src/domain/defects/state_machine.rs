//! Transition table for the defect workflow.
//!
//! The table is the single source of truth for which status changes are
//! legal. The orchestrator never decides legality itself: every mutating
//! call resolves its target status and then asks [`DefectStateMachine`] to
//! assert the move before planning any write.

use serde::Serialize;
use serde_json::json;

use super::status::{DefectAction, DefectStatus};
use crate::domain::Error;

/// One legal edge out of a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// Operator-facing action name.
    pub action: DefectAction,
    /// Status reached by performing the action.
    pub next: DefectStatus,
}

const fn edge(action: DefectAction, next: DefectStatus) -> Transition {
    Transition { action, next }
}

use DefectAction as A;
use DefectStatus as S;

const NEW: &[Transition] = &[
    edge(A::StartDiagnosis, S::Diagnosing),
    edge(A::Cancel, S::Cancelled),
];
const DIAGNOSING: &[Transition] = &[
    edge(A::CompleteDiagnosis, S::WaitingParts),
    edge(A::StartRepair, S::Repairing),
    edge(A::SendToVendor, S::SentToVendor),
    edge(A::Cancel, S::Cancelled),
];
const WAITING_PARTS: &[Transition] = &[
    edge(A::StartRepair, S::Repairing),
    edge(A::SendToVendor, S::SentToVendor),
    edge(A::Scrap, S::Scrapped),
    edge(A::Cancel, S::Cancelled),
];
const REPAIRING: &[Transition] = &[
    edge(A::SendToVendor, S::SentToVendor),
    edge(A::Resolve, S::Resolved),
    edge(A::Scrap, S::Scrapped),
];
const SENT_TO_VENDOR: &[Transition] = &[
    edge(A::ReturnFromVendor, S::Returned),
    edge(A::Cancel, S::Cancelled),
];
const RETURNED: &[Transition] = &[
    edge(A::StartRepair, S::Repairing),
    edge(A::Resolve, S::Resolved),
    edge(A::Scrap, S::Scrapped),
];
const RESOLVED: &[Transition] = &[edge(A::Close, S::Closed)];
const REPEATED: &[Transition] = &[
    edge(A::StartDiagnosis, S::Diagnosing),
    edge(A::Cancel, S::Cancelled),
];
const PENDING_DIAGNOSIS: &[Transition] = &[
    edge(A::StartDiagnosis, S::Diagnosing),
    edge(A::MarkDiagnosed, S::Diagnosed),
    edge(A::Cancel, S::Cancelled),
];
const DIAGNOSED: &[Transition] = &[
    edge(A::RequestApproval, S::WaitingApproval),
    edge(A::ReserveParts, S::PartsReserved),
    edge(A::StartRepair, S::Repairing),
    edge(A::SendToVendor, S::InVendorRepair),
    edge(A::Scrap, S::Scrapped),
    edge(A::Cancel, S::Cancelled),
];
const WAITING_APPROVAL: &[Transition] = &[
    edge(A::ReserveParts, S::PartsReserved),
    edge(A::Cancel, S::Cancelled),
];
const PARTS_RESERVED: &[Transition] = &[
    edge(A::StartRepair, S::Repairing),
    edge(A::SendToVendor, S::InVendorRepair),
    edge(A::IssueSubstitute, S::SubstituteIssued),
    edge(A::Scrap, S::Scrapped),
];
const REPAIRED_LOCALLY: &[Transition] = &[
    edge(A::Resolve, S::Resolved),
    edge(A::Close, S::Closed),
];
const IN_VENDOR_REPAIR: &[Transition] = &[
    edge(A::ReturnFromVendor, S::Returned),
    edge(A::IssueSubstitute, S::SubstituteIssued),
];
const SUBSTITUTE_ISSUED: &[Transition] = &[
    edge(A::ReturnSubstitute, S::Repairing),
    edge(A::Close, S::Closed),
];
const TERMINAL: &[Transition] = &[];

const fn table(status: DefectStatus) -> &'static [Transition] {
    match status {
        S::New => NEW,
        S::Diagnosing => DIAGNOSING,
        S::WaitingParts => WAITING_PARTS,
        S::Repairing => REPAIRING,
        S::SentToVendor => SENT_TO_VENDOR,
        S::Returned => RETURNED,
        S::Resolved => RESOLVED,
        S::Repeated => REPEATED,
        S::PendingDiagnosis => PENDING_DIAGNOSIS,
        S::Diagnosed => DIAGNOSED,
        S::WaitingApproval => WAITING_APPROVAL,
        S::PartsReserved => PARTS_RESERVED,
        S::RepairedLocally => REPAIRED_LOCALLY,
        S::InVendorRepair => IN_VENDOR_REPAIR,
        S::SubstituteIssued => SUBSTITUTE_ISSUED,
        S::Closed | S::Scrapped | S::Cancelled => TERMINAL,
    }
}

/// Pure lookup over the defect transition table.
///
/// Holds no state; it exists as a value so the orchestrator receives it as
/// an explicit collaborator.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefectStateMachine;

impl DefectStateMachine {
    /// Ordered legal actions out of `status`.
    pub const fn available_actions(&self, status: DefectStatus) -> &'static [Transition] {
        table(status)
    }

    /// True when `from == to` or `to` is reachable by one action.
    pub fn can_transition(&self, from: DefectStatus, to: DefectStatus) -> bool {
        from == to || table(from).iter().any(|transition| transition.next == to)
    }

    /// Reject a move that the table does not allow.
    pub fn assert_transition(&self, from: DefectStatus, to: DefectStatus) -> Result<(), Error> {
        if self.can_transition(from, to) {
            return Ok(());
        }
        Err(
            Error::illegal_transition(format!("cannot move a defect from {from} to {to}"))
                .with_details(json!({ "from": from, "to": to })),
        )
    }

    /// Status reached by `action` from `status`, when the action is offered.
    pub fn target_for(&self, status: DefectStatus, action: DefectAction) -> Option<DefectStatus> {
        table(status)
            .iter()
            .find(|transition| transition.action == action)
            .map(|transition| transition.next)
    }

    /// Reject any mutation of a terminal record.
    pub fn ensure_mutable(&self, status: DefectStatus) -> Result<(), Error> {
        if status.is_terminal() {
            return Err(
                Error::illegal_transition(format!("defect is {status} and can no longer change"))
                    .with_details(json!({ "from": status })),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_machine_tests.rs"]
mod tests;
