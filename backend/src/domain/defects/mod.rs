//! Defect records, their workflow statuses, and the transition table.

mod classification;
mod query;
mod record;
mod state_machine;
mod status;

pub use classification::{DefectPriority, PartCategory};
pub use query::{
    DEFAULT_PAGE_LIMIT, DefectFilter, DefectPage, DefectStats, DefectStatsFilter, MAX_PAGE_LIMIT,
};
pub use record::{
    DefectMetadata, DefectRecord, DefectRecordDraft, DefectivePart, DiagnosisDetails,
    PartSerials, RepairDetails, ReplacementDetails, RepeatDefectLink, ResolutionDetails,
    SubstituteAssignment, VendorTracking,
};
pub use state_machine::{DefectStateMachine, Transition};
pub use status::{DefectAction, DefectStatus};
