//! The defect record entity and its grouped sub-structures.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::classification::{DefectPriority, PartCategory};
use super::status::DefectStatus;
use crate::domain::{ComponentId, DefectId, ServerComponentId, ServerId, SubstituteId, UserId};

/// Vendor-assigned and manufacturer serials of one physical part.
///
/// Blank strings are normalised to `None` so "either or both present" is
/// represented one way only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartSerials {
    /// Serial printed by the integrating vendor.
    pub vendor: Option<String>,
    /// Serial printed by the part manufacturer.
    pub manufacturer: Option<String>,
}

impl PartSerials {
    /// Build serials, dropping blank values.
    pub fn new(vendor: Option<String>, manufacturer: Option<String>) -> Self {
        Self {
            vendor: non_blank(vendor),
            manufacturer: non_blank(manufacturer),
        }
    }

    /// True when neither serial is known.
    pub const fn is_empty(&self) -> bool {
        self.vendor.is_none() && self.manufacturer.is_none()
    }

    /// Iterate over the serials that are present.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.vendor
            .as_deref()
            .into_iter()
            .chain(self.manufacturer.as_deref())
    }

    /// Case-insensitive match against either serial.
    pub fn matches(&self, serial: &str) -> bool {
        self.iter().any(|known| known.eq_ignore_ascii_case(serial.trim()))
    }

    /// Keep existing values where `other` has none.
    #[must_use]
    pub fn merged_with(&self, other: &Self) -> Self {
        Self {
            vendor: other.vendor.clone().or_else(|| self.vendor.clone()),
            manufacturer: other
                .manufacturer
                .clone()
                .or_else(|| self.manufacturer.clone()),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|trimmed| !trimmed.is_empty())
}

/// Identity of the defective part and what it resolved to at intake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectivePart {
    /// Serials stated by the detector or revised by diagnosis.
    pub serials: PartSerials,
    /// Installed-component record the serials resolved to.
    pub server_component_id: Option<ServerComponentId>,
    /// Inventory entry the serials resolved to.
    pub inventory_id: Option<ComponentId>,
}

/// Diagnosis bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisDetails {
    /// Technician running the diagnosis.
    pub diagnostician: Option<UserId>,
    /// When diagnosis began.
    pub started_at: Option<DateTime<Utc>>,
    /// When diagnosis finished.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Repair bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairDetails {
    /// When hands-on repair began.
    pub started_at: Option<DateTime<Utc>>,
    /// When the repair was completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-text account of the work done.
    pub details: Option<String>,
}

/// Outcome recorded when the defect is resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionDetails {
    /// Resolution summary.
    pub resolution: Option<String>,
    /// Who resolved the defect.
    pub resolved_by: Option<UserId>,
    /// When the defect was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Minutes between detection and resolution.
    pub total_downtime_minutes: Option<i64>,
}

/// Replacement part tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacementDetails {
    /// Serials of the part that went in.
    pub serials: PartSerials,
    /// Inventory entry reserved for, or installed as, the replacement.
    pub inventory_id: Option<ComponentId>,
    /// Component record created in the server by the replacement.
    pub server_component_id: Option<ServerComponentId>,
    /// Who swapped the part.
    pub replaced_by: Option<UserId>,
    /// When the part was swapped.
    pub replaced_at: Option<DateTime<Utc>>,
}

/// Vendor round-trip tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorTracking {
    /// Ticket number shared with the vendor.
    pub ticket_number: Option<String>,
    /// When the unit or part was shipped.
    pub sent_at: Option<DateTime<Utc>>,
    /// When it came back.
    pub returned_at: Option<DateTime<Utc>>,
}

impl VendorTracking {
    /// Whether the defect has been sent to the vendor.
    pub const fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }

    /// Whether the latest send cycle has come back.
    pub const fn is_returned(&self) -> bool {
        self.returned_at.is_some()
    }
}

/// Substitute server currently on loan for this defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstituteAssignment {
    /// Pool entry that was issued.
    pub entry_id: SubstituteId,
    /// The loaned server.
    pub server_id: ServerId,
    /// Serial of the loaned server.
    pub serial: String,
    /// When it was issued.
    pub issued_at: DateTime<Utc>,
}

/// Back-reference to the earlier defect this one repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatDefectLink {
    /// The resolved or closed defect on the same server and part category.
    pub previous_defect_id: DefectId,
    /// Operator-facing explanation.
    pub reason: String,
    /// When the repeat was detected.
    pub flagged_at: DateTime<Utc>,
}

/// Named workflow annotations plus an open map for unstructured extras.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectMetadata {
    /// Comment attached to the most recent generic status change.
    pub last_status_comment: Option<String>,
    /// Reason given when the defect was scrapped.
    pub scrap_reason: Option<String>,
    /// Reason given when the defect was cancelled.
    pub cancel_reason: Option<String>,
    /// Anything that does not fit the named fields.
    #[serde(default)]
    pub extras: BTreeMap<String, Value>,
}

/// Values fixed at intake, used to build a [`DefectRecord`].
#[derive(Debug, Clone)]
pub struct DefectRecordDraft {
    /// Identifier of the new record.
    pub id: DefectId,
    /// Affected server.
    pub server_id: ServerId,
    /// Reporting user.
    pub detected_by: UserId,
    /// Detection time.
    pub detected_at: DateTime<Utc>,
    /// Suspected part category.
    pub category: PartCategory,
    /// Urgency.
    pub priority: DefectPriority,
    /// Problem description.
    pub description: String,
    /// Optional cluster tag.
    pub cluster_code: Option<String>,
    /// Optional intake notes.
    pub notes: Option<String>,
    /// Vendor ticket already known at intake.
    pub vendor_ticket_number: Option<String>,
    /// Defective part identity and resolved links.
    pub defective_part: DefectivePart,
    /// Repeat-defect linkage, when detected.
    pub repeat_of: Option<RepeatDefectLink>,
    /// SLA deadline, when it could be computed.
    pub sla_deadline: Option<DateTime<Utc>>,
    /// Extra metadata supplied at intake.
    pub extras: BTreeMap<String, Value>,
}

/// One detected hardware fault on one server unit.
///
/// The status is readable by anyone but only changed by the lifecycle
/// service; every other field is plain data grouped by workflow stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectRecord {
    /// Record identifier.
    pub id: DefectId,
    /// Affected server.
    pub server_id: ServerId,
    /// Suspected or confirmed part category.
    pub category: PartCategory,
    /// Urgency.
    pub priority: DefectPriority,
    /// Problem description.
    pub description: String,
    /// Reporting user.
    pub detected_by: UserId,
    /// Detection time.
    pub detected_at: DateTime<Utc>,
    /// Optional cluster tag.
    pub cluster_code: Option<String>,
    /// Accumulated operator notes.
    pub notes: Option<String>,
    /// The part believed to have failed.
    pub defective_part: DefectivePart,
    pub(crate) status: DefectStatus,
    pub(crate) revision: i64,
    /// Diagnosis bookkeeping.
    pub diagnosis: DiagnosisDetails,
    /// Repair bookkeeping.
    pub repair: RepairDetails,
    /// Resolution outcome.
    pub resolution: ResolutionDetails,
    /// Replacement tracking.
    pub replacement: ReplacementDetails,
    /// Vendor round-trip tracking.
    pub vendor: VendorTracking,
    /// Substitute currently on loan.
    pub substitute: Option<SubstituteAssignment>,
    /// Repeat-defect linkage.
    pub repeat_of: Option<RepeatDefectLink>,
    /// SLA deadline.
    pub sla_deadline: Option<DateTime<Utc>>,
    /// Named annotations and extras.
    pub metadata: DefectMetadata,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl DefectRecord {
    /// Build a record in [`DefectStatus::New`] from intake values.
    pub fn new(draft: DefectRecordDraft) -> Self {
        let DefectRecordDraft {
            id,
            server_id,
            detected_by,
            detected_at,
            category,
            priority,
            description,
            cluster_code,
            notes,
            vendor_ticket_number,
            defective_part,
            repeat_of,
            sla_deadline,
            extras,
        } = draft;
        Self {
            id,
            server_id,
            category,
            priority,
            description,
            detected_by,
            detected_at,
            cluster_code: non_blank(cluster_code),
            notes: non_blank(notes),
            defective_part,
            status: DefectStatus::New,
            revision: 1,
            diagnosis: DiagnosisDetails::default(),
            repair: RepairDetails::default(),
            resolution: ResolutionDetails::default(),
            replacement: ReplacementDetails::default(),
            vendor: VendorTracking {
                ticket_number: non_blank(vendor_ticket_number),
                sent_at: None,
                returned_at: None,
            },
            substitute: None,
            repeat_of,
            sla_deadline,
            metadata: DefectMetadata {
                extras,
                ..DefectMetadata::default()
            },
            created_at: detected_at,
            updated_at: detected_at,
        }
    }

    /// Rebuild a persisted record with its stored status and revision.
    ///
    /// Only storage adapters should call this.
    #[must_use]
    pub fn restored(mut self, status: DefectStatus, revision: i64) -> Self {
        self.status = status;
        self.revision = revision;
        self
    }

    /// Current workflow status.
    pub const fn status(&self) -> DefectStatus {
        self.status
    }

    /// Write counter, bumped on every change.
    pub const fn revision(&self) -> i64 {
        self.revision
    }

    /// Whether intake linked this record to an earlier resolved defect.
    pub const fn is_repeated_defect(&self) -> bool {
        self.repeat_of.is_some()
    }

    /// Whether the SLA deadline has passed without the defect being finished.
    pub fn is_sla_breached(&self, now: DateTime<Utc>) -> bool {
        self.sla_deadline
            .is_some_and(|deadline| deadline < now && !self.status.is_finished())
    }

    /// Whole minutes from detection to `until`, rounded to the nearest minute.
    pub fn downtime_minutes(&self, until: DateTime<Utc>) -> i64 {
        let seconds = until.signed_duration_since(self.detected_at).num_seconds().max(0);
        seconds.saturating_add(30).div_euclid(60)
    }

    /// Append a labelled paragraph to the notes.
    pub fn append_note(&mut self, label: &str, text: Option<&str>) {
        let Some(body) = text.map(str::trim).filter(|body| !body.is_empty()) else {
            return;
        };
        let entry = format!("[{label}]: {body}");
        self.notes = Some(match self.notes.take() {
            Some(existing) => format!("{existing}\n\n{entry}"),
            None => entry,
        });
    }

    pub(crate) fn move_to(&mut self, status: DefectStatus, at: DateTime<Utc>) {
        self.status = status;
        self.touch(at);
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.revision += 1;
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use chrono::{Duration, TimeZone};
    use rstest::{fixture, rstest};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[fixture]
    fn record() -> DefectRecord {
        DefectRecord::new(DefectRecordDraft {
            id: DefectId::random(),
            server_id: ServerId::random(),
            detected_by: UserId::random(),
            detected_at: t0(),
            category: PartCategory::Ram,
            priority: DefectPriority::High,
            description: "ECC errors on DIMM A1".to_owned(),
            cluster_code: Some("  ".to_owned()),
            notes: None,
            vendor_ticket_number: Some("V-1".to_owned()),
            defective_part: DefectivePart::default(),
            repeat_of: None,
            sla_deadline: Some(t0() + Duration::hours(24)),
            extras: BTreeMap::new(),
        })
    }

    #[rstest]
    fn new_records_start_in_new(record: DefectRecord) {
        assert_eq!(record.status(), DefectStatus::New);
        assert_eq!(record.revision(), 1);
        assert_eq!(record.vendor.ticket_number.as_deref(), Some("V-1"));
        assert!(record.cluster_code.is_none());
        assert!(!record.is_repeated_defect());
    }

    #[rstest]
    #[case(Duration::minutes(180), 180)]
    #[case(Duration::seconds(10_829), 180)]
    #[case(Duration::seconds(10_770), 180)]
    #[case(Duration::seconds(89), 1)]
    #[case(Duration::minutes(-5), 0)]
    fn downtime_rounds_to_nearest_minute(
        record: DefectRecord,
        #[case] elapsed: Duration,
        #[case] expected: i64,
    ) {
        assert_eq!(record.downtime_minutes(t0() + elapsed), expected);
    }

    #[rstest]
    fn sla_breach_requires_an_unfinished_record(mut record: DefectRecord) {
        let late = t0() + Duration::hours(25);
        assert!(record.is_sla_breached(late));
        assert!(!record.is_sla_breached(t0() + Duration::hours(1)));

        record.move_to(DefectStatus::Resolved, late);
        assert!(!record.is_sla_breached(late));
    }

    #[rstest]
    fn notes_are_appended_with_labels(mut record: DefectRecord) {
        record.append_note("Diagnosis", Some("DIMM reseated"));
        record.append_note("Diagnosis", Some("   "));
        record.append_note("Resolution", Some("replaced"));
        assert_eq!(
            record.notes.as_deref(),
            Some("[Diagnosis]: DIMM reseated\n\n[Resolution]: replaced")
        );
    }

    #[rstest]
    fn serials_normalise_and_match_case_insensitively() {
        let serials = PartSerials::new(Some(" ab-12 ".to_owned()), Some(String::new()));
        assert_eq!(serials.vendor.as_deref(), Some("ab-12"));
        assert!(serials.manufacturer.is_none());
        assert!(serials.matches("AB-12"));
        assert!(!serials.matches("AB-13"));
    }

    #[rstest]
    fn merged_serials_prefer_the_revision() {
        let original = PartSerials::new(Some("Y1".to_owned()), Some("M1".to_owned()));
        let revision = PartSerials::new(None, Some("M2".to_owned()));
        let merged = original.merged_with(&revision);
        assert_eq!(merged.vendor.as_deref(), Some("Y1"));
        assert_eq!(merged.manufacturer.as_deref(), Some("M2"));
    }
}
