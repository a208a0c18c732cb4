//! Loans of spare servers against defects.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::domain::history::{HistoryAction, HistoryEntityType, HistoryEntry};
use crate::domain::ports::SubstitutePoolRepository;
use crate::domain::store_errors::map_store_error;
use crate::domain::substitute::{SubstitutePoolEntry, SubstituteStatus};
use crate::domain::unit_of_work::EntityWrite;
use crate::domain::{DefectId, Error, SubstituteId, UnitOfWork, UserId};

/// A pool entry change and the unit of work that commits it.
#[derive(Debug, Clone)]
pub(crate) struct SubstitutePlan {
    pub(crate) entry: SubstitutePoolEntry,
    pub(crate) unit: UnitOfWork,
}

/// Issues and takes back substitute servers.
#[derive(Clone)]
pub struct SubstitutePoolCoordinator {
    pool: Arc<dyn SubstitutePoolRepository>,
}

impl SubstitutePoolCoordinator {
    /// Build a coordinator over the pool store.
    pub fn new(pool: Arc<dyn SubstitutePoolRepository>) -> Self {
        Self { pool }
    }

    /// Plan issuing `requested`, or the least-used available spare.
    pub(crate) async fn plan_issue(
        &self,
        defect_id: DefectId,
        requested: Option<SubstituteId>,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<SubstitutePlan, Error> {
        let mut entry = match requested {
            Some(id) => {
                let entry = self.load(id).await?;
                if entry.status != SubstituteStatus::Available {
                    return Err(Error::invalid_state(format!(
                        "substitute {id} is {}, expected AVAILABLE",
                        entry.status
                    ))
                    .with_details(json!({
                        "substituteId": id.to_string(),
                        "status": entry.status.as_str(),
                    })));
                }
                entry
            }
            None => self
                .pool
                .find_first_available()
                .await
                .map_err(map_store_error)?
                .ok_or_else(|| Error::no_substitute_available("no substitute server is available"))?,
        };
        entry.status = SubstituteStatus::Issued;
        entry.current_defect_id = Some(defect_id);
        entry.issued_to = Some(actor);
        entry.issued_at = Some(at);
        let history = pool_entry(&entry, HistoryAction::SubstituteIssued, defect_id, actor, at);
        Ok(planned(SubstituteStatus::Available, entry, history))
    }

    /// Plan returning `entry_id` from `defect_id` to the pool.
    pub(crate) async fn plan_return(
        &self,
        entry_id: SubstituteId,
        defect_id: DefectId,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<SubstitutePlan, Error> {
        let mut entry = self.load(entry_id).await?;
        if entry.status != SubstituteStatus::Issued || entry.current_defect_id != Some(defect_id) {
            return Err(Error::invalid_state(format!(
                "substitute {entry_id} is not on loan to defect {defect_id}"
            ))
            .with_details(json!({
                "substituteId": entry_id.to_string(),
                "status": entry.status.as_str(),
            })));
        }
        entry.status = SubstituteStatus::Available;
        entry.current_defect_id = None;
        entry.issued_to = None;
        entry.returned_at = Some(at);
        entry.usage_count = entry.usage_count.saturating_add(1);
        let history = pool_entry(&entry, HistoryAction::SubstituteReturned, defect_id, actor, at)
            .with_meta("usageCount", entry.usage_count);
        Ok(planned(SubstituteStatus::Issued, entry, history))
    }

    async fn load(&self, id: SubstituteId) -> Result<SubstitutePoolEntry, Error> {
        self.pool
            .find_by_id(id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("substitute {id} not found")))
    }
}

fn pool_entry(
    entry: &SubstitutePoolEntry,
    action: HistoryAction,
    defect_id: DefectId,
    actor: UserId,
    at: DateTime<Utc>,
) -> HistoryEntry {
    HistoryEntry::new(HistoryEntityType::Substitute, entry.id, action, actor, at)
        .with_meta("serialNumber", entry.serial_number.clone())
        .with_meta("defectId", defect_id.to_string())
}

fn planned(
    expected: SubstituteStatus,
    entry: SubstitutePoolEntry,
    history: HistoryEntry,
) -> SubstitutePlan {
    let mut unit = UnitOfWork::new();
    unit.push(EntityWrite::UpdateSubstitute {
        entry: entry.clone(),
        expected,
    });
    unit.record(history);
    SubstitutePlan { entry, unit }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ServerId;
    use crate::domain::ports::MockSubstitutePoolRepository;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 3, 16, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[fixture]
    fn spare() -> SubstitutePoolEntry {
        SubstitutePoolEntry::available(SubstituteId::random(), ServerId::random(), "SPARE-01".to_owned())
    }

    fn coordinator(pool: MockSubstitutePoolRepository) -> SubstitutePoolCoordinator {
        SubstitutePoolCoordinator::new(Arc::new(pool))
    }

    #[rstest]
    #[tokio::test]
    async fn issue_takes_first_available(spare: SubstitutePoolEntry) {
        let mut pool = MockSubstitutePoolRepository::new();
        let expected_id = spare.id;
        pool.expect_find_first_available()
            .times(1)
            .return_once(move || Ok(Some(spare)));
        let defect = DefectId::random();
        let actor = UserId::random();

        let plan = coordinator(pool)
            .plan_issue(defect, None, actor, now())
            .await
            .expect("issue planned");

        assert_eq!(plan.entry.id, expected_id);
        assert_eq!(plan.entry.status, SubstituteStatus::Issued);
        assert_eq!(plan.entry.current_defect_id, Some(defect));
        assert_eq!(plan.entry.issued_to, Some(actor));
        assert!(matches!(
            plan.unit.writes(),
            [EntityWrite::UpdateSubstitute {
                expected: SubstituteStatus::Available,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn empty_pool_reports_no_substitute_available() {
        let mut pool = MockSubstitutePoolRepository::new();
        pool.expect_find_first_available().return_once(|| Ok(None));

        let error = coordinator(pool)
            .plan_issue(DefectId::random(), None, UserId::random(), now())
            .await
            .expect_err("pool is empty");

        assert_eq!(error.code(), ErrorCode::NoSubstituteAvailable);
    }

    #[rstest]
    #[tokio::test]
    async fn requested_spare_must_be_available(mut spare: SubstitutePoolEntry) {
        spare.status = SubstituteStatus::Maintenance;
        let id = spare.id;
        let mut pool = MockSubstitutePoolRepository::new();
        pool.expect_find_by_id()
            .withf(move |requested| *requested == id)
            .return_once(move |_| Ok(Some(spare)));

        let error = coordinator(pool)
            .plan_issue(DefectId::random(), Some(id), UserId::random(), now())
            .await
            .expect_err("spare in maintenance");

        assert_eq!(error.code(), ErrorCode::InvalidState);
    }

    #[rstest]
    #[tokio::test]
    async fn return_bumps_usage_and_guards_on_issued(mut spare: SubstitutePoolEntry) {
        let defect = DefectId::random();
        spare.status = SubstituteStatus::Issued;
        spare.current_defect_id = Some(defect);
        spare.usage_count = 2;
        let id = spare.id;
        let mut pool = MockSubstitutePoolRepository::new();
        pool.expect_find_by_id().return_once(move |_| Ok(Some(spare)));

        let plan = coordinator(pool)
            .plan_return(id, defect, UserId::random(), now())
            .await
            .expect("return planned");

        assert_eq!(plan.entry.status, SubstituteStatus::Available);
        assert_eq!(plan.entry.usage_count, 3);
        assert_eq!(plan.entry.current_defect_id, None);
        assert_eq!(plan.entry.returned_at, Some(now()));
        assert_eq!(plan.unit.history()[0].action, HistoryAction::SubstituteReturned);
    }

    #[rstest]
    #[tokio::test]
    async fn return_from_another_defect_is_rejected(mut spare: SubstitutePoolEntry) {
        spare.status = SubstituteStatus::Issued;
        spare.current_defect_id = Some(DefectId::random());
        let id = spare.id;
        let mut pool = MockSubstitutePoolRepository::new();
        pool.expect_find_by_id().return_once(move |_| Ok(Some(spare)));

        let error = coordinator(pool)
            .plan_return(id, DefectId::random(), UserId::random(), now())
            .await
            .expect_err("loaned to someone else");

        assert_eq!(error.code(), ErrorCode::InvalidState);
    }
}
