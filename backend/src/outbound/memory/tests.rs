//! Regression coverage for the in-memory store.

use rstest::{fixture, rstest};

use super::*;
use crate::domain::defects::{DefectStatus, PartCategory, PartSerials};
use crate::domain::inventory::{ComponentCondition, InventoryStatus};
use crate::domain::ports::{
    DefectRepository, InventoryRepository, StoreError, SubstitutePoolRepository, entity,
};
use crate::domain::servers::ServerStatus;
use crate::domain::{DefectVersion, EntityWrite};
use crate::test_support::fixtures::{installed, past_defect, server, spare, utc};

#[fixture]
fn store() -> InMemoryStore {
    InMemoryStore::new()
}

#[rstest]
#[tokio::test]
async fn stale_defect_write_discards_the_whole_unit(store: InMemoryStore) {
    let host = server("SRV-1");
    store.insert_server(host.clone());
    let at = utc(2026, 3, 2, 9, 0);
    let record = past_defect(host.id, PartCategory::Ram, at, DefectStatus::Diagnosing);
    store.insert_defect(record.clone());

    let mut changed = record.clone();
    changed.move_to(DefectStatus::WaitingParts, at);
    let mut unit = UnitOfWork::new();
    unit.push(EntityWrite::SetServerStatus {
        server_id: host.id,
        status: ServerStatus::Defect,
    });
    unit.update_defect(
        DefectVersion {
            status: DefectStatus::New,
            revision: record.revision(),
        },
        changed,
    );

    let error = store.commit(&unit).await.expect_err("stale write");

    assert_eq!(
        error,
        StoreError::stale_write(entity::DEFECT, record.id.to_string())
    );
    assert_eq!(
        store.server(host.id).map(|s| s.status),
        Some(ServerStatus::InProgress)
    );
    assert_eq!(store.defect(record.id), Some(record));
    assert_eq!(store.commit_count(), 0);
}

#[rstest]
#[tokio::test]
async fn duplicate_serial_is_rejected_ignoring_case(store: InMemoryStore) {
    let at = utc(2026, 3, 2, 9, 0);
    store.insert_component(spare(
        "sn-77",
        PartCategory::Disk,
        ComponentCondition::New,
        at,
    ));

    let mut unit = UnitOfWork::new();
    unit.push(EntityWrite::InsertComponent(spare(
        "SN-77",
        PartCategory::Disk,
        ComponentCondition::New,
        at,
    )));

    let error = store.commit(&unit).await.expect_err("duplicate");
    assert!(matches!(error, StoreError::Duplicate { .. }));
}

#[rstest]
#[tokio::test]
async fn injected_failure_fires_once(store: InMemoryStore) {
    store.fail_next_commit(StoreError::connection("socket closed"));
    let unit = UnitOfWork::new();

    let first = store.commit(&unit).await;
    let second = store.commit(&unit).await;

    assert!(first.is_err_and(|error| error.is_transient()));
    assert!(second.is_ok());
    assert_eq!(store.commit_count(), 1);
}

#[rstest]
#[tokio::test]
async fn delayed_failure_lets_earlier_commits_through(store: InMemoryStore) {
    store.fail_commit_after(1, StoreError::stale_write(entity::SUBSTITUTE, "loaner"));
    let unit = UnitOfWork::new();

    let first = store.commit(&unit).await;
    let second = store.commit(&unit).await;
    let third = store.commit(&unit).await;

    assert!(first.is_ok());
    assert!(matches!(second, Err(StoreError::StaleWrite { .. })));
    assert!(third.is_ok());
    assert_eq!(store.commit_count(), 2);
}

#[rstest]
#[tokio::test]
async fn latest_finished_ignores_scrapped_and_old_records(store: InMemoryStore) {
    let host = server("SRV-2");
    let since = utc(2026, 3, 1, 0, 0);
    let finished = |at, status| past_defect(host.id, PartCategory::Cpu, at, status);
    let old = finished(utc(2026, 2, 1, 0, 0), DefectStatus::Closed);
    let scrapped = finished(utc(2026, 3, 10, 0, 0), DefectStatus::Scrapped);
    let resolved = finished(utc(2026, 3, 5, 0, 0), DefectStatus::Resolved);
    let other_part = past_defect(
        host.id,
        PartCategory::Ram,
        utc(2026, 3, 12, 0, 0),
        DefectStatus::Closed,
    );
    for record in [&old, &scrapped, &resolved, &other_part] {
        store.insert_defect(record.clone());
    }

    let found =
        DefectRepository::find_latest_finished(&store, host.id, PartCategory::Cpu, since)
            .await
            .expect("lookup");

    assert_eq!(found.map(|record| record.id), Some(resolved.id));
}

#[rstest]
#[tokio::test]
async fn available_parts_prefer_condition_then_age(store: InMemoryStore) {
    let psu = |serial, condition, at| spare(serial, PartCategory::Psu, condition, at);
    let used = psu("U-1", ComponentCondition::Used, utc(2026, 1, 1, 0, 0));
    let newer = psu("N-2", ComponentCondition::New, utc(2026, 2, 1, 0, 0));
    let older = psu("N-1", ComponentCondition::New, utc(2026, 1, 5, 0, 0));
    let other = spare("R-1", PartCategory::Ram, ComponentCondition::New, utc(2026, 1, 1, 0, 0));
    for component in [&used, &newer, &older, &other] {
        store.insert_component(component.clone());
    }

    let rows = store
        .available_by_category(PartCategory::Psu)
        .await
        .expect("query");

    let serials: Vec<_> = rows.iter().map(|row| row.serial_number.as_str()).collect();
    assert_eq!(serials, ["N-1", "N-2", "U-1"]);
}

#[rstest]
#[tokio::test]
async fn server_component_match_prefers_category(store: InMemoryStore) {
    let host = server("SRV-3");
    let at = utc(2026, 3, 2, 9, 0);
    let (component, part) = installed("DIMM-9", PartCategory::Ram, host.id, at);
    store.insert_component(component.clone());
    store.insert_server_component(part.clone());

    let found = store
        .find_server_component(
            host.id,
            PartCategory::Ram,
            &PartSerials::new(None, Some("dimm-9".to_owned())),
        )
        .await
        .expect("lookup");

    assert_eq!(found.map(|row| row.id), Some(part.id));
    assert_eq!(component.status(), InventoryStatus::InUse);
}

#[rstest]
#[tokio::test]
async fn first_available_substitute_has_fewest_loans(store: InMemoryStore) {
    let mut busy = SubstitutePoolEntry::available(
        SubstituteId::random(),
        ServerId::random(),
        "SPARE-A".to_owned(),
    );
    busy.usage_count = 4;
    let fresh = SubstitutePoolEntry::available(
        SubstituteId::random(),
        ServerId::random(),
        "SPARE-B".to_owned(),
    );
    store.insert_substitute(busy);
    store.insert_substitute(fresh.clone());

    let picked = store.find_first_available().await.expect("lookup");

    assert_eq!(picked.map(|entry| entry.id), Some(fresh.id));
}
