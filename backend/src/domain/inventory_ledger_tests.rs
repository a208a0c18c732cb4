//! Tests for the inventory ledger service.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone};
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::ports::{
    FixtureHistorySink, MockInventoryRepository, MockWorkflowStore, StoreError, entity,
};
use crate::domain::unit_of_work::EntityWrite;
use crate::test_support::clock::MutableClock;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn intake(serial: &str) -> NewInventoryComponent {
    NewInventoryComponent {
        serial_number: serial.to_owned(),
        vendor_serial: Some(format!("Y-{serial}")),
        category: PartCategory::Ram,
        manufacturer: Some("Samsung".to_owned()),
        model: Some("M393A4K40DB3".to_owned()),
        condition: None,
        location: Some("Rack A / shelf 1".to_owned()),
        purchase_date: None,
        warranty_expires: NaiveDate::from_ymd_opt(2027, 1, 1),
        catalog_ref: None,
        notes: None,
    }
}

fn component_in(status: InventoryStatus) -> InventoryComponent {
    let mut component =
        InventoryComponent::receive(ComponentId::random(), intake("SN-42"), UserId::random(), now())
            .restored_with_status(status);
    match status {
        InventoryStatus::Reserved => component.reserved_for_defect_id = Some(DefectId::random()),
        InventoryStatus::InUse | InventoryStatus::Defective => {
            component.current_server_id = Some(ServerId::random());
        }
        _ => {}
    }
    component
}

fn expected_status(unit: &UnitOfWork) -> InventoryStatus {
    match unit.writes() {
        [EntityWrite::UpdateComponent { expected, .. }] => *expected,
        other => panic!("unexpected writes: {other:?}"),
    }
}

#[fixture]
fn actor() -> UserId {
    UserId::random()
}

#[rstest]
fn reserve_sets_owner_and_guards_on_available(actor: UserId) {
    let defect = DefectId::random();
    let change = reserve(component_in(InventoryStatus::Available), defect, actor, now())
        .expect("reserve planned");

    assert_eq!(change.component.status(), InventoryStatus::Reserved);
    assert_eq!(change.component.reserved_for_defect_id, Some(defect));
    assert!(change.component.links_consistent());
    assert_eq!(expected_status(&change.unit), InventoryStatus::Available);
    assert_eq!(change.unit.history().len(), 1);
    assert_eq!(change.unit.history()[0].action, HistoryAction::Reserved);
}

#[rstest]
#[case(InventoryStatus::Reserved)]
#[case(InventoryStatus::InUse)]
#[case(InventoryStatus::Defective)]
#[case(InventoryStatus::InRepair)]
#[case(InventoryStatus::Scrapped)]
fn reserve_rejects_every_other_status(#[case] status: InventoryStatus, actor: UserId) {
    let error = reserve(component_in(status), DefectId::random(), actor, now())
        .expect_err("reserve rejected");
    assert_eq!(error.code(), ErrorCode::InvalidState);
}

#[rstest]
fn reserve_then_release_leaves_no_owner(actor: UserId) {
    let reserved = reserve(
        component_in(InventoryStatus::Available),
        DefectId::random(),
        actor,
        now(),
    )
    .expect("reserve planned")
    .component;
    let released = release(reserved, actor, Some("wrong part"), now())
        .expect("release planned")
        .component;

    assert_eq!(released.status(), InventoryStatus::Available);
    assert_eq!(released.reserved_for_defect_id, None);
    assert!(released.links_consistent());
}

#[rstest]
fn reserve_then_install_clears_owner(actor: UserId) {
    let defect = DefectId::random();
    let server = ServerId::random();
    let reserved = reserve(component_in(InventoryStatus::Available), defect, actor, now())
        .expect("reserve planned")
        .component;
    let installed = install(reserved, server, actor, Some(defect), now())
        .expect("install planned")
        .component;

    assert_eq!(installed.status(), InventoryStatus::InUse);
    assert_eq!(installed.reserved_for_defect_id, None);
    assert_eq!(installed.current_server_id, Some(server));
    assert!(installed.links_consistent());
}

#[rstest]
fn install_rejects_part_reserved_for_another_defect(actor: UserId) {
    let component = component_in(InventoryStatus::Reserved);
    let error = install(
        component,
        ServerId::random(),
        actor,
        Some(DefectId::random()),
        now(),
    )
    .expect_err("install rejected");
    assert_eq!(error.code(), ErrorCode::InvalidState);
}

#[rstest]
fn install_rejects_part_linked_to_another_server(actor: UserId) {
    let mut component = component_in(InventoryStatus::Available);
    component.current_server_id = Some(ServerId::random());
    let error = install(component, ServerId::random(), actor, None, now())
        .expect_err("install rejected");
    assert_eq!(error.code(), ErrorCode::InvalidState);
}

#[rstest]
#[case(RemovalOutcome::ReturnToStock, InventoryStatus::Available)]
#[case(RemovalOutcome::Defective, InventoryStatus::Defective)]
fn remove_clears_server_link(
    #[case] outcome: RemovalOutcome,
    #[case] status: InventoryStatus,
    actor: UserId,
) {
    let request = RemovalRequest {
        reason: "upgrade".to_owned(),
        defect_id: None,
        outcome,
    };
    let change = remove(component_in(InventoryStatus::InUse), actor, &request, now())
        .expect("removal planned");

    assert_eq!(change.component.status(), status);
    assert_eq!(change.component.current_server_id, None);
    assert_eq!(expected_status(&change.unit), InventoryStatus::InUse);
}

#[rstest]
fn remove_requires_reason(actor: UserId) {
    let request = RemovalRequest {
        reason: "  ".to_owned(),
        defect_id: None,
        outcome: RemovalOutcome::ReturnToStock,
    };
    let error = remove(component_in(InventoryStatus::InUse), actor, &request, now())
        .expect_err("removal rejected");
    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[rstest]
fn vendor_round_trip_refurbishes_component(actor: UserId) {
    let sent = send_to_vendor(component_in(InventoryStatus::Defective), "V-100", actor, now())
        .expect("send planned")
        .component;
    assert_eq!(sent.status(), InventoryStatus::InRepair);
    assert_eq!(sent.vendor_ticket_number.as_deref(), Some("V-100"));
    assert_eq!(sent.current_server_id, None);

    let returned = return_from_vendor(sent, actor, None, now())
        .expect("return planned")
        .component;
    assert_eq!(returned.status(), InventoryStatus::Available);
    assert_eq!(returned.condition, ComponentCondition::Refurbished);
    assert!(returned.links_consistent());
}

#[rstest]
fn second_send_to_vendor_is_rejected(actor: UserId) {
    let sent = send_to_vendor(component_in(InventoryStatus::Defective), "V-1", actor, now())
        .expect("send planned")
        .component;
    let error = send_to_vendor(sent, "V-1", actor, now()).expect_err("repeat rejected");
    assert_eq!(error.code(), ErrorCode::InvalidState);
}

#[rstest]
#[case(InventoryStatus::Available)]
#[case(InventoryStatus::Reserved)]
#[case(InventoryStatus::InUse)]
#[case(InventoryStatus::Defective)]
#[case(InventoryStatus::InRepair)]
fn scrap_clears_links_from_any_live_status(#[case] status: InventoryStatus, actor: UserId) {
    let change =
        scrap(component_in(status), actor, "burnt", now()).expect("scrap planned");
    assert_eq!(change.component.status(), InventoryStatus::Scrapped);
    assert!(change.component.links_consistent());
    assert_eq!(expected_status(&change.unit), status);
}

#[rstest]
fn scrapped_component_cannot_be_scrapped_again(actor: UserId) {
    let error = scrap(component_in(InventoryStatus::Scrapped), actor, "again", now())
        .expect_err("scrap rejected");
    assert_eq!(error.code(), ErrorCode::InvalidState);
}

#[rstest]
fn mark_defective_keeps_server_link(actor: UserId) {
    let component = component_in(InventoryStatus::InUse);
    let server = component.current_server_id;
    let change = mark_defective(component, actor, DefectId::random(), "ECC errors", now())
        .expect("mark planned");
    assert_eq!(change.component.status(), InventoryStatus::Defective);
    assert_eq!(change.component.current_server_id, server);
    assert!(change.component.links_consistent());
}

#[rstest]
fn detach_defective_clears_server_link(actor: UserId) {
    let change = detach_defective(
        component_in(InventoryStatus::Defective),
        actor,
        DefectId::random(),
        now(),
    )
    .expect("detach planned");
    assert_eq!(change.component.status(), InventoryStatus::Defective);
    assert_eq!(change.component.current_server_id, None);
}

#[rstest]
#[case(true, InventoryStatus::Available)]
#[case(false, InventoryStatus::Defective)]
fn bench_test_sets_status_from_result(
    #[case] passed: bool,
    #[case] status: InventoryStatus,
    actor: UserId,
) {
    let change = mark_tested(
        component_in(InventoryStatus::Available),
        actor,
        passed,
        None,
        now(),
    )
    .expect("test planned");
    assert_eq!(change.component.status(), status);
    assert_eq!(change.component.last_tested_at, Some(now()));
}

#[rstest]
fn relocate_records_both_locations(actor: UserId) {
    let change = relocate(
        component_in(InventoryStatus::Available),
        "Rack C / shelf 4",
        actor,
        now(),
    )
    .expect("relocation planned");
    assert_eq!(change.component.location.as_deref(), Some("Rack C / shelf 4"));
    let history = &change.unit.history()[0];
    assert_eq!(history.action, HistoryAction::Transferred);
    assert_eq!(history.metadata["fromLocation"], "Rack A / shelf 1");
}

fn ledger(repo: MockInventoryRepository, store: MockWorkflowStore) -> InventoryLedger {
    let (history, _worker) = HistoryDispatcher::spawn(
        Arc::new(FixtureHistorySink),
        crate::domain::HistoryDispatcherConfig::default(),
    );
    InventoryLedger::new(
        Arc::new(repo),
        Arc::new(store),
        history,
        Arc::new(MutableClock::new(now())),
    )
}

#[tokio::test]
async fn reserve_reports_unknown_component() {
    let mut repo = MockInventoryRepository::new();
    repo.expect_find_by_id().times(1).return_once(|_| Ok(None));
    let mut store = MockWorkflowStore::new();
    store.expect_commit().never();

    let error = ledger(repo, store)
        .reserve(ComponentId::random(), DefectId::random(), UserId::random())
        .await
        .expect_err("unknown component");
    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn reserve_losing_the_race_reports_invalid_state() {
    let component = component_in(InventoryStatus::Available);
    let id = component.id;
    let mut repo = MockInventoryRepository::new();
    repo.expect_find_by_id()
        .times(1)
        .return_once(move |_| Ok(Some(component)));
    let mut store = MockWorkflowStore::new();
    store
        .expect_commit()
        .times(1)
        .return_once(move |_| Err(StoreError::stale_write(entity::COMPONENT, id.to_string())));

    let error = ledger(repo, store)
        .reserve(id, DefectId::random(), UserId::random())
        .await
        .expect_err("stale write");
    assert_eq!(error.code(), ErrorCode::InvalidState);
}

#[tokio::test]
async fn add_rejects_duplicate_serial_before_commit() {
    let existing = component_in(InventoryStatus::Available);
    let mut repo = MockInventoryRepository::new();
    repo.expect_find_by_serial()
        .times(1)
        .return_once(move |_| Ok(Some(existing)));
    let mut store = MockWorkflowStore::new();
    store.expect_commit().never();

    let error = ledger(repo, store)
        .add_to_inventory(intake("SN-42"), UserId::random())
        .await
        .expect_err("duplicate serial");
    assert_eq!(error.code(), ErrorCode::Conflict);
}

#[tokio::test]
async fn bulk_add_reports_each_item() {
    let mut repo = MockInventoryRepository::new();
    repo.expect_find_by_serial().returning(|_| Ok(None));
    let mut store = MockWorkflowStore::new();
    store.expect_commit().times(1).returning(|_| Ok(()));

    let report = ledger(repo, store)
        .bulk_add_to_inventory(vec![intake("SN-1"), intake("   ")], UserId::random())
        .await
        .expect("bulk intake");
    assert_eq!(report.received.len(), 1);
    assert_eq!(report.received[0].serial_number, "SN-1");
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].serial_number, "");
}

#[tokio::test]
async fn warranty_window_starts_today() {
    let mut repo = MockInventoryRepository::new();
    repo.expect_warranty_expiring()
        .withf(|today, horizon| {
            *today == now().date_naive()
                && *horizon == NaiveDate::from_ymd_opt(2026, 6, 15).expect("valid date")
        })
        .times(1)
        .returning(|_, _| Ok(Vec::new()));
    let store = MockWorkflowStore::new();

    let rows = ledger(repo, store)
        .warranty_expiring(14)
        .await
        .expect("warranty query");
    assert!(rows.is_empty());
}
