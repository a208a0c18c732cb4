//! Tests for vendor ticket planning.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::TimeZone;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::defects::{
    DefectPriority, DefectRecordDraft, DefectivePart, PartCategory,
};
use crate::domain::ports::{
    FixtureVendorGateway, MockVendorGateway, MockVendorTicketRepository, VendorGatewayError,
};
use crate::domain::servers::ServerStatus;
use crate::domain::ServerId;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 14, 8, 30, 0)
        .single()
        .expect("valid timestamp")
}

#[fixture]
fn record() -> DefectRecord {
    DefectRecord::new(DefectRecordDraft {
        id: DefectId::random(),
        server_id: ServerId::random(),
        detected_by: UserId::random(),
        detected_at: now(),
        category: PartCategory::Psu,
        priority: DefectPriority::High,
        description: "PSU 2 reports input lost".to_owned(),
        cluster_code: None,
        notes: None,
        vendor_ticket_number: None,
        defective_part: DefectivePart {
            serials: PartSerials::new(Some("Y-PSU-7".to_owned()), None),
            ..DefectivePart::default()
        },
        repeat_of: None,
        sla_deadline: None,
        extras: BTreeMap::new(),
    })
}

fn server(record: &DefectRecord) -> ServerSummary {
    ServerSummary {
        id: record.server_id,
        serial_number: "SRV-0042".to_owned(),
        status: ServerStatus::Defect,
    }
}

fn ticket_for(record: &DefectRecord, number: &str, status: TicketStatus) -> VendorTicket {
    VendorTicket {
        id: VendorTicketId::random(),
        ticket_number: number.to_owned(),
        defect_id: record.id,
        server_id: record.server_id,
        ticket_type: TicketType::ComponentRepair,
        status,
        subject: "Repair".to_owned(),
        description: None,
        category: record.category,
        serials: record.defective_part.serials.clone(),
        tracking_number: None,
        resolution: None,
        replacement_serials: PartSerials::default(),
        placeholder: false,
        sent_at: now(),
        received_at: None,
        closed_at: None,
        created_by: UserId::random(),
    }
}

fn coordinator(
    tickets: MockVendorTicketRepository,
    gateway: impl VendorGateway + 'static,
) -> VendorTicketCoordinator {
    VendorTicketCoordinator::new(Arc::new(tickets), Arc::new(gateway))
}

#[rstest]
#[tokio::test]
async fn submission_uses_vendor_number_and_default_subject(record: DefectRecord) {
    let coordinator = coordinator(MockVendorTicketRepository::new(), FixtureVendorGateway::default());

    let plan = coordinator
        .plan_submission(
            &record,
            Some(&server(&record)),
            &VendorTicketRequest::default(),
            UserId::random(),
            now(),
        )
        .await
        .expect("submission planned");

    assert_eq!(plan.ticket.ticket_number, "YT-FIXTURE-0001");
    assert!(!plan.ticket.placeholder);
    assert_eq!(plan.ticket.subject, "Repair Power supply - server SRV-0042");
    assert_eq!(plan.ticket.description.as_deref(), Some("PSU 2 reports input lost"));
    assert_eq!(plan.ticket.status, TicketStatus::Submitted);
    assert!(matches!(plan.unit.writes(), [EntityWrite::InsertTicket(_)]));
    assert_eq!(plan.unit.history()[0].action, HistoryAction::TicketOpened);
}

#[rstest]
#[tokio::test]
async fn unreachable_vendor_yields_placeholder(record: DefectRecord) {
    let mut gateway = MockVendorGateway::new();
    gateway
        .expect_open_ticket()
        .times(1)
        .return_once(|_| Err(VendorGatewayError::unreachable("timeout")));
    let coordinator = coordinator(MockVendorTicketRepository::new(), gateway);

    let plan = coordinator
        .plan_submission(&record, None, &VendorTicketRequest::default(), UserId::random(), now())
        .await
        .expect("submission planned");

    assert!(plan.ticket.placeholder);
    assert_eq!(plan.ticket.ticket_number, placeholder_ticket_number(now(), record.id));
    assert!(plan.ticket.ticket_number.starts_with("YT-PENDING-20260714083000-"));
}

#[rstest]
#[tokio::test]
async fn caller_number_skips_the_gateway(record: DefectRecord) {
    let mut tickets = MockVendorTicketRepository::new();
    tickets
        .expect_find_by_number()
        .withf(|number| number == "YT-2026-17")
        .times(1)
        .return_once(|_| Ok(None));
    let mut gateway = MockVendorGateway::new();
    gateway.expect_open_ticket().never();
    let coordinator = coordinator(tickets, gateway);
    let request = VendorTicketRequest {
        ticket_number: Some(" YT-2026-17 ".to_owned()),
        tracking_number: Some("CDEK-1".to_owned()),
        ..VendorTicketRequest::default()
    };

    let plan = coordinator
        .plan_submission(&record, None, &request, UserId::random(), now())
        .await
        .expect("submission planned");

    assert_eq!(plan.ticket.ticket_number, "YT-2026-17");
    assert_eq!(plan.ticket.tracking_number.as_deref(), Some("CDEK-1"));
}

#[rstest]
#[tokio::test]
async fn open_ticket_of_same_defect_is_reused(record: DefectRecord) {
    let existing = ticket_for(&record, "YT-9", TicketStatus::Submitted);
    let existing_id = existing.id;
    let mut tickets = MockVendorTicketRepository::new();
    tickets
        .expect_find_by_number()
        .times(1)
        .return_once(move |_| Ok(Some(existing)));
    let coordinator = coordinator(tickets, MockVendorGateway::new());
    let request = VendorTicketRequest {
        ticket_number: Some("YT-9".to_owned()),
        ..VendorTicketRequest::default()
    };

    let plan = coordinator
        .plan_submission(&record, None, &request, UserId::random(), now())
        .await
        .expect("submission planned");

    assert_eq!(plan.ticket.id, existing_id);
    assert!(plan.unit.is_empty());
}

#[rstest]
#[tokio::test]
async fn received_ticket_is_resubmitted_on_reuse(record: DefectRecord) {
    let mut existing = ticket_for(&record, "YT-9", TicketStatus::Received);
    existing.received_at = Some(now());
    existing.resolution = Some("board swapped".to_owned());
    let existing_id = existing.id;
    let mut tickets = MockVendorTicketRepository::new();
    tickets
        .expect_find_by_number()
        .times(1)
        .return_once(move |_| Ok(Some(existing)));
    let coordinator = coordinator(tickets, MockVendorGateway::new());
    let request = VendorTicketRequest {
        ticket_number: Some("YT-9".to_owned()),
        tracking_number: Some("CDEK-2".to_owned()),
        ..VendorTicketRequest::default()
    };
    let later = now() + chrono::TimeDelta::days(3);

    let plan = coordinator
        .plan_submission(&record, None, &request, UserId::random(), later)
        .await
        .expect("submission planned");

    assert_eq!(plan.ticket.id, existing_id);
    assert_eq!(plan.ticket.status, TicketStatus::Submitted);
    assert_eq!(plan.ticket.sent_at, later);
    assert_eq!(plan.ticket.received_at, None);
    assert_eq!(plan.ticket.tracking_number.as_deref(), Some("CDEK-2"));
    assert_eq!(plan.ticket.resolution.as_deref(), Some("board swapped"));
    assert!(matches!(
        plan.unit.writes(),
        [EntityWrite::UpdateTicket {
            expected: TicketStatus::Received,
            ..
        }]
    ));
}

#[rstest]
#[tokio::test]
async fn ticket_of_another_defect_conflicts(record: DefectRecord) {
    let mut other = ticket_for(&record, "YT-10", TicketStatus::Submitted);
    other.defect_id = DefectId::random();
    let mut tickets = MockVendorTicketRepository::new();
    tickets
        .expect_find_by_number()
        .return_once(move |_| Ok(Some(other)));
    let coordinator = coordinator(tickets, MockVendorGateway::new());
    let request = VendorTicketRequest {
        ticket_number: Some("YT-10".to_owned()),
        ..VendorTicketRequest::default()
    };

    let error = coordinator
        .plan_submission(&record, None, &request, UserId::random(), now())
        .await
        .expect_err("ticket belongs elsewhere");

    assert_eq!(error.code(), ErrorCode::Conflict);
}

#[rstest]
#[tokio::test]
async fn receipt_records_resolution_and_guards_on_submitted(record: DefectRecord) {
    let open = ticket_for(&record, "YT-11", TicketStatus::Submitted);
    let mut tickets = MockVendorTicketRepository::new();
    tickets
        .expect_find_open_for_defect()
        .return_once(move |_| Ok(Some(open)));
    let coordinator = coordinator(tickets, MockVendorGateway::new());
    let serials = PartSerials::new(Some("Y-PSU-NEW".to_owned()), None);

    let plan = coordinator
        .plan_receipt(record.id, Some("unit replaced"), Some(&serials), UserId::random(), now())
        .await
        .expect("receipt planned")
        .expect("open ticket found");

    assert_eq!(plan.ticket.status, TicketStatus::Received);
    assert_eq!(plan.ticket.resolution.as_deref(), Some("unit replaced"));
    assert_eq!(plan.ticket.replacement_serials, serials);
    assert!(matches!(
        plan.unit.writes(),
        [EntityWrite::UpdateTicket {
            expected: TicketStatus::Submitted,
            ..
        }]
    ));
}

#[rstest]
#[tokio::test]
async fn closure_without_open_ticket_is_a_no_op(record: DefectRecord) {
    let closed = ticket_for(&record, "YT-13", TicketStatus::Closed);
    let mut tickets = MockVendorTicketRepository::new();
    tickets
        .expect_list_for_defect()
        .return_once(move |_| Ok(vec![closed]));
    let coordinator = coordinator(tickets, MockVendorGateway::new());

    let plans = coordinator
        .plan_closure(record.id, UserId::random(), now())
        .await
        .expect("closure planned");

    assert!(plans.is_empty());
}

#[rstest]
#[tokio::test]
async fn closure_covers_every_open_ticket(record: DefectRecord) {
    let earlier = ticket_for(&record, "YT-14", TicketStatus::Received);
    let latest = ticket_for(&record, "YT-15", TicketStatus::Submitted);
    let done = ticket_for(&record, "YT-16", TicketStatus::Closed);
    let mut tickets = MockVendorTicketRepository::new();
    tickets
        .expect_list_for_defect()
        .times(1)
        .return_once(move |_| Ok(vec![earlier, latest, done]));
    let coordinator = coordinator(tickets, MockVendorGateway::new());

    let plans = coordinator
        .plan_closure(record.id, UserId::random(), now())
        .await
        .expect("closure planned");

    let closed: Vec<_> = plans
        .iter()
        .map(|plan| (plan.ticket.ticket_number.as_str(), plan.ticket.status))
        .collect();
    assert_eq!(
        closed,
        [("YT-14", TicketStatus::Closed), ("YT-15", TicketStatus::Closed)]
    );
    assert!(matches!(
        plans[0].unit.writes(),
        [EntityWrite::UpdateTicket {
            expected: TicketStatus::Received,
            ..
        }]
    ));
    assert!(matches!(
        plans[1].unit.writes(),
        [EntityWrite::UpdateTicket {
            expected: TicketStatus::Submitted,
            ..
        }]
    ));
}

#[rstest]
#[tokio::test]
async fn placeholder_tickets_are_not_reported_to_the_vendor(record: DefectRecord) {
    let mut ticket = ticket_for(&record, "YT-PENDING-1", TicketStatus::Closed);
    ticket.placeholder = true;
    let mut gateway = MockVendorGateway::new();
    gateway.expect_close_ticket().never();
    gateway.expect_mark_received().never();
    let coordinator = coordinator(MockVendorTicketRepository::new(), gateway);

    coordinator.notify_received(&ticket).await;
    coordinator.notify_closed(&ticket).await;
}

#[rstest]
#[tokio::test]
async fn vendor_notification_failures_are_swallowed(record: DefectRecord) {
    let ticket = ticket_for(&record, "YT-12", TicketStatus::Closed);
    let mut gateway = MockVendorGateway::new();
    gateway
        .expect_close_ticket()
        .times(1)
        .return_once(|_| Err(VendorGatewayError::rejected("already closed")));
    let coordinator = coordinator(MockVendorTicketRepository::new(), gateway);

    coordinator.notify_closed(&ticket).await;
}
