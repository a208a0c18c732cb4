//! Behaviour-driven development (BDD) tests for the defect repair lifecycle.
//!
//! The scenarios drive the real orchestrator over the in-memory adapters and
//! check that parts, vendor tickets and the server follow each defect from
//! intake to its final status.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use repair_backend::domain::defects::{DefectRecord, DefectStatus, PartCategory, PartSerials};
use repair_backend::domain::inventory::{ComponentCondition, InventoryStatus};
use repair_backend::domain::ports::{
    CreateDefectRequest, DefectLifecycleCommand, DiagnosisRevision, ReplacementRequest,
    ReplacementSource, ResolveRequest, VendorReturn,
};
use repair_backend::domain::servers::{ServerStatus, ServerSummary};
use repair_backend::domain::vendor_ticket::{TicketStatus, VendorTicketRequest};
use repair_backend::domain::{ComponentId, Error, ErrorCode, UserId};
use repair_backend::test_support::fixtures::utc;
use repair_backend::test_support::lifecycle::LifecycleHarness;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, scenario, then, when};
use tokio::runtime::Runtime;

// -----------------------------------------------------------------------------
// Test World
// -----------------------------------------------------------------------------

/// Wrapper for non-Clone types to enable storage in `Slot`.
#[derive(Clone)]
struct RuntimeHandle(Arc<Runtime>);

/// Shared handle onto the harness, which owns the history worker.
#[derive(Clone)]
struct HarnessHandle(Arc<LifecycleHarness>);

/// Test world holding the repair floor and the latest outcome.
#[derive(Default, ScenarioState)]
struct RepairFloorWorld {
    runtime: Slot<RuntimeHandle>,
    harness: Slot<HarnessHandle>,
    server: Slot<ServerSummary>,
    technician: Slot<UserId>,
    parts: Slot<HashMap<String, ComponentId>>,
    defect: Slot<DefectRecord>,
    last_error: Slot<Error>,
}

impl RepairFloorWorld {
    fn open_floor(&self) {
        let runtime = Runtime::new().expect("create runtime");
        let harness = runtime.block_on(async { LifecycleHarness::start(utc(2026, 3, 2, 8, 0)) });
        let server = harness.add_server("SRV-0100");
        let technician = harness.add_user("Dana Tech");

        self.runtime.set(RuntimeHandle(Arc::new(runtime)));
        self.harness.set(HarnessHandle(Arc::new(harness)));
        self.server.set(server);
        self.technician.set(technician);
        self.parts.set(HashMap::new());
    }

    fn harness(&self) -> Arc<LifecycleHarness> {
        self.harness.get().expect("repair floor is open").0
    }

    fn server(&self) -> ServerSummary {
        self.server.get().expect("server registered")
    }

    fn technician(&self) -> UserId {
        self.technician.get().expect("technician registered")
    }

    fn remember_part(&self, serial: &str, id: ComponentId) {
        let mut parts = self.parts.get().unwrap_or_default();
        parts.insert(serial.to_owned(), id);
        self.parts.set(parts);
    }

    fn part(&self, serial: &str) -> ComponentId {
        self.parts
            .get()
            .and_then(|parts| parts.get(serial).copied())
            .unwrap_or_else(|| panic!("unknown part {serial}"))
    }

    fn defect(&self) -> DefectRecord {
        self.defect.get().expect("a defect was reported")
    }

    /// Run one command on the floor's runtime and keep the refreshed record.
    fn act<F, Fut>(&self, step: F)
    where
        F: FnOnce(Arc<LifecycleHarness>, UserId) -> Fut,
        Fut: Future<Output = Result<DefectRecord, Error>>,
    {
        let runtime = self.runtime.get().expect("runtime").0;
        let outcome = runtime.block_on(step(self.harness(), self.technician()));
        match outcome {
            Ok(record) => self.defect.set(record),
            Err(error) => self.last_error.set(error),
        }
    }

    fn act_ok<F, Fut>(&self, label: &str, step: F)
    where
        F: FnOnce(Arc<LifecycleHarness>, UserId) -> Fut,
        Fut: Future<Output = Result<DefectRecord, Error>>,
    {
        self.act(step);
        if let Some(error) = self.last_error.get() {
            panic!("{label} failed: {error}");
        }
    }
}

#[fixture]
fn world() -> RepairFloorWorld {
    RepairFloorWorld::default()
}

fn category(raw: &str) -> PartCategory {
    raw.parse().expect("known part category")
}

fn resolution(text: &str) -> ResolveRequest {
    ResolveRequest {
        resolution: text.to_owned(),
        repair_details: None,
        notes: None,
    }
}

// -----------------------------------------------------------------------------
// Given Steps
// -----------------------------------------------------------------------------

#[given("a server on the repair floor with an installed {kind} part {serial}")]
fn a_server_with_an_installed_part(world: &RepairFloorWorld, kind: String, serial: String) {
    world.open_floor();
    let (component, _) = world
        .harness()
        .add_installed(&serial, category(&kind), world.server().id);
    world.remember_part(&serial, component.id);
}

#[given("a spare {kind} part {serial} on the shelf")]
fn a_spare_part_on_the_shelf(world: &RepairFloorWorld, kind: String, serial: String) {
    let spare = world
        .harness()
        .add_spare(&serial, category(&kind), ComponentCondition::New);
    world.remember_part(&serial, spare.id);
}

// -----------------------------------------------------------------------------
// When Steps
// -----------------------------------------------------------------------------

#[when("a {kind} defect is reported against part {serial}")]
fn a_defect_is_reported(world: &RepairFloorWorld, kind: String, serial: String) {
    let request = CreateDefectRequest {
        server_id: world.server().id,
        detected_by: world.technician(),
        category: category(&kind),
        description: "errors during burn-in".to_owned(),
        priority: None,
        serials: PartSerials::new(None, Some(serial)),
        vendor_ticket_number: None,
        cluster_code: None,
        notes: None,
        extras: BTreeMap::new(),
    };
    world.act_ok("intake", |harness, _| async move {
        harness.service.create(request).await
    });
}

#[when("diagnosis starts")]
fn diagnosis_starts(world: &RepairFloorWorld) {
    let id = world.defect().id;
    world.act_ok("start diagnosis", |harness, tech| async move {
        harness.service.start_diagnosis(id, tech).await
    });
}

#[when("diagnosis concludes that parts are needed")]
fn diagnosis_concludes(world: &RepairFloorWorld) {
    let id = world.defect().id;
    world.act_ok("complete diagnosis", |harness, tech| async move {
        harness
            .service
            .complete_diagnosis(
                id,
                tech,
                DiagnosisRevision {
                    notes: Some("fails memtest".to_owned()),
                    ..DiagnosisRevision::default()
                },
            )
            .await
    });
}

#[when("spare {serial} is reserved and installed")]
fn spare_is_reserved_and_installed(world: &RepairFloorWorld, serial: String) {
    let id = world.defect().id;
    let component_id = world.part(&serial);
    world.act_ok("reserve", |harness, tech| async move {
        harness
            .service
            .reserve_replacement_part(id, component_id, tech)
            .await
    });
    world.act_ok("replace", |harness, tech| async move {
        harness
            .service
            .perform_replacement(
                id,
                tech,
                ReplacementRequest {
                    source: ReplacementSource::Inventory { component_id },
                    notes: None,
                },
            )
            .await
    });
}

#[when("repair starts")]
fn repair_starts(world: &RepairFloorWorld) {
    let id = world.defect().id;
    world.act_ok("start repair", |harness, tech| async move {
        harness.service.start_repair(id, tech).await
    });
}

#[when("{minutes} minutes pass")]
fn minutes_pass(world: &RepairFloorWorld, minutes: String) {
    let minutes: i64 = minutes.parse().expect("whole minutes");
    world.harness().clock.advance_minutes(minutes);
}

#[when("the defect is resolved")]
fn the_defect_is_resolved(world: &RepairFloorWorld) {
    let id = world.defect().id;
    world.act_ok("resolve", |harness, tech| async move {
        harness.service.resolve(id, tech, resolution("repaired")).await
    });
}

#[when("the defect is closed")]
fn the_defect_is_closed(world: &RepairFloorWorld) {
    let id = world.defect().id;
    world.act_ok("close", |harness, tech| async move {
        harness.service.close(id, tech).await
    });
}

#[when("the part is shipped to the vendor under ticket {ticket}")]
fn the_part_is_shipped(world: &RepairFloorWorld, ticket: String) {
    let id = world.defect().id;
    world.act_ok("send to vendor", |harness, tech| async move {
        harness
            .service
            .send_to_vendor(
                id,
                tech,
                VendorTicketRequest {
                    ticket_number: Some(ticket),
                    ..VendorTicketRequest::default()
                },
            )
            .await
    });
}

#[when("the vendor returns the part refurbished")]
fn the_vendor_returns_the_part(world: &RepairFloorWorld) {
    let id = world.defect().id;
    world.act_ok("return from vendor", |harness, tech| async move {
        harness
            .service
            .return_from_vendor(
                id,
                tech,
                VendorReturn {
                    resolution: Some("board reworked".to_owned()),
                    replacement_serials: None,
                    condition: Some(ComponentCondition::Refurbished),
                },
            )
            .await
    });
}

#[when("the defect is scrapped as beyond repair")]
fn the_defect_is_scrapped(world: &RepairFloorWorld) {
    let id = world.defect().id;
    world.act_ok("scrap", |harness, tech| async move {
        harness
            .service
            .scrap(id, tech, "beyond repair".to_owned())
            .await
    });
}

#[when("resolving is attempted")]
fn resolving_is_attempted(world: &RepairFloorWorld) {
    let id = world.defect().id;
    world.act(|harness, tech| async move {
        harness.service.resolve(id, tech, resolution("too late")).await
    });
}

// -----------------------------------------------------------------------------
// Then Steps
// -----------------------------------------------------------------------------

#[then("the defect status is {status}")]
fn the_defect_status_is(world: &RepairFloorWorld, status: String) {
    let expected: DefectStatus = status.parse().expect("known defect status");
    assert_eq!(world.defect().status(), expected);
}

#[then("the recorded downtime is {minutes} minutes")]
fn the_recorded_downtime_is(world: &RepairFloorWorld, minutes: String) {
    let expected: i64 = minutes.parse().expect("whole minutes");
    let actual = world
        .defect()
        .resolution
        .total_downtime_minutes
        .expect("downtime recorded");
    assert!(
        (actual - expected).abs() <= 1,
        "expected about {expected} minutes, got {actual}"
    );
}

#[then("part {serial} has status {status}")]
fn part_has_status(world: &RepairFloorWorld, serial: String, status: String) {
    let expected: InventoryStatus = status.parse().expect("known inventory status");
    let component = world
        .harness()
        .store
        .component(world.part(&serial))
        .expect("component stored");
    assert_eq!(component.status(), expected);
}

#[then("the server status is {status}")]
fn the_server_status_is(world: &RepairFloorWorld, status: String) {
    let expected: ServerStatus = status.parse().expect("known server status");
    let server = world
        .harness()
        .store
        .server(world.server().id)
        .expect("server stored");
    assert_eq!(server.status, expected);
}

#[then("the vendor ticket {ticket} has status {status}")]
fn the_vendor_ticket_has_status(world: &RepairFloorWorld, ticket: String, status: String) {
    let expected: TicketStatus = status.parse().expect("known ticket status");
    let found = world
        .harness()
        .store
        .tickets()
        .into_iter()
        .find(|candidate| candidate.ticket_number == ticket)
        .expect("ticket stored");
    assert_eq!(found.status, expected);
}

#[then("the attempt fails with an illegal transition")]
fn the_attempt_fails(world: &RepairFloorWorld) {
    let error = world.last_error.get().expect("the attempt failed");
    assert_eq!(error.code(), ErrorCode::IllegalTransition);
}

// -----------------------------------------------------------------------------
// Scenario Bindings
// -----------------------------------------------------------------------------

#[scenario(
    path = "tests/features/defect_lifecycle.feature",
    name = "Local repair with a spare from inventory"
)]
fn local_repair_with_a_spare(world: RepairFloorWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/defect_lifecycle.feature",
    name = "Vendor round trip"
)]
fn vendor_round_trip(world: RepairFloorWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/defect_lifecycle.feature",
    name = "Unrepairable part is scrapped"
)]
fn unrepairable_part_is_scrapped(world: RepairFloorWorld) {
    let _ = world;
}
