//! Test utilities for the backend crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Only compiled for tests or with the `test-support` feature.

pub mod clock {
    //! A clock tests can move by hand.

    use std::sync::{Mutex, MutexGuard};
    use std::time::Duration;

    use chrono::{DateTime, Local, TimeDelta, Utc};
    use mockable::Clock;

    /// Clock frozen at a chosen instant until a test advances it.
    #[derive(Debug)]
    pub struct MutableClock(Mutex<DateTime<Utc>>);

    impl MutableClock {
        /// A clock reading `now`.
        pub fn new(now: DateTime<Utc>) -> Self {
            Self(Mutex::new(now))
        }

        /// Move the clock forward.
        pub fn advance(&self, delta: Duration) {
            let delta = match TimeDelta::from_std(delta) {
                Ok(delta) => delta,
                Err(error) => {
                    panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
                }
            };
            *self.lock_clock() += delta;
        }

        /// Move the clock forward by whole minutes.
        pub fn advance_minutes(&self, minutes: i64) {
            *self.lock_clock() += TimeDelta::minutes(minutes);
        }

        /// Jump to `at`, backwards or forwards.
        pub fn set(&self, at: DateTime<Utc>) {
            *self.lock_clock() = at;
        }

        fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
            match self.0.lock() {
                Ok(guard) => guard,
                Err(_) => panic!("clock mutex"),
            }
        }
    }

    impl Clock for MutableClock {
        fn local(&self) -> DateTime<Local> {
            self.utc().with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            *self.lock_clock()
        }
    }
}

pub mod fixtures {
    //! Builders for seed data.

    use std::collections::BTreeMap;

    use chrono::{DateTime, TimeZone, Utc};

    use crate::domain::defects::{
        DefectPriority, DefectRecord, DefectRecordDraft, DefectStatus, DefectivePart,
        PartCategory, PartSerials,
    };
    use crate::domain::inventory::{
        ComponentCondition, InventoryComponent, InventoryStatus, NewInventoryComponent,
        ServerComponent,
    };
    use crate::domain::servers::{ServerStatus, ServerSummary, UserSummary};
    use crate::domain::{ComponentId, DefectId, ServerComponentId, ServerId, UserId};

    /// A fixed UTC instant; panics on an impossible date.
    pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        match Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).single() {
            Some(at) => at,
            None => panic!("invalid timestamp {year}-{month}-{day} {hour}:{minute}"),
        }
    }

    /// A server on the production line.
    pub fn server(serial: &str) -> ServerSummary {
        ServerSummary {
            id: ServerId::random(),
            serial_number: serial.to_owned(),
            status: ServerStatus::InProgress,
        }
    }

    /// A plant user.
    pub fn user(name: &str) -> UserSummary {
        UserSummary {
            id: UserId::random(),
            display_name: name.to_owned(),
        }
    }

    /// Intake values for a spare part.
    pub fn intake(serial: &str, category: PartCategory) -> NewInventoryComponent {
        NewInventoryComponent {
            serial_number: serial.to_owned(),
            vendor_serial: None,
            category,
            manufacturer: Some("Acme".to_owned()),
            model: Some("AC-1".to_owned()),
            condition: None,
            location: Some("Shelf A".to_owned()),
            purchase_date: None,
            warranty_expires: None,
            catalog_ref: None,
            notes: None,
        }
    }

    /// An available spare in the given condition.
    pub fn spare(
        serial: &str,
        category: PartCategory,
        condition: ComponentCondition,
        at: DateTime<Utc>,
    ) -> InventoryComponent {
        let mut component = InventoryComponent::receive(
            ComponentId::random(),
            intake(serial, category),
            UserId::random(),
            at,
        );
        component.condition = condition;
        component
    }

    /// A ledger entry installed in `server_id` plus its installed-part record.
    pub fn installed(
        serial: &str,
        category: PartCategory,
        server_id: ServerId,
        at: DateTime<Utc>,
    ) -> (InventoryComponent, ServerComponent) {
        let mut component = spare(serial, category, ComponentCondition::New, at)
            .restored_with_status(InventoryStatus::InUse);
        component.current_server_id = Some(server_id);
        let part = ServerComponent {
            id: ServerComponentId::random(),
            server_id,
            category,
            serials: component.serials(),
            manufacturer: component.manufacturer.clone(),
            model: component.model.clone(),
            inventory_id: Some(component.id),
            installed_during_defect: None,
            installed_by: UserId::random(),
            installed_at: at,
        };
        (component, part)
    }

    /// A historical defect already sitting in `status`.
    pub fn past_defect(
        server_id: ServerId,
        category: PartCategory,
        detected_at: DateTime<Utc>,
        status: DefectStatus,
    ) -> DefectRecord {
        DefectRecord::new(DefectRecordDraft {
            id: DefectId::random(),
            server_id,
            detected_by: UserId::random(),
            detected_at,
            category,
            priority: DefectPriority::Medium,
            description: "earlier failure".to_owned(),
            cluster_code: None,
            notes: None,
            vendor_ticket_number: None,
            defective_part: DefectivePart {
                serials: PartSerials::default(),
                server_component_id: None,
                inventory_id: None,
            },
            repeat_of: None,
            sla_deadline: None,
            extras: BTreeMap::new(),
        })
        .restored(status, 6)
    }
}

pub mod lifecycle {
    //! The lifecycle service wired over in-memory adapters.

    use std::sync::Arc;

    use chrono::{DateTime, Utc};
    use tokio::task::JoinHandle;

    use super::clock::MutableClock;
    use super::fixtures;
    use crate::domain::defects::{DefectStateMachine, PartCategory};
    use crate::domain::inventory::{ComponentCondition, InventoryComponent, ServerComponent};
    use crate::domain::ports::{FixtureVendorGateway, SlaCalculator, VendorGateway};
    use crate::domain::servers::ServerSummary;
    use crate::domain::substitute::SubstitutePoolEntry;
    use crate::domain::{
        DefectLifecycleService, HistoryDispatcher, HistoryDispatcherConfig, InventoryLedger,
        LifecycleCollaborators, LifecycleConfig, LifecyclePorts, ServerId, SlaPolicy,
        SubstituteId, SubstitutePoolCoordinator, TableSlaCalculator, UserId,
        VendorTicketCoordinator,
    };
    use crate::outbound::memory::{InMemoryHistorySink, InMemoryStore};

    /// Everything a workflow test needs, sharing one in-memory store.
    ///
    /// Must be built inside a Tokio runtime; the history worker is spawned
    /// on it.
    pub struct LifecycleHarness {
        /// Backing state.
        pub store: InMemoryStore,
        /// Delivered history.
        pub sink: InMemoryHistorySink,
        /// Clock shared by every service.
        pub clock: Arc<MutableClock>,
        /// History handle; call `flush` before reading `sink`.
        pub history: HistoryDispatcher,
        /// The orchestrator under test.
        pub service: DefectLifecycleService,
        /// The ledger, wired to the same store.
        pub ledger: InventoryLedger,
        _worker: JoinHandle<()>,
    }

    impl LifecycleHarness {
        /// Harness with the fixture vendor and the default SLA table.
        pub fn start(now: DateTime<Utc>) -> Self {
            Self::with_adapters(
                now,
                Arc::new(FixtureVendorGateway::default()),
                Arc::new(TableSlaCalculator::new(SlaPolicy::default())),
            )
        }

        /// Harness with the given vendor gateway and SLA calculator.
        pub fn with_adapters(
            now: DateTime<Utc>,
            gateway: Arc<dyn VendorGateway>,
            sla: Arc<dyn SlaCalculator>,
        ) -> Self {
            let store = InMemoryStore::new();
            let sink = InMemoryHistorySink::new();
            let clock = Arc::new(MutableClock::new(now));
            let (history, worker) = HistoryDispatcher::spawn(
                Arc::new(sink.clone()),
                HistoryDispatcherConfig::default(),
            );
            let shared = Arc::new(store.clone());
            let ledger = InventoryLedger::new(
                shared.clone(),
                shared.clone(),
                history.clone(),
                clock.clone(),
            );
            let service = DefectLifecycleService::new(
                LifecyclePorts {
                    defects: shared.clone(),
                    servers: shared.clone(),
                    users: shared.clone(),
                    store: shared.clone(),
                    sla,
                },
                LifecycleCollaborators {
                    ledger: ledger.clone(),
                    tickets: VendorTicketCoordinator::new(shared.clone(), gateway),
                    substitutes: SubstitutePoolCoordinator::new(shared),
                    history: history.clone(),
                    machine: DefectStateMachine,
                },
                LifecycleConfig::default(),
                clock.clone(),
            );
            Self {
                store,
                sink,
                clock,
                history,
                service,
                ledger,
                _worker: worker,
            }
        }

        /// Current harness time.
        pub fn now(&self) -> DateTime<Utc> {
            mockable::Clock::utc(self.clock.as_ref())
        }

        /// Register a server.
        pub fn add_server(&self, serial: &str) -> ServerSummary {
            let server = fixtures::server(serial);
            self.store.insert_server(server.clone());
            server
        }

        /// Register a user and return their id.
        pub fn add_user(&self, name: &str) -> UserId {
            let user = fixtures::user(name);
            let id = user.id;
            self.store.insert_user(user);
            id
        }

        /// Put an available spare on the shelf.
        pub fn add_spare(
            &self,
            serial: &str,
            category: PartCategory,
            condition: ComponentCondition,
        ) -> InventoryComponent {
            let component = fixtures::spare(serial, category, condition, self.now());
            self.store.insert_component(component.clone());
            component
        }

        /// Install a tracked part in a server.
        pub fn add_installed(
            &self,
            serial: &str,
            category: PartCategory,
            server_id: ServerId,
        ) -> (InventoryComponent, ServerComponent) {
            let (component, part) = fixtures::installed(serial, category, server_id, self.now());
            self.store.insert_component(component.clone());
            self.store.insert_server_component(part.clone());
            (component, part)
        }

        /// Add an available spare server to the substitute pool.
        pub fn add_substitute(&self, serial: &str) -> SubstitutePoolEntry {
            let spare_server = self.add_server(serial);
            let entry = SubstitutePoolEntry::available(
                SubstituteId::random(),
                spare_server.id,
                serial.to_owned(),
            );
            self.store.insert_substitute(entry.clone());
            entry
        }
    }
}
