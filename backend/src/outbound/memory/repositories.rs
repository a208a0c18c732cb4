//! Read ports served from the in-memory state.

use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::InMemoryStore;
use crate::domain::defects::{
    DefectFilter, DefectPage, DefectRecord, DefectStats, DefectStatsFilter, DefectStatus,
    PartCategory, PartSerials,
};
use crate::domain::inventory::{
    ComponentFilter, ComponentPage, InventoryComponent, InventoryStats, InventoryStatus,
    ServerComponent, warranty_lapses_within,
};
use crate::domain::ports::{
    DefectRepository, InventoryRepository, ServerRegistry, StoreError, SubstitutePoolRepository,
    UserDirectory, VendorTicketRepository,
};
use crate::domain::servers::{ServerSummary, UserSummary};
use crate::domain::substitute::{SubstitutePoolEntry, SubstituteStatus};
use crate::domain::vendor_ticket::VendorTicket;
use crate::domain::{ComponentId, DefectId, ServerId, SubstituteId, UserId};

fn page<T>(rows: Vec<T>, limit: usize, offset: usize) -> (Vec<T>, usize) {
    let total = rows.len();
    (rows.into_iter().skip(offset).take(limit).collect(), total)
}

#[async_trait]
impl DefectRepository for InMemoryStore {
    async fn find_by_id(&self, id: DefectId) -> Result<Option<DefectRecord>, StoreError> {
        self.read(|state| state.defects.get(&id).cloned())
    }

    async fn find_latest_finished(
        &self,
        server_id: ServerId,
        category: PartCategory,
        since: DateTime<Utc>,
    ) -> Result<Option<DefectRecord>, StoreError> {
        self.read(|state| {
            state
                .defects
                .values()
                .filter(|record| {
                    record.server_id == server_id
                        && record.category == category
                        && matches!(record.status(), DefectStatus::Resolved | DefectStatus::Closed)
                        && record.detected_at >= since
                })
                .max_by_key(|record| record.detected_at)
                .cloned()
        })
    }

    async fn list(
        &self,
        filter: &DefectFilter,
        now: DateTime<Utc>,
    ) -> Result<DefectPage, StoreError> {
        let mut matching = self.read(|state| {
            state
                .defects
                .values()
                .filter(|record| filter.matches(record, now))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        matching.sort_by_key(|record| Reverse(record.detected_at));
        let limit = filter.effective_limit();
        let (rows, total) = page(matching, limit, filter.offset);
        Ok(DefectPage {
            rows,
            total,
            limit,
            offset: filter.offset,
        })
    }

    async fn stats(
        &self,
        filter: &DefectStatsFilter,
        now: DateTime<Utc>,
    ) -> Result<DefectStats, StoreError> {
        let filter = filter.as_filter();
        self.read(|state| {
            DefectStats::collect(
                state
                    .defects
                    .values()
                    .filter(|record| filter.matches(record, now)),
                now,
            )
        })
    }
}

#[async_trait]
impl InventoryRepository for InMemoryStore {
    async fn find_by_id(&self, id: ComponentId) -> Result<Option<InventoryComponent>, StoreError> {
        self.read(|state| state.components.get(&id).cloned())
    }

    async fn find_by_serial(
        &self,
        serial: &str,
    ) -> Result<Option<InventoryComponent>, StoreError> {
        self.read(|state| {
            state
                .components
                .values()
                .find(|component| component.has_serial(serial))
                .cloned()
        })
    }

    async fn find_server_component(
        &self,
        server_id: ServerId,
        category: PartCategory,
        serials: &PartSerials,
    ) -> Result<Option<ServerComponent>, StoreError> {
        self.read(|state| {
            state
                .server_components
                .values()
                .filter(|part| part.server_id == server_id)
                .filter(|part| serials.iter().any(|serial| part.serials.matches(serial)))
                .max_by_key(|part| (part.category == category, part.installed_at))
                .cloned()
        })
    }

    async fn list(
        &self,
        filter: &ComponentFilter,
        today: NaiveDate,
    ) -> Result<ComponentPage, StoreError> {
        let mut matching = self.read(|state| {
            state
                .components
                .values()
                .filter(|component| filter.matches(component, today))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        matching.sort_by_key(|component| Reverse(component.created_at));
        let limit = filter.effective_limit();
        let (rows, total) = page(matching, limit, filter.offset);
        Ok(ComponentPage {
            rows,
            total,
            limit,
            offset: filter.offset,
        })
    }

    async fn available_by_category(
        &self,
        category: PartCategory,
    ) -> Result<Vec<InventoryComponent>, StoreError> {
        let mut available = self.read(|state| {
            state
                .components
                .values()
                .filter(|component| {
                    component.category == category
                        && component.status() == InventoryStatus::Available
                })
                .cloned()
                .collect::<Vec<_>>()
        })?;
        available.sort_by_key(|component| {
            (component.condition.preference_rank(), component.created_at)
        });
        Ok(available)
    }

    async fn stats(
        &self,
        today: NaiveDate,
        horizon: NaiveDate,
    ) -> Result<InventoryStats, StoreError> {
        self.read(|state| InventoryStats::collect(state.components.values(), today, horizon))
    }

    async fn warranty_expiring(
        &self,
        today: NaiveDate,
        horizon: NaiveDate,
    ) -> Result<Vec<InventoryComponent>, StoreError> {
        let mut expiring = self.read(|state| {
            state
                .components
                .values()
                .filter(|component| warranty_lapses_within(component, today, horizon))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        expiring.sort_by_key(|component| component.warranty_expires);
        Ok(expiring)
    }
}

#[async_trait]
impl VendorTicketRepository for InMemoryStore {
    async fn find_open_for_defect(
        &self,
        defect_id: DefectId,
    ) -> Result<Option<VendorTicket>, StoreError> {
        self.read(|state| {
            state
                .tickets
                .values()
                .filter(|ticket| ticket.defect_id == defect_id && ticket.status.is_open())
                .max_by_key(|ticket| ticket.sent_at)
                .cloned()
        })
    }

    async fn find_by_number(
        &self,
        ticket_number: &str,
    ) -> Result<Option<VendorTicket>, StoreError> {
        let wanted = ticket_number.trim();
        self.read(|state| {
            state
                .tickets
                .values()
                .find(|ticket| ticket.ticket_number == wanted)
                .cloned()
        })
    }

    async fn list_for_defect(&self, defect_id: DefectId) -> Result<Vec<VendorTicket>, StoreError> {
        let mut tickets = self.read(|state| {
            state
                .tickets
                .values()
                .filter(|ticket| ticket.defect_id == defect_id)
                .cloned()
                .collect::<Vec<_>>()
        })?;
        tickets.sort_by_key(|ticket| ticket.sent_at);
        Ok(tickets)
    }
}

#[async_trait]
impl SubstitutePoolRepository for InMemoryStore {
    async fn find_by_id(
        &self,
        id: SubstituteId,
    ) -> Result<Option<SubstitutePoolEntry>, StoreError> {
        self.read(|state| state.substitutes.get(&id).cloned())
    }

    async fn find_first_available(&self) -> Result<Option<SubstitutePoolEntry>, StoreError> {
        self.read(|state| {
            state
                .substitutes
                .values()
                .filter(|entry| entry.status == SubstituteStatus::Available)
                .min_by(|left, right| {
                    left.usage_count
                        .cmp(&right.usage_count)
                        .then_with(|| left.serial_number.cmp(&right.serial_number))
                })
                .cloned()
        })
    }

    async fn find_issued_for_defect(
        &self,
        defect_id: DefectId,
    ) -> Result<Option<SubstitutePoolEntry>, StoreError> {
        self.read(|state| {
            state
                .substitutes
                .values()
                .find(|entry| {
                    entry.status == SubstituteStatus::Issued
                        && entry.current_defect_id == Some(defect_id)
                })
                .cloned()
        })
    }
}

#[async_trait]
impl ServerRegistry for InMemoryStore {
    async fn find_server(&self, id: ServerId) -> Result<Option<ServerSummary>, StoreError> {
        self.read(|state| state.servers.get(&id).cloned())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_user(&self, id: UserId) -> Result<Option<UserSummary>, StoreError> {
        self.read(|state| state.users.get(&id).cloned())
    }
}
