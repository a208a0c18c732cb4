//! In-process adapters for tests, demos and local runs.
//!
//! [`InMemoryStore`] implements every storage port plus the
//! [`WorkflowStore`]: a unit of work is validated and applied against a
//! staged copy of the state, then swapped in only when every guarded write
//! succeeded, so a failed commit leaves nothing behind. The lock is never
//! held across an `.await`.

mod apply;
mod history;
mod repositories;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::defects::DefectRecord;
use crate::domain::inventory::{InventoryComponent, ServerComponent};
use crate::domain::ports::{StoreError, WorkflowStore};
use crate::domain::servers::{ServerSummary, UserSummary};
use crate::domain::substitute::SubstitutePoolEntry;
use crate::domain::vendor_ticket::VendorTicket;
use crate::domain::{
    ComponentId, DefectId, ServerComponentId, ServerId, SubstituteId, UnitOfWork, UserId,
    VendorTicketId,
};

pub use history::InMemoryHistorySink;

#[derive(Debug, Clone, Default)]
struct State {
    defects: HashMap<DefectId, DefectRecord>,
    components: HashMap<ComponentId, InventoryComponent>,
    server_components: HashMap<ServerComponentId, ServerComponent>,
    servers: HashMap<ServerId, ServerSummary>,
    users: HashMap<UserId, UserSummary>,
    tickets: HashMap<VendorTicketId, VendorTicket>,
    substitutes: HashMap<SubstituteId, SubstitutePoolEntry>,
}

#[derive(Debug, Default)]
struct Inner {
    state: State,
    injected_failure: Option<InjectedFailure>,
    commits: usize,
}

#[derive(Debug)]
struct InjectedFailure {
    skip: usize,
    error: StoreError,
}

/// Shared in-memory state behind every storage port.
///
/// Cloning is cheap and every clone sees the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::query("in-memory store lock poisoned"))
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> Result<T, StoreError> {
        let inner = self.lock()?;
        Ok(f(&inner.state))
    }

    fn seed(&self, f: impl FnOnce(&mut State)) {
        // A poisoned lock only happens after a panicking test; keep seeding.
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut inner.state);
    }

    /// Register a server.
    pub fn insert_server(&self, server: ServerSummary) {
        self.seed(|state| {
            state.servers.insert(server.id, server);
        });
    }

    /// Register a user.
    pub fn insert_user(&self, user: UserSummary) {
        self.seed(|state| {
            state.users.insert(user.id, user);
        });
    }

    /// Store a component as is, bypassing the ledger.
    pub fn insert_component(&self, component: InventoryComponent) {
        self.seed(|state| {
            state.components.insert(component.id, component);
        });
    }

    /// Store an installed-part record.
    pub fn insert_server_component(&self, part: ServerComponent) {
        self.seed(|state| {
            state.server_components.insert(part.id, part);
        });
    }

    /// Store a defect record as is, for example a historical one.
    pub fn insert_defect(&self, record: DefectRecord) {
        self.seed(|state| {
            state.defects.insert(record.id, record);
        });
    }

    /// Add a spare server to the substitute pool.
    pub fn insert_substitute(&self, entry: SubstitutePoolEntry) {
        self.seed(|state| {
            state.substitutes.insert(entry.id, entry);
        });
    }

    /// Make the next commit fail with `error` without applying anything.
    pub fn fail_next_commit(&self, error: StoreError) {
        self.fail_commit_after(0, error);
    }

    /// Let `skip` commits through, then fail the one after with `error`.
    pub fn fail_commit_after(&self, skip: usize, error: StoreError) {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.injected_failure = Some(InjectedFailure { skip, error });
    }

    /// Units of work committed so far.
    pub fn commit_count(&self) -> usize {
        self.lock().map(|inner| inner.commits).unwrap_or_default()
    }

    /// Snapshot of one defect record.
    pub fn defect(&self, id: DefectId) -> Option<DefectRecord> {
        self.read(|state| state.defects.get(&id).cloned()).ok().flatten()
    }

    /// Snapshot of one component.
    pub fn component(&self, id: ComponentId) -> Option<InventoryComponent> {
        self.read(|state| state.components.get(&id).cloned())
            .ok()
            .flatten()
    }

    /// Snapshot of one server.
    pub fn server(&self, id: ServerId) -> Option<ServerSummary> {
        self.read(|state| state.servers.get(&id).cloned()).ok().flatten()
    }

    /// Snapshot of one substitute pool entry.
    pub fn substitute(&self, id: SubstituteId) -> Option<SubstitutePoolEntry> {
        self.read(|state| state.substitutes.get(&id).cloned())
            .ok()
            .flatten()
    }

    /// Installed-part records of one server.
    pub fn server_components_of(&self, server_id: ServerId) -> Vec<ServerComponent> {
        self.read(|state| {
            state
                .server_components
                .values()
                .filter(|part| part.server_id == server_id)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
    }

    /// Every vendor ticket, oldest first.
    pub fn tickets(&self) -> Vec<VendorTicket> {
        self.read(|state| {
            let mut tickets: Vec<_> = state.tickets.values().cloned().collect();
            tickets.sort_by_key(|ticket| ticket.sent_at);
            tickets
        })
        .unwrap_or_default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn commit(&self, unit: &UnitOfWork) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        match inner.injected_failure.take() {
            Some(InjectedFailure { skip: 0, error }) => {
                debug!(%error, "injected commit failure");
                return Err(error);
            }
            Some(InjectedFailure { skip, error }) => {
                inner.injected_failure = Some(InjectedFailure {
                    skip: skip - 1,
                    error,
                });
            }
            None => {}
        }
        let mut staged = inner.state.clone();
        for write in unit.writes() {
            apply::apply(&mut staged, write)?;
        }
        inner.state = staged;
        inner.commits += 1;
        debug!(writes = unit.writes().len(), "unit of work committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
