//! The set of guarded writes one workflow operation commits atomically.
//!
//! Services plan every write of an operation into a [`UnitOfWork`] and hand
//! it to the [`WorkflowStore`](crate::domain::ports::WorkflowStore). Updates
//! carry the state they expect to overwrite; the store applies the writes in
//! order and rejects the whole unit when any expectation no longer holds.
//! History entries ride along and are dispatched only after a commit.

use crate::domain::defects::{DefectRecord, DefectStatus};
use crate::domain::history::HistoryEntry;
use crate::domain::inventory::{InventoryComponent, InventoryStatus, ServerComponent};
use crate::domain::servers::ServerStatus;
use crate::domain::substitute::{SubstitutePoolEntry, SubstituteStatus};
use crate::domain::vendor_ticket::{TicketStatus, VendorTicket};
use crate::domain::ServerId;

/// Status and revision a defect update expects to find in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefectVersion {
    /// Status at load time.
    pub status: DefectStatus,
    /// Revision at load time.
    pub revision: i64,
}

impl DefectVersion {
    /// Capture the version of a loaded record.
    pub const fn of(record: &DefectRecord) -> Self {
        Self {
            status: record.status(),
            revision: record.revision(),
        }
    }
}

/// One guarded write.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityWrite {
    /// Insert a new defect record.
    InsertDefect(DefectRecord),
    /// Replace a defect record if its version still matches.
    UpdateDefect {
        /// New state.
        record: DefectRecord,
        /// Expected stored version.
        expected: DefectVersion,
    },
    /// Insert a new inventory component; serials must be unique.
    InsertComponent(InventoryComponent),
    /// Replace a component if its status still matches.
    UpdateComponent {
        /// New state.
        component: InventoryComponent,
        /// Expected stored status.
        expected: InventoryStatus,
    },
    /// Record a part installed in a server.
    InsertServerComponent(ServerComponent),
    /// Change a server's production status.
    SetServerStatus {
        /// Server to update.
        server_id: ServerId,
        /// New status.
        status: ServerStatus,
    },
    /// Insert a vendor ticket.
    InsertTicket(VendorTicket),
    /// Replace a vendor ticket if its status still matches.
    UpdateTicket {
        /// New state.
        ticket: VendorTicket,
        /// Expected stored status.
        expected: TicketStatus,
    },
    /// Replace a substitute pool entry if its status still matches.
    UpdateSubstitute {
        /// New state.
        entry: SubstitutePoolEntry,
        /// Expected stored status.
        expected: SubstituteStatus,
    },
}

/// Ordered writes plus the history they produce.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOfWork {
    writes: Vec<EntityWrite>,
    history: Vec<HistoryEntry>,
}

impl UnitOfWork {
    /// An empty unit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write.
    pub fn push(&mut self, write: EntityWrite) {
        self.writes.push(write);
    }

    /// Queue a history entry for dispatch after commit.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    /// Queue a guarded defect update.
    pub fn update_defect(&mut self, expected: DefectVersion, record: DefectRecord) {
        self.push(EntityWrite::UpdateDefect { record, expected });
    }

    /// Queue a guarded component update.
    pub fn update_component(&mut self, expected: InventoryStatus, component: InventoryComponent) {
        self.push(EntityWrite::UpdateComponent {
            component,
            expected,
        });
    }

    /// Move every write and history entry of `other` onto the end of `self`.
    pub fn absorb(&mut self, other: Self) {
        self.writes.extend(other.writes);
        self.history.extend(other.history);
    }

    /// Queued writes in commit order.
    pub fn writes(&self) -> &[EntityWrite] {
        &self.writes
    }

    /// Queued history entries.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// True when nothing would be written.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Hand the history entries over once the writes are committed.
    pub fn into_history(self) -> Vec<HistoryEntry> {
        self.history
    }
}
