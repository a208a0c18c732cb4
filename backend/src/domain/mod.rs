//! Domain primitives, aggregates and workflow services.
//!
//! Purpose: define the strongly typed entities of the repair floor (defect
//! records, inventory components, vendor tickets, substitute loans) and the
//! services that move them through their workflows. Every write of one
//! workflow step is planned into a [`UnitOfWork`] and committed through the
//! [`ports::WorkflowStore`]; adapters live under `crate::outbound`.
//!
//! Public surface:
//! - Error (alias to `error::Error`) — typed failure with a stable code.
//! - DefectLifecycleService — the orchestrator behind the defect ports.
//! - InventoryLedger — the single writer of component status.
//! - VendorTicketCoordinator / SubstitutePoolCoordinator — collaborators the
//!   orchestrator plans ticket and loan writes through.
//! - HistoryDispatcher — bounded background delivery of history entries.

pub mod defects;
pub mod error;
pub mod history;
mod ids;
pub mod inventory;
pub mod ports;
pub mod servers;
pub mod substitute;
mod text_enum;
pub mod unit_of_work;
pub mod vendor_ticket;

mod defect_lifecycle_service;
mod history_dispatcher;
mod inventory_ledger;
mod sla;
mod store_errors;
mod substitute_pool_coordinator;
mod vendor_ticket_coordinator;

pub use self::defect_lifecycle_service::{
    DefectLifecycleService, LifecycleCollaborators, LifecycleConfig, LifecyclePorts,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::history_dispatcher::{HistoryDispatcher, HistoryDispatcherConfig};
pub use self::ids::{
    ComponentId, DefectId, ServerComponentId, ServerId, SubstituteId, UserId, VendorTicketId,
};
pub use self::inventory_ledger::InventoryLedger;
pub use self::sla::{SlaPolicy, TableSlaCalculator};
pub use self::substitute_pool_coordinator::SubstitutePoolCoordinator;
pub use self::text_enum::ParseEnumError;
pub use self::unit_of_work::{DefectVersion, EntityWrite, UnitOfWork};
pub use self::vendor_ticket_coordinator::{VendorTicketCoordinator, placeholder_ticket_number};

/// Convenient domain result alias.
///
/// # Examples
/// ```
/// use repair_backend::domain::{DomainResult, Error};
///
/// fn lookup() -> DomainResult<u32> {
///     Err(Error::not_found("defect 7 not found"))
/// }
///
/// assert!(lookup().is_err());
/// ```
pub type DomainResult<T> = Result<T, Error>;
