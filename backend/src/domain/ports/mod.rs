//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driving ports (`*Command`, `*Query`) are implemented by the domain
//! services; driven ports (repositories, the workflow store, the history
//! sink, the SLA calculator and the vendor gateway) are implemented by
//! outbound adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod defect_lifecycle_command;
mod defect_lifecycle_query;
mod defect_repository;
mod directory;
mod history_sink;
mod inventory_ledger_command;
mod inventory_ledger_query;
mod inventory_repository;
mod sla_calculator;
mod store_error;
mod substitute_pool_repository;
mod vendor_gateway;
mod vendor_ticket_repository;
mod workflow_store;

#[cfg(test)]
pub use defect_lifecycle_command::MockDefectLifecycleCommand;
pub use defect_lifecycle_command::{
    CreateDefectRequest, DefectLifecycleCommand, DiagnosisRevision, ReplacementRequest,
    ReplacementSource, ResolveRequest, VendorReturn,
};
#[cfg(test)]
pub use defect_lifecycle_query::MockDefectLifecycleQuery;
pub use defect_lifecycle_query::DefectLifecycleQuery;
#[cfg(test)]
pub use defect_repository::MockDefectRepository;
pub use defect_repository::{DefectRepository, FixtureDefectRepository};
#[cfg(test)]
pub use directory::{MockServerRegistry, MockUserDirectory};
pub use directory::{ServerRegistry, UserDirectory};
#[cfg(test)]
pub use history_sink::MockHistorySink;
pub use history_sink::{FixtureHistorySink, HistorySink, HistorySinkError};
#[cfg(test)]
pub use inventory_ledger_command::MockInventoryLedgerCommand;
pub use inventory_ledger_command::{
    BulkIntakeRejection, BulkIntakeReport, InventoryLedgerCommand, RemovalOutcome, RemovalRequest,
};
#[cfg(test)]
pub use inventory_ledger_query::MockInventoryLedgerQuery;
pub use inventory_ledger_query::InventoryLedgerQuery;
#[cfg(test)]
pub use inventory_repository::MockInventoryRepository;
pub use inventory_repository::InventoryRepository;
#[cfg(test)]
pub use sla_calculator::MockSlaCalculator;
pub use sla_calculator::{FixtureSlaCalculator, SlaCalculator, SlaCalculatorError};
pub use store_error::{StoreError, entity};
#[cfg(test)]
pub use substitute_pool_repository::MockSubstitutePoolRepository;
pub use substitute_pool_repository::SubstitutePoolRepository;
#[cfg(test)]
pub use vendor_gateway::MockVendorGateway;
pub use vendor_gateway::{
    FixtureVendorGateway, VendorGateway, VendorGatewayError, VendorTicketSubmission,
};
#[cfg(test)]
pub use vendor_ticket_repository::MockVendorTicketRepository;
pub use vendor_ticket_repository::VendorTicketRepository;
#[cfg(test)]
pub use workflow_store::MockWorkflowStore;
pub use workflow_store::WorkflowStore;
