//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the storage ports backed by PostgreSQL via
//! `diesel-async` with `bb8` pooling.
//!
//! - **Thin adapters**: repositories translate between rows and aggregates;
//!   every workflow rule stays in the domain.
//! - **One transaction per unit of work**: [`DieselWorkflowStore`] applies a
//!   planned unit with conditional updates and rolls back on the first
//!   stale or failed write.
//! - **Internal models**: row structs (`models.rs`) and the schema
//!   (`schema.rs`) never leave this module.
//!
//! # Example
//!
//! ```ignore
//! use repair_backend::outbound::persistence::{DbPool, DieselWorkflowStore, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/defects")).await?;
//! let store = DieselWorkflowStore::new(pool.clone());
//! ```

mod diesel_defect_repository;
mod diesel_directory;
mod diesel_error_mapping;
mod diesel_history_sink;
mod diesel_inventory_repository;
mod diesel_vendor_ticket_repository;
mod diesel_workflow_store;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_defect_repository::DieselDefectRepository;
pub use diesel_directory::DieselDirectory;
pub use diesel_history_sink::DieselHistorySink;
pub use diesel_inventory_repository::DieselInventoryRepository;
pub use diesel_vendor_ticket_repository::{
    DieselSubstitutePoolRepository, DieselVendorTicketRepository,
};
pub use diesel_workflow_store::DieselWorkflowStore;
pub use migrations::run_pending_migrations;
pub use pool::{DbPool, PoolConfig, PoolError};
