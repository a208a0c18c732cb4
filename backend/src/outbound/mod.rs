//! Outbound adapters implementing the domain's driven ports.
//!
//! - **memory**: in-process storage with all-or-nothing commits, used by
//!   tests, scenarios and local runs.
//! - **persistence**: PostgreSQL-backed repositories and workflow store
//!   using Diesel.
//! - **vendor**: a local stand-in for the vendor ticketing system.
//!
//! Adapters translate between domain types and their infrastructure
//! representation. They contain no workflow rules.

pub mod memory;
pub mod persistence;
pub mod vendor;
