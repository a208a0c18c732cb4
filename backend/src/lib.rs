//! Hardware defect and repair lifecycle engine.
//!
//! - [`domain`]: aggregates, the defect state machine, the inventory ledger
//!   and the lifecycle orchestrator, plus the ports they depend on.
//! - [`outbound`]: in-memory, PostgreSQL and local vendor adapters.
//! - [`config`]: `DEFECTS_*` settings and their domain conversions.

pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
