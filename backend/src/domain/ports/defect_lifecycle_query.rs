//! Driving port for defect reads.

use async_trait::async_trait;

use crate::domain::defects::{
    DefectFilter, DefectPage, DefectRecord, DefectStats, DefectStatsFilter, Transition,
};
use crate::domain::vendor_ticket::VendorTicket;
use crate::domain::{DefectId, Error};

/// Driving port for defect reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DefectLifecycleQuery: Send + Sync {
    /// Load one record.
    async fn get(&self, defect_id: DefectId) -> Result<DefectRecord, Error>;

    /// One page of records matching the filter.
    async fn list(&self, filter: DefectFilter) -> Result<DefectPage, Error>;

    /// Aggregate counts and repair times.
    async fn stats(&self, filter: DefectStatsFilter) -> Result<DefectStats, Error>;

    /// Actions an operator may take on the record now.
    async fn available_actions(&self, defect_id: DefectId) -> Result<Vec<Transition>, Error>;

    /// Vendor tickets raised for the record, oldest first.
    async fn vendor_tickets(&self, defect_id: DefectId) -> Result<Vec<VendorTicket>, Error>;
}
