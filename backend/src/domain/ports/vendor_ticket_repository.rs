//! Port for reading locally mirrored vendor tickets.

use async_trait::async_trait;

use super::StoreError;
use crate::domain::DefectId;
use crate::domain::vendor_ticket::VendorTicket;

/// Read access to vendor tickets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VendorTicketRepository: Send + Sync {
    /// The ticket for the defect that is not yet closed, if any.
    async fn find_open_for_defect(
        &self,
        defect_id: DefectId,
    ) -> Result<Option<VendorTicket>, StoreError>;

    /// Find a ticket by its vendor-facing number.
    async fn find_by_number(&self, ticket_number: &str)
    -> Result<Option<VendorTicket>, StoreError>;

    /// Every ticket raised for the defect, oldest first.
    async fn list_for_defect(&self, defect_id: DefectId) -> Result<Vec<VendorTicket>, StoreError>;
}
