//! Port for the external vendor's ticketing system.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::defects::{PartCategory, PartSerials};
use crate::domain::vendor_ticket::TicketType;
use crate::domain::{DefectId, ServerId};

define_port_error! {
    /// Errors raised by vendor gateway adapters.
    pub enum VendorGatewayError {
        /// The vendor system could not be reached.
        Unreachable { message: String } [transient] =>
            "vendor system unreachable: {message}",
        /// The vendor refused the request.
        Rejected { message: String } =>
            "vendor system rejected request: {message}",
    }
}

/// What is sent to the vendor when a ticket is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorTicketSubmission {
    /// Defect the engagement belongs to.
    pub defect_id: DefectId,
    /// Affected server.
    pub server_id: ServerId,
    /// Requested work.
    pub ticket_type: TicketType,
    /// Category of the part.
    pub category: PartCategory,
    /// Serials of the part.
    pub serials: PartSerials,
    /// Subject line.
    pub subject: String,
    /// Description.
    pub description: Option<String>,
}

/// Out-of-band ticketing with the repair vendor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VendorGateway: Send + Sync {
    /// Open a ticket and return the vendor's number for it.
    async fn open_ticket(
        &self,
        submission: &VendorTicketSubmission,
    ) -> Result<String, VendorGatewayError>;

    /// Tell the vendor the part or unit came back.
    async fn mark_received(&self, ticket_number: &str) -> Result<(), VendorGatewayError>;

    /// Tell the vendor the engagement is over.
    async fn close_ticket(&self, ticket_number: &str) -> Result<(), VendorGatewayError>;
}

/// Gateway that numbers tickets from a counter and accepts every update.
#[derive(Debug, Default)]
pub struct FixtureVendorGateway {
    issued: AtomicU32,
}

#[async_trait]
impl VendorGateway for FixtureVendorGateway {
    async fn open_ticket(
        &self,
        _submission: &VendorTicketSubmission,
    ) -> Result<String, VendorGatewayError> {
        let next = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(format!("YT-FIXTURE-{next:04}"))
    }

    async fn mark_received(&self, _ticket_number: &str) -> Result<(), VendorGatewayError> {
        Ok(())
    }

    async fn close_ticket(&self, _ticket_number: &str) -> Result<(), VendorGatewayError> {
        Ok(())
    }
}
