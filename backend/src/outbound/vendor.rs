//! Local stand-in for the vendor ticketing system.
//!
//! [`LocalVendorGateway`] issues numbers shaped like the vendor's own
//! (`YT-<yyyymmdd>-<nnnn>`) and tracks each ticket's state so receipt and
//! closure can be checked. It backs the binary and demos when no vendor
//! integration is configured.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mockable::Clock;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::domain::ports::{VendorGateway, VendorGatewayError, VendorTicketSubmission};

const MAX_NUMBER_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalTicketState {
    Open,
    Received,
    Closed,
}

#[derive(Debug)]
struct Ledger {
    rng: SmallRng,
    tickets: HashMap<String, LocalTicketState>,
}

/// Vendor gateway that keeps its tickets in process.
#[derive(Clone)]
pub struct LocalVendorGateway {
    clock: Arc<dyn Clock>,
    ledger: Arc<Mutex<Ledger>>,
}

impl LocalVendorGateway {
    /// Gateway seeded from the operating system.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::from_rng(clock, SmallRng::from_entropy())
    }

    /// Gateway with a fixed seed, so issued numbers are reproducible.
    pub fn with_seed(clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self::from_rng(clock, SmallRng::seed_from_u64(seed))
    }

    fn from_rng(clock: Arc<dyn Clock>, rng: SmallRng) -> Self {
        Self {
            clock,
            ledger: Arc::new(Mutex::new(Ledger {
                rng,
                tickets: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>, VendorGatewayError> {
        self.ledger
            .lock()
            .map_err(|_| VendorGatewayError::unreachable("local ticket ledger poisoned"))
    }

    fn advance(&self, ticket_number: &str, to: LocalTicketState) -> Result<(), VendorGatewayError> {
        let mut ledger = self.lock()?;
        let Some(state) = ledger.tickets.get_mut(ticket_number) else {
            return Err(VendorGatewayError::rejected(format!(
                "unknown ticket {ticket_number}"
            )));
        };
        if *state == to {
            return Ok(());
        }
        if *state == LocalTicketState::Closed {
            return Err(VendorGatewayError::rejected(format!(
                "ticket {ticket_number} is {state:?}"
            )));
        }
        *state = to;
        Ok(())
    }
}

#[async_trait]
impl VendorGateway for LocalVendorGateway {
    async fn open_ticket(
        &self,
        submission: &VendorTicketSubmission,
    ) -> Result<String, VendorGatewayError> {
        let day = self.clock.utc().format("%Y%m%d").to_string();
        let mut ledger = self.lock()?;
        for _ in 0..MAX_NUMBER_ATTEMPTS {
            let serial: u16 = ledger.rng.gen_range(0..10_000);
            let number = format!("YT-{day}-{serial:04}");
            if !ledger.tickets.contains_key(&number) {
                ledger.tickets.insert(number.clone(), LocalTicketState::Open);
                debug!(ticket = %number, defect = %submission.defect_id, "local ticket opened");
                return Ok(number);
            }
        }
        Err(VendorGatewayError::rejected(format!(
            "no free ticket number left for {day}"
        )))
    }

    async fn mark_received(&self, ticket_number: &str) -> Result<(), VendorGatewayError> {
        self.advance(ticket_number, LocalTicketState::Received)
    }

    async fn close_ticket(&self, ticket_number: &str) -> Result<(), VendorGatewayError> {
        self.advance(ticket_number, LocalTicketState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::defects::{PartCategory, PartSerials};
    use crate::domain::vendor_ticket::TicketType;
    use crate::domain::{DefectId, ServerId};
    use crate::test_support::clock::MutableClock;
    use crate::test_support::fixtures::utc;

    #[fixture]
    fn gateway() -> LocalVendorGateway {
        LocalVendorGateway::with_seed(Arc::new(MutableClock::new(utc(2026, 3, 2, 8, 0))), 7)
    }

    fn submission() -> VendorTicketSubmission {
        VendorTicketSubmission {
            defect_id: DefectId::random(),
            server_id: ServerId::random(),
            ticket_type: TicketType::ComponentRepair,
            category: PartCategory::Ram,
            serials: PartSerials::new(Some("SN-1".to_owned()), None),
            subject: "DIMM failure".to_owned(),
            description: None,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn numbers_follow_the_vendor_pattern(gateway: LocalVendorGateway) {
        let number = gateway
            .open_ticket(&submission())
            .await
            .expect("ticket opens");

        assert!(number.starts_with("YT-20260302-"), "got {number}");
        assert_eq!(number.len(), "YT-20260302-0000".len());
    }

    #[rstest]
    #[tokio::test]
    async fn issued_numbers_are_distinct(gateway: LocalVendorGateway) {
        let first = gateway.open_ticket(&submission()).await.expect("first");
        let second = gateway.open_ticket(&submission()).await.expect("second");

        assert_ne!(first, second);
    }

    #[rstest]
    #[tokio::test]
    async fn receipt_then_closure_is_accepted(gateway: LocalVendorGateway) {
        let number = gateway.open_ticket(&submission()).await.expect("opens");

        gateway.mark_received(&number).await.expect("received");
        gateway.close_ticket(&number).await.expect("closed");
    }

    #[rstest]
    #[tokio::test]
    async fn closed_tickets_cannot_be_received(gateway: LocalVendorGateway) {
        let number = gateway.open_ticket(&submission()).await.expect("opens");
        gateway.close_ticket(&number).await.expect("closed");

        let error = gateway
            .mark_received(&number)
            .await
            .expect_err("closed ticket");

        assert!(!error.is_transient());
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_tickets_are_rejected(gateway: LocalVendorGateway) {
        let error = gateway
            .close_ticket("YT-20260101-0001")
            .await
            .expect_err("unknown ticket");

        assert!(matches!(error, VendorGatewayError::Rejected { .. }));
    }
}
