//! PostgreSQL-backed [`VendorTicketRepository`] and [`SubstitutePoolRepository`].

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{SubstituteRow, TicketRow};
use super::pool::DbPool;
use super::schema::{substitute_pool, vendor_tickets};
use crate::domain::ports::{
    StoreError, SubstitutePoolRepository, VendorTicketRepository, entity,
};
use crate::domain::substitute::{SubstitutePoolEntry, SubstituteStatus};
use crate::domain::vendor_ticket::{TicketStatus, VendorTicket};
use crate::domain::{DefectId, SubstituteId};

/// Diesel-backed vendor ticket reads.
#[derive(Clone)]
pub struct DieselVendorTicketRepository {
    pool: DbPool,
}

impl DieselVendorTicketRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VendorTicketRepository for DieselVendorTicketRepository {
    async fn find_open_for_defect(
        &self,
        defect_id: DefectId,
    ) -> Result<Option<VendorTicket>, StoreError> {
        let open: Vec<&str> = TicketStatus::ALL
            .iter()
            .filter(|status| status.is_open())
            .map(TicketStatus::as_str)
            .collect();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<TicketRow> = vendor_tickets::table
            .filter(vendor_tickets::defect_id.eq(*defect_id.as_uuid()))
            .filter(vendor_tickets::status.eq_any(open))
            .order_by(vendor_tickets::sent_at.desc())
            .select(TicketRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| map_diesel_error(error, entity::TICKET))?;
        row.map(TicketRow::into_domain).transpose()
    }

    async fn find_by_number(
        &self,
        ticket_number: &str,
    ) -> Result<Option<VendorTicket>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<TicketRow> = vendor_tickets::table
            .filter(vendor_tickets::ticket_number.eq(ticket_number.trim()))
            .select(TicketRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| map_diesel_error(error, entity::TICKET))?;
        row.map(TicketRow::into_domain).transpose()
    }

    async fn list_for_defect(&self, defect_id: DefectId) -> Result<Vec<VendorTicket>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<TicketRow> = vendor_tickets::table
            .filter(vendor_tickets::defect_id.eq(*defect_id.as_uuid()))
            .order_by(vendor_tickets::sent_at.asc())
            .select(TicketRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|error| map_diesel_error(error, entity::TICKET))?;
        rows.into_iter().map(TicketRow::into_domain).collect()
    }
}

/// Diesel-backed substitute pool reads.
#[derive(Clone)]
pub struct DieselSubstitutePoolRepository {
    pool: DbPool,
}

impl DieselSubstitutePoolRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubstitutePoolRepository for DieselSubstitutePoolRepository {
    async fn find_by_id(
        &self,
        id: SubstituteId,
    ) -> Result<Option<SubstitutePoolEntry>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<SubstituteRow> = substitute_pool::table
            .find(*id.as_uuid())
            .select(SubstituteRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| map_diesel_error(error, entity::SUBSTITUTE))?;
        row.map(SubstituteRow::into_domain).transpose()
    }

    async fn find_first_available(&self) -> Result<Option<SubstitutePoolEntry>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<SubstituteRow> = substitute_pool::table
            .filter(substitute_pool::status.eq(SubstituteStatus::Available.as_str()))
            .order_by((
                substitute_pool::usage_count.asc(),
                substitute_pool::serial_number.asc(),
            ))
            .select(SubstituteRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| map_diesel_error(error, entity::SUBSTITUTE))?;
        row.map(SubstituteRow::into_domain).transpose()
    }

    async fn find_issued_for_defect(
        &self,
        defect_id: DefectId,
    ) -> Result<Option<SubstitutePoolEntry>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<SubstituteRow> = substitute_pool::table
            .filter(substitute_pool::status.eq(SubstituteStatus::Issued.as_str()))
            .filter(substitute_pool::current_defect_id.eq(*defect_id.as_uuid()))
            .select(SubstituteRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| map_diesel_error(error, entity::SUBSTITUTE))?;
        row.map(SubstituteRow::into_domain).transpose()
    }
}
