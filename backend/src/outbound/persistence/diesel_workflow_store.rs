//! PostgreSQL-backed [`WorkflowStore`].
//!
//! A unit of work runs inside one database transaction. Guarded updates are
//! conditional `UPDATE`s on the expected status (and revision, for defects);
//! when one touches no rows the whole transaction rolls back with
//! [`StoreError::StaleWrite`], or [`StoreError::Missing`] when the row is gone.

use async_trait::async_trait;
use diesel::dsl::{exists, select};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{
    ComponentValues, DefectUpdate, NewComponentRow, NewDefectRow, NewServerComponentRow,
    NewTicketRow, SubstituteUpdate, TicketUpdate, serial_key,
};
use super::pool::DbPool;
use super::schema::{
    defect_records, inventory_components, server_components, servers, substitute_pool,
    vendor_tickets,
};
use crate::domain::ports::{StoreError, WorkflowStore, entity};
use crate::domain::{EntityWrite, UnitOfWork};

/// Failure inside the commit transaction.
#[derive(Debug)]
enum CommitError {
    Store(StoreError),
    Database(diesel::result::Error),
}

impl From<diesel::result::Error> for CommitError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Database(error)
    }
}

impl From<StoreError> for CommitError {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

impl CommitError {
    fn into_store(self) -> StoreError {
        match self {
            Self::Store(error) => error,
            Self::Database(error) => map_diesel_error(error, "unit of work"),
        }
    }
}

fn labelled(entity: &'static str) -> impl Fn(diesel::result::Error) -> CommitError {
    move |error| CommitError::Store(map_diesel_error(error, entity))
}

/// Diesel-backed atomic commit of planned writes.
#[derive(Clone)]
pub struct DieselWorkflowStore {
    pool: DbPool,
}

impl DieselWorkflowStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for DieselWorkflowStore {
    async fn commit(&self, unit: &UnitOfWork) -> Result<(), StoreError> {
        let writes = unit.writes();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                for write in writes {
                    apply(conn, write).await?;
                }
                Ok::<_, CommitError>(())
            }
            .scope_boxed()
        })
        .await
        .map_err(CommitError::into_store)?;
        debug!(writes = writes.len(), "unit of work committed");
        Ok(())
    }
}

fn stale_or_missing(found: bool, entity: &str, id: Uuid) -> CommitError {
    if found {
        CommitError::Store(StoreError::stale_write(entity, id.to_string()))
    } else {
        CommitError::Store(StoreError::missing(entity, id.to_string()))
    }
}

async fn apply(conn: &mut AsyncPgConnection, write: &EntityWrite) -> Result<(), CommitError> {
    match write {
        EntityWrite::InsertDefect(record) => {
            diesel::insert_into(defect_records::table)
                .values(NewDefectRow::from_domain(record)?)
                .execute(conn)
                .await
                .map_err(labelled(entity::DEFECT))?;
        }
        EntityWrite::UpdateDefect { record, expected } => {
            let id = *record.id.as_uuid();
            let updated = diesel::update(defect_records::table.find(id))
                .filter(defect_records::status.eq(expected.status.as_str()))
                .filter(defect_records::revision.eq(expected.revision))
                .set(DefectUpdate::from_domain(record)?)
                .execute(conn)
                .await
                .map_err(labelled(entity::DEFECT))?;
            if updated == 0 {
                let found = select(exists(defect_records::table.find(id)))
                    .get_result::<bool>(conn)
                    .await?;
                return Err(stale_or_missing(found, entity::DEFECT, id));
            }
        }
        EntityWrite::InsertComponent(component) => {
            let mut keys = vec![serial_key(&component.serial_number)];
            keys.extend(component.vendor_serial.as_deref().map(serial_key));
            let taken: i64 = inventory_components::table
                .filter(
                    inventory_components::serial_key
                        .eq_any(&keys)
                        .or(inventory_components::vendor_serial_key.eq_any(&keys)),
                )
                .count()
                .get_result(conn)
                .await?;
            if taken > 0 {
                return Err(CommitError::Store(StoreError::duplicate(
                    entity::COMPONENT,
                    format!("serial {}", component.serial_number),
                )));
            }
            diesel::insert_into(inventory_components::table)
                .values(NewComponentRow::from_domain(component)?)
                .execute(conn)
                .await
                .map_err(labelled(entity::COMPONENT))?;
        }
        EntityWrite::UpdateComponent {
            component,
            expected,
        } => {
            let id = *component.id.as_uuid();
            let updated = diesel::update(inventory_components::table.find(id))
                .filter(inventory_components::status.eq(expected.as_str()))
                .set(ComponentValues::from_domain(component)?)
                .execute(conn)
                .await
                .map_err(labelled(entity::COMPONENT))?;
            if updated == 0 {
                let found = select(exists(inventory_components::table.find(id)))
                    .get_result::<bool>(conn)
                    .await?;
                return Err(stale_or_missing(found, entity::COMPONENT, id));
            }
        }
        EntityWrite::InsertServerComponent(part) => {
            diesel::insert_into(server_components::table)
                .values(NewServerComponentRow::from_domain(part)?)
                .execute(conn)
                .await
                .map_err(labelled(entity::SERVER_COMPONENT))?;
        }
        EntityWrite::SetServerStatus { server_id, status } => {
            let id = *server_id.as_uuid();
            let updated = diesel::update(servers::table.find(id))
                .set((
                    servers::status.eq(status.as_str()),
                    servers::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)
                .await
                .map_err(labelled(entity::SERVER))?;
            if updated == 0 {
                return Err(stale_or_missing(false, entity::SERVER, id));
            }
        }
        EntityWrite::InsertTicket(ticket) => {
            diesel::insert_into(vendor_tickets::table)
                .values(NewTicketRow::from_domain(ticket)?)
                .execute(conn)
                .await
                .map_err(labelled(entity::TICKET))?;
        }
        EntityWrite::UpdateTicket { ticket, expected } => {
            let id = *ticket.id.as_uuid();
            let updated = diesel::update(vendor_tickets::table.find(id))
                .filter(vendor_tickets::status.eq(expected.as_str()))
                .set(TicketUpdate::from_domain(ticket)?)
                .execute(conn)
                .await
                .map_err(labelled(entity::TICKET))?;
            if updated == 0 {
                let found = select(exists(vendor_tickets::table.find(id)))
                    .get_result::<bool>(conn)
                    .await?;
                return Err(stale_or_missing(found, entity::TICKET, id));
            }
        }
        EntityWrite::UpdateSubstitute { entry, expected } => {
            let id = *entry.id.as_uuid();
            let updated = diesel::update(substitute_pool::table.find(id))
                .filter(substitute_pool::status.eq(expected.as_str()))
                .set(SubstituteUpdate::from_domain(entry)?)
                .execute(conn)
                .await
                .map_err(labelled(entity::SUBSTITUTE))?;
            if updated == 0 {
                let found = select(exists(substitute_pool::table.find(id)))
                    .get_result::<bool>(conn)
                    .await?;
                return Err(stale_or_missing(found, entity::SUBSTITUTE, id));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    //! Regression coverage for commit error translation.

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn zero_row_update_on_a_live_row_is_stale() {
        let id = Uuid::new_v4();

        let error = stale_or_missing(true, entity::DEFECT, id).into_store();

        assert_eq!(error, StoreError::stale_write(entity::DEFECT, id.to_string()));
    }

    #[rstest]
    fn zero_row_update_on_a_gone_row_is_missing() {
        let id = Uuid::new_v4();

        let error = stale_or_missing(false, entity::TICKET, id).into_store();

        assert_eq!(error, StoreError::missing(entity::TICKET, id.to_string()));
    }

    #[rstest]
    fn database_failures_surface_as_query_errors() {
        let error = CommitError::from(diesel::result::Error::RollbackTransaction).into_store();

        assert!(matches!(error, StoreError::Query { .. }));
    }
}
