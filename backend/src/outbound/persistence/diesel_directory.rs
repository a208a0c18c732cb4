//! PostgreSQL-backed server registry and user directory.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{ServerRow, UserRow};
use super::pool::DbPool;
use super::schema::{servers, users};
use crate::domain::ports::{ServerRegistry, StoreError, UserDirectory, entity};
use crate::domain::servers::{ServerSummary, UserSummary};
use crate::domain::{ServerId, UserId};

/// Diesel-backed server and user lookups.
#[derive(Clone)]
pub struct DieselDirectory {
    pool: DbPool,
}

impl DieselDirectory {
    /// Create a new directory with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServerRegistry for DieselDirectory {
    async fn find_server(&self, id: ServerId) -> Result<Option<ServerSummary>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<ServerRow> = servers::table
            .find(*id.as_uuid())
            .select(ServerRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| map_diesel_error(error, entity::SERVER))?;
        row.map(ServerRow::into_domain).transpose()
    }
}

#[async_trait]
impl UserDirectory for DieselDirectory {
    async fn find_user(&self, id: UserId) -> Result<Option<UserSummary>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .find(*id.as_uuid())
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| map_diesel_error(error, "user"))?;
        Ok(row.map(UserSummary::from))
    }
}
