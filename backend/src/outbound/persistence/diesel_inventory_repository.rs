//! PostgreSQL-backed [`InventoryRepository`].

use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{ComponentRow, ServerComponentRow, serial_key};
use super::pool::DbPool;
use super::schema::{inventory_components, server_components};
use crate::domain::defects::{PartCategory, PartSerials};
use crate::domain::inventory::{
    ComponentFilter, ComponentPage, InventoryComponent, InventoryStats, InventoryStatus,
    ServerComponent, warranty_lapses_within,
};
use crate::domain::ports::{InventoryRepository, StoreError, entity};
use crate::domain::{ComponentId, ServerId};

fn decode_all(rows: Vec<ComponentRow>) -> Result<Vec<InventoryComponent>, StoreError> {
    rows.into_iter().map(ComponentRow::into_domain).collect()
}

/// Diesel-backed inventory reads.
#[derive(Clone)]
pub struct DieselInventoryRepository {
    pool: DbPool,
}

impl DieselInventoryRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_all(&self) -> Result<Vec<InventoryComponent>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<ComponentRow> = inventory_components::table
            .select(ComponentRow::as_select())
            .order_by(inventory_components::created_at.desc())
            .load(&mut conn)
            .await
            .map_err(|error| map_diesel_error(error, entity::COMPONENT))?;
        decode_all(rows)
    }
}

#[async_trait]
impl InventoryRepository for DieselInventoryRepository {
    async fn find_by_id(&self, id: ComponentId) -> Result<Option<InventoryComponent>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<ComponentRow> = inventory_components::table
            .find(*id.as_uuid())
            .select(ComponentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| map_diesel_error(error, entity::COMPONENT))?;
        row.map(ComponentRow::into_domain).transpose()
    }

    async fn find_by_serial(
        &self,
        serial: &str,
    ) -> Result<Option<InventoryComponent>, StoreError> {
        let key = serial_key(serial);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<ComponentRow> = inventory_components::table
            .filter(
                inventory_components::serial_key
                    .eq(&key)
                    .or(inventory_components::vendor_serial_key.eq(&key)),
            )
            .select(ComponentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| map_diesel_error(error, entity::COMPONENT))?;
        row.map(ComponentRow::into_domain).transpose()
    }

    async fn find_server_component(
        &self,
        server_id: ServerId,
        category: PartCategory,
        serials: &PartSerials,
    ) -> Result<Option<ServerComponent>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<ServerComponentRow> = server_components::table
            .filter(server_components::server_id.eq(*server_id.as_uuid()))
            .select(ServerComponentRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|error| map_diesel_error(error, entity::SERVER_COMPONENT))?;
        let mut best: Option<ServerComponent> = None;
        for row in rows {
            let part = row.into_domain()?;
            if !serials.iter().any(|serial| part.serials.matches(serial)) {
                continue;
            }
            let rank = (part.category == category, part.installed_at);
            let better = best
                .as_ref()
                .is_none_or(|current| rank > (current.category == category, current.installed_at));
            if better {
                best = Some(part);
            }
        }
        Ok(best)
    }

    async fn list(
        &self,
        filter: &ComponentFilter,
        today: NaiveDate,
    ) -> Result<ComponentPage, StoreError> {
        let mut matching: Vec<_> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|component| filter.matches(component, today))
            .collect();
        matching.sort_by_key(|component| Reverse(component.created_at));
        let total = matching.len();
        let limit = filter.effective_limit();
        let rows = matching
            .into_iter()
            .skip(filter.offset)
            .take(limit)
            .collect();
        Ok(ComponentPage {
            rows,
            total,
            limit,
            offset: filter.offset,
        })
    }

    async fn available_by_category(
        &self,
        category: PartCategory,
    ) -> Result<Vec<InventoryComponent>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<ComponentRow> = inventory_components::table
            .filter(inventory_components::category.eq(category.as_str()))
            .filter(inventory_components::status.eq(InventoryStatus::Available.as_str()))
            .select(ComponentRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|error| map_diesel_error(error, entity::COMPONENT))?;
        let mut available = decode_all(rows)?;
        available.sort_by_key(|component| {
            (component.condition.preference_rank(), component.created_at)
        });
        Ok(available)
    }

    async fn stats(
        &self,
        today: NaiveDate,
        horizon: NaiveDate,
    ) -> Result<InventoryStats, StoreError> {
        let components = self.load_all().await?;
        Ok(InventoryStats::collect(&components, today, horizon))
    }

    async fn warranty_expiring(
        &self,
        today: NaiveDate,
        horizon: NaiveDate,
    ) -> Result<Vec<InventoryComponent>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<ComponentRow> = inventory_components::table
            .filter(inventory_components::warranty_expires.le(horizon))
            .order_by(inventory_components::warranty_expires.asc())
            .select(ComponentRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|error| map_diesel_error(error, entity::COMPONENT))?;
        Ok(decode_all(rows)?
            .into_iter()
            .filter(|component| warranty_lapses_within(component, today, horizon))
            .collect())
    }
}
