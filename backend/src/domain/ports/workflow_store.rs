//! Port for committing a unit of work atomically.

use async_trait::async_trait;

use super::StoreError;
use crate::domain::UnitOfWork;

/// Applies every write of a [`UnitOfWork`] or none of them.
///
/// Writes are applied in order, each guarded update checking the state left
/// by the writes before it. The first failed guard aborts the unit with
/// [`StoreError::StaleWrite`]; a duplicate key aborts it with
/// [`StoreError::Duplicate`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Commit the unit.
    async fn commit(&self, unit: &UnitOfWork) -> Result<(), StoreError>;
}
