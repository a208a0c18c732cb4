//! Port for reading the substitute server pool.

use async_trait::async_trait;

use super::StoreError;
use crate::domain::substitute::SubstitutePoolEntry;
use crate::domain::{DefectId, SubstituteId};

/// Read access to the substitute pool.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubstitutePoolRepository: Send + Sync {
    /// Find a pool entry by id.
    async fn find_by_id(&self, id: SubstituteId)
    -> Result<Option<SubstitutePoolEntry>, StoreError>;

    /// The available entry with the fewest loans, if any.
    async fn find_first_available(&self) -> Result<Option<SubstitutePoolEntry>, StoreError>;

    /// The entry currently issued against the defect, if any.
    async fn find_issued_for_defect(
        &self,
        defect_id: DefectId,
    ) -> Result<Option<SubstitutePoolEntry>, StoreError>;
}
