//! Ports for the server registry and user directory collaborators.

use async_trait::async_trait;

use super::StoreError;
use crate::domain::servers::{ServerSummary, UserSummary};
use crate::domain::{ServerId, UserId};

/// Lookup of server units. Status changes are committed through the
/// workflow store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServerRegistry: Send + Sync {
    /// Find a server by id.
    async fn find_server(&self, id: ServerId) -> Result<Option<ServerSummary>, StoreError>;
}

/// Lookup of plant users.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by id.
    async fn find_user(&self, id: UserId) -> Result<Option<UserSummary>, StoreError>;
}
