//! Embedded schema migrations.

use diesel::{Connection, PgConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

use crate::domain::ports::StoreError;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Apply every pending migration and return how many ran.
///
/// Uses a blocking connection; async callers should run it on a blocking
/// thread.
pub fn run_pending_migrations(database_url: &str) -> Result<usize, StoreError> {
    let mut conn = PgConnection::establish(database_url)
        .map_err(|error| StoreError::connection(error.to_string()))?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|error| StoreError::query(format!("migration: {error}")))?;
    for version in &applied {
        info!(%version, "migration applied");
    }
    Ok(applied.len())
}
