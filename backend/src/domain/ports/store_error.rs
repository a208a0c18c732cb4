//! Error shared by every port backed by the workflow store.

use super::define_port_error;

define_port_error! {
    /// Errors raised by workflow store adapters.
    pub enum StoreError {
        /// The store could not be reached.
        Connection { message: String } [transient] =>
            "workflow store connection failed: {message}",
        /// A query or mutation failed during execution.
        Query { message: String } =>
            "workflow store query failed: {message}",
        /// A guarded write found the entity in a different state than expected.
        StaleWrite { entity: String, id: String } =>
            "{entity} {id} was modified concurrently",
        /// An insert collided with a unique key.
        Duplicate { entity: String, key: String } =>
            "{entity} with {key} already exists",
        /// An update targeted an entity that does not exist.
        Missing { entity: String, id: String } =>
            "{entity} {id} does not exist",
    }
}

/// Entity labels used in [`StoreError`] payloads.
pub mod entity {
    /// Defect records.
    pub const DEFECT: &str = "defect";
    /// Inventory components.
    pub const COMPONENT: &str = "component";
    /// Installed server components.
    pub const SERVER_COMPONENT: &str = "server component";
    /// Servers.
    pub const SERVER: &str = "server";
    /// Vendor tickets.
    pub const TICKET: &str = "vendor ticket";
    /// Substitute pool entries.
    pub const SUBSTITUTE: &str = "substitute";
}
