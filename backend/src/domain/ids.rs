//! Strongly typed identifiers for the repair workflow entities.
//!
//! Every identifier wraps a UUID so adapters can persist them natively while
//! the domain keeps defect, component, and server ids from being mixed up.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Access the underlying UUID.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(raw.trim()).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_id! {
    /// Identifier of a defect record.
    DefectId
}

define_id! {
    /// Identifier of a server unit tracked by the plant.
    ServerId
}

define_id! {
    /// Identifier of a serialised inventory component.
    ComponentId
}

define_id! {
    /// Identifier of a component installation record inside a server.
    ServerComponentId
}

define_id! {
    /// Identifier of a vendor repair ticket.
    VendorTicketId
}

define_id! {
    /// Identifier of an entry in the substitute server pool.
    SubstituteId
}

define_id! {
    /// Identifier of a plant user (detector, diagnostician, technician).
    UserId
}
