//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Aggregates travel as a JSONB `document`;
//! the status and revision columns are authoritative and are written back
//! onto the decoded aggregate.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use super::schema::{
    defect_records, history_entries, inventory_components, server_components, servers,
    substitute_pool, users, vendor_tickets,
};
use crate::domain::ParseEnumError;
use crate::domain::defects::{DefectRecord, DefectStatus};
use crate::domain::history::HistoryEntry;
use crate::domain::inventory::{InventoryComponent, InventoryStatus, ServerComponent};
use crate::domain::ports::StoreError;
use crate::domain::servers::{ServerSummary, UserSummary};
use crate::domain::substitute::{SubstitutePoolEntry, SubstituteStatus};
use crate::domain::vendor_ticket::{TicketStatus, VendorTicket};

fn decode<T: DeserializeOwned>(document: Value, entity: &str) -> Result<T, StoreError> {
    serde_json::from_value(document)
        .map_err(|error| StoreError::query(format!("malformed {entity} document: {error}")))
}

fn encode<T: Serialize>(value: &T, entity: &str) -> Result<Value, StoreError> {
    serde_json::to_value(value)
        .map_err(|error| StoreError::query(format!("unencodable {entity}: {error}")))
}

fn parse<T>(raw: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = ParseEnumError>,
{
    raw.parse()
        .map_err(|error: ParseEnumError| StoreError::query(error.to_string()))
}

/// Lower-cased lookup key for a serial.
pub(crate) fn serial_key(serial: &str) -> String {
    serial.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Servers and users
// ---------------------------------------------------------------------------

/// Row struct for reading from the servers table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = servers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ServerRow {
    pub id: Uuid,
    pub serial_number: String,
    pub status: String,
}

impl ServerRow {
    pub(crate) fn into_domain(self) -> Result<ServerSummary, StoreError> {
        Ok(ServerSummary {
            id: self.id.into(),
            serial_number: self.serial_number,
            status: parse(&self.status)?,
        })
    }
}

/// Row struct for reading from the users table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub display_name: String,
}

impl From<UserRow> for UserSummary {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id.into(),
            display_name: row.display_name,
        }
    }
}

// ---------------------------------------------------------------------------
// Defect records
// ---------------------------------------------------------------------------

/// Row struct for reading from the defect_records table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = defect_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DefectRow {
    pub status: String,
    pub revision: i64,
    pub document: Value,
}

impl DefectRow {
    pub(crate) fn into_domain(self) -> Result<DefectRecord, StoreError> {
        let status: DefectStatus = parse(&self.status)?;
        let record: DefectRecord = decode(self.document, "defect")?;
        Ok(record.restored(status, self.revision))
    }
}

/// Insertable struct for new defect records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = defect_records)]
pub(crate) struct NewDefectRow {
    pub id: Uuid,
    pub server_id: Uuid,
    pub category: &'static str,
    pub priority: &'static str,
    pub status: &'static str,
    pub revision: i64,
    pub detected_at: DateTime<Utc>,
    pub document: Value,
    pub updated_at: DateTime<Utc>,
}

impl NewDefectRow {
    pub(crate) fn from_domain(record: &DefectRecord) -> Result<Self, StoreError> {
        Ok(Self {
            id: *record.id.as_uuid(),
            server_id: *record.server_id.as_uuid(),
            category: record.category.as_str(),
            priority: record.priority.as_str(),
            status: record.status().as_str(),
            revision: record.revision(),
            detected_at: record.detected_at,
            document: encode(record, "defect")?,
            updated_at: record.updated_at,
        })
    }
}

/// Changeset struct for guarded defect updates.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = defect_records)]
pub(crate) struct DefectUpdate {
    pub category: &'static str,
    pub priority: &'static str,
    pub status: &'static str,
    pub revision: i64,
    pub document: Value,
    pub updated_at: DateTime<Utc>,
}

impl DefectUpdate {
    pub(crate) fn from_domain(record: &DefectRecord) -> Result<Self, StoreError> {
        Ok(Self {
            category: record.category.as_str(),
            priority: record.priority.as_str(),
            status: record.status().as_str(),
            revision: record.revision(),
            document: encode(record, "defect")?,
            updated_at: record.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Row struct for reading from the inventory_components table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = inventory_components)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ComponentRow {
    pub status: String,
    pub document: Value,
}

impl ComponentRow {
    pub(crate) fn into_domain(self) -> Result<InventoryComponent, StoreError> {
        let status: InventoryStatus = parse(&self.status)?;
        let component: InventoryComponent = decode(self.document, "component")?;
        Ok(component.restored_with_status(status))
    }
}

/// Column values shared by component inserts and updates.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = inventory_components)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct ComponentValues {
    pub serial_number: String,
    pub serial_key: String,
    pub vendor_serial_key: Option<String>,
    pub category: &'static str,
    pub status: &'static str,
    pub warranty_expires: Option<NaiveDate>,
    pub document: Value,
    pub updated_at: DateTime<Utc>,
}

impl ComponentValues {
    pub(crate) fn from_domain(component: &InventoryComponent) -> Result<Self, StoreError> {
        Ok(Self {
            serial_number: component.serial_number.clone(),
            serial_key: serial_key(&component.serial_number),
            vendor_serial_key: component.vendor_serial.as_deref().map(serial_key),
            category: component.category.as_str(),
            status: component.status().as_str(),
            warranty_expires: component.warranty_expires,
            document: encode(component, "component")?,
            updated_at: component.updated_at,
        })
    }
}

/// Insertable struct for new components.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = inventory_components)]
pub(crate) struct NewComponentRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[diesel(embed)]
    pub values: ComponentValues,
}

impl NewComponentRow {
    pub(crate) fn from_domain(component: &InventoryComponent) -> Result<Self, StoreError> {
        Ok(Self {
            id: *component.id.as_uuid(),
            created_at: component.created_at,
            values: ComponentValues::from_domain(component)?,
        })
    }
}

/// Row struct for reading from the server_components table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = server_components)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ServerComponentRow {
    pub document: Value,
}

impl ServerComponentRow {
    pub(crate) fn into_domain(self) -> Result<ServerComponent, StoreError> {
        decode(self.document, "server component")
    }
}

/// Insertable struct for installed parts.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = server_components)]
pub(crate) struct NewServerComponentRow {
    pub id: Uuid,
    pub server_id: Uuid,
    pub category: &'static str,
    pub inventory_id: Option<Uuid>,
    pub installed_at: DateTime<Utc>,
    pub document: Value,
}

impl NewServerComponentRow {
    pub(crate) fn from_domain(part: &ServerComponent) -> Result<Self, StoreError> {
        Ok(Self {
            id: *part.id.as_uuid(),
            server_id: *part.server_id.as_uuid(),
            category: part.category.as_str(),
            inventory_id: part.inventory_id.map(Uuid::from),
            installed_at: part.installed_at,
            document: encode(part, "server component")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Vendor tickets
// ---------------------------------------------------------------------------

/// Row struct for reading from the vendor_tickets table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = vendor_tickets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TicketRow {
    pub status: String,
    pub document: Value,
}

impl TicketRow {
    pub(crate) fn into_domain(self) -> Result<VendorTicket, StoreError> {
        let status: TicketStatus = parse(&self.status)?;
        let mut ticket: VendorTicket = decode(self.document, "vendor ticket")?;
        ticket.status = status;
        Ok(ticket)
    }
}

/// Insertable struct for new tickets.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = vendor_tickets)]
pub(crate) struct NewTicketRow {
    pub id: Uuid,
    pub ticket_number: String,
    pub defect_id: Uuid,
    pub status: &'static str,
    pub sent_at: DateTime<Utc>,
    pub document: Value,
}

impl NewTicketRow {
    pub(crate) fn from_domain(ticket: &VendorTicket) -> Result<Self, StoreError> {
        Ok(Self {
            id: *ticket.id.as_uuid(),
            ticket_number: ticket.ticket_number.clone(),
            defect_id: *ticket.defect_id.as_uuid(),
            status: ticket.status.as_str(),
            sent_at: ticket.sent_at,
            document: encode(ticket, "vendor ticket")?,
        })
    }
}

/// Changeset struct for guarded ticket updates.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = vendor_tickets)]
pub(crate) struct TicketUpdate {
    pub status: &'static str,
    pub document: Value,
}

impl TicketUpdate {
    pub(crate) fn from_domain(ticket: &VendorTicket) -> Result<Self, StoreError> {
        Ok(Self {
            status: ticket.status.as_str(),
            document: encode(ticket, "vendor ticket")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Substitute pool
// ---------------------------------------------------------------------------

/// Row struct for reading from the substitute_pool table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = substitute_pool)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SubstituteRow {
    pub status: String,
    pub document: Value,
}

impl SubstituteRow {
    pub(crate) fn into_domain(self) -> Result<SubstitutePoolEntry, StoreError> {
        let status: SubstituteStatus = parse(&self.status)?;
        let mut entry: SubstitutePoolEntry = decode(self.document, "substitute")?;
        entry.status = status;
        Ok(entry)
    }
}

/// Changeset struct for guarded pool updates.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = substitute_pool)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct SubstituteUpdate {
    pub status: &'static str,
    pub current_defect_id: Option<Uuid>,
    pub usage_count: i32,
    pub document: Value,
}

impl SubstituteUpdate {
    pub(crate) fn from_domain(entry: &SubstitutePoolEntry) -> Result<Self, StoreError> {
        let usage_count = i32::try_from(entry.usage_count)
            .map_err(|_| StoreError::query("substitute usage count overflow"))?;
        Ok(Self {
            status: entry.status.as_str(),
            current_defect_id: entry.current_defect_id.map(Uuid::from),
            usage_count,
            document: encode(entry, "substitute")?,
        })
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Insertable struct for history entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = history_entries)]
pub(crate) struct NewHistoryRow {
    pub entity_type: &'static str,
    pub entity_id: Uuid,
    pub action: &'static str,
    pub actor: Uuid,
    pub note: Option<String>,
    pub metadata: Value,
    pub recorded_at: DateTime<Utc>,
}

impl NewHistoryRow {
    pub(crate) fn from_domain(entry: &HistoryEntry) -> Result<Self, StoreError> {
        Ok(Self {
            entity_type: entry.entity_type.as_str(),
            entity_id: entry.entity_id,
            action: entry.action.as_str(),
            actor: *entry.actor.as_uuid(),
            note: entry.note.clone(),
            metadata: encode(&entry.metadata, "history metadata")?,
            recorded_at: entry.recorded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for row conversion.

    use rstest::rstest;

    use super::*;
    use crate::domain::defects::PartCategory;
    use crate::domain::inventory::ComponentCondition;
    use crate::test_support::fixtures::{past_defect, spare, utc};

    #[rstest]
    fn status_column_overrides_the_document() {
        let record = past_defect(
            uuid::Uuid::new_v4().into(),
            PartCategory::Fan,
            utc(2026, 3, 2, 9, 0),
            DefectStatus::Diagnosing,
        );
        let stored = NewDefectRow::from_domain(&record).expect("encode");
        let row = DefectRow {
            status: "REPAIRING".to_owned(),
            revision: 9,
            document: stored.document,
        };

        let restored = row.into_domain().expect("decode");

        assert_eq!(restored.status(), DefectStatus::Repairing);
        assert_eq!(restored.revision(), 9);
        assert_eq!(restored.id, record.id);
    }

    #[rstest]
    fn legacy_status_spellings_are_accepted() {
        let component = spare(
            "SN-1",
            PartCategory::Nic,
            ComponentCondition::Used,
            utc(2026, 1, 1, 0, 0),
        );
        let values = ComponentValues::from_domain(&component).expect("encode");
        let row = ComponentRow {
            status: "in_repair".to_owned(),
            document: values.document,
        };

        let restored = row.into_domain().expect("decode");

        assert_eq!(restored.status(), InventoryStatus::InRepair);
    }

    #[rstest]
    fn unknown_status_is_a_query_error() {
        let row = TicketRow {
            status: "LOST".to_owned(),
            document: Value::Null,
        };

        let error = row.into_domain().expect_err("bad status");

        assert!(matches!(error, StoreError::Query { .. }));
    }

    #[rstest]
    fn serial_keys_fold_case_and_whitespace() {
        assert_eq!(serial_key("  AbC-9 "), "abc-9");
    }
}
