//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Each aggregate
//! table keeps the columns queries filter on next to a `document` JSONB
//! column holding the full serialised aggregate.
//!
//! # Maintenance
//!
//! When migrations change the schema, update this file to match. The
//! `diesel print-schema` command can generate these definitions from a live
//! database.

diesel::table! {
    /// Server units known to the plant.
    servers (id) {
        /// Primary key.
        id -> Uuid,
        /// Chassis serial.
        serial_number -> Varchar,
        /// Production status in canonical text form.
        status -> Varchar,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Plant users referenced as actors.
    users (id) {
        /// Primary key.
        id -> Uuid,
        /// Name shown in history and lists.
        display_name -> Varchar,
    }
}

diesel::table! {
    /// Defect records.
    defect_records (id) {
        /// Primary key.
        id -> Uuid,
        /// Affected server.
        server_id -> Uuid,
        /// Part category.
        category -> Varchar,
        /// Priority.
        priority -> Varchar,
        /// Workflow status; authoritative over the document.
        status -> Varchar,
        /// Write counter guarding concurrent updates.
        revision -> Int8,
        /// Detection time.
        detected_at -> Timestamptz,
        /// Full record.
        document -> Jsonb,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Serialised inventory components.
    inventory_components (id) {
        /// Primary key.
        id -> Uuid,
        /// Primary serial as entered.
        serial_number -> Varchar,
        /// Lower-cased primary serial.
        serial_key -> Varchar,
        /// Lower-cased vendor serial.
        vendor_serial_key -> Nullable<Varchar>,
        /// Part category.
        category -> Varchar,
        /// Ledger status; authoritative over the document.
        status -> Varchar,
        /// Warranty expiry.
        warranty_expires -> Nullable<Date>,
        /// Intake time.
        created_at -> Timestamptz,
        /// Full component.
        document -> Jsonb,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Parts installed in servers.
    server_components (id) {
        /// Primary key.
        id -> Uuid,
        /// Host server.
        server_id -> Uuid,
        /// Part category.
        category -> Varchar,
        /// Linked ledger component.
        inventory_id -> Nullable<Uuid>,
        /// Installation time.
        installed_at -> Timestamptz,
        /// Full installation record.
        document -> Jsonb,
    }
}

diesel::table! {
    /// Local mirror of vendor repair tickets.
    vendor_tickets (id) {
        /// Primary key.
        id -> Uuid,
        /// Vendor ticket number; unique.
        ticket_number -> Varchar,
        /// Owning defect.
        defect_id -> Uuid,
        /// Ticket status.
        status -> Varchar,
        /// Shipping time.
        sent_at -> Timestamptz,
        /// Full ticket.
        document -> Jsonb,
    }
}

diesel::table! {
    /// Spare servers available for loan.
    substitute_pool (id) {
        /// Primary key.
        id -> Uuid,
        /// The spare server.
        server_id -> Uuid,
        /// Chassis serial of the spare.
        serial_number -> Varchar,
        /// Pool status.
        status -> Varchar,
        /// Defect the spare is issued against.
        current_defect_id -> Nullable<Uuid>,
        /// Completed loans.
        usage_count -> Int4,
        /// Full pool entry.
        document -> Jsonb,
    }
}

diesel::table! {
    /// Append-only history log.
    history_entries (id) {
        /// Surrogate key.
        id -> Int8,
        /// Kind of entity.
        entity_type -> Varchar,
        /// Entity identifier.
        entity_id -> Uuid,
        /// Action performed.
        action -> Varchar,
        /// Acting user.
        actor -> Uuid,
        /// Operator-facing note.
        note -> Nullable<Text>,
        /// Structured context.
        metadata -> Jsonb,
        /// When it happened.
        recorded_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    servers,
    users,
    defect_records,
    inventory_components,
    server_components,
    vendor_tickets,
    substitute_pool,
    history_entries,
);
