//! Guarded application of one write to the staged state.

use super::State;
use crate::domain::EntityWrite;
use crate::domain::ports::{StoreError, entity};

pub(super) fn apply(state: &mut State, write: &EntityWrite) -> Result<(), StoreError> {
    match write {
        EntityWrite::InsertDefect(record) => {
            if state.defects.contains_key(&record.id) {
                return Err(StoreError::duplicate(entity::DEFECT, record.id.to_string()));
            }
            state.defects.insert(record.id, record.clone());
        }
        EntityWrite::UpdateDefect { record, expected } => {
            let current = state
                .defects
                .get(&record.id)
                .ok_or_else(|| StoreError::missing(entity::DEFECT, record.id.to_string()))?;
            if current.status() != expected.status || current.revision() != expected.revision {
                return Err(StoreError::stale_write(entity::DEFECT, record.id.to_string()));
            }
            state.defects.insert(record.id, record.clone());
        }
        EntityWrite::InsertComponent(component) => {
            let serials = [
                Some(component.serial_number.as_str()),
                component.vendor_serial.as_deref(),
            ];
            for serial in serials.into_iter().flatten() {
                if state
                    .components
                    .values()
                    .any(|existing| existing.has_serial(serial))
                {
                    return Err(StoreError::duplicate(
                        entity::COMPONENT,
                        format!("serial {serial}"),
                    ));
                }
            }
            state.components.insert(component.id, component.clone());
        }
        EntityWrite::UpdateComponent {
            component,
            expected,
        } => {
            let current = state.components.get(&component.id).ok_or_else(|| {
                StoreError::missing(entity::COMPONENT, component.id.to_string())
            })?;
            if current.status() != *expected {
                return Err(StoreError::stale_write(
                    entity::COMPONENT,
                    component.id.to_string(),
                ));
            }
            state.components.insert(component.id, component.clone());
        }
        EntityWrite::InsertServerComponent(part) => {
            if state.server_components.contains_key(&part.id) {
                return Err(StoreError::duplicate(
                    entity::SERVER_COMPONENT,
                    part.id.to_string(),
                ));
            }
            state.server_components.insert(part.id, part.clone());
        }
        EntityWrite::SetServerStatus { server_id, status } => {
            let server = state
                .servers
                .get_mut(server_id)
                .ok_or_else(|| StoreError::missing(entity::SERVER, server_id.to_string()))?;
            server.status = *status;
        }
        EntityWrite::InsertTicket(ticket) => {
            if state
                .tickets
                .values()
                .any(|existing| existing.ticket_number == ticket.ticket_number)
            {
                return Err(StoreError::duplicate(
                    entity::TICKET,
                    format!("number {}", ticket.ticket_number),
                ));
            }
            state.tickets.insert(ticket.id, ticket.clone());
        }
        EntityWrite::UpdateTicket { ticket, expected } => {
            let current = state
                .tickets
                .get(&ticket.id)
                .ok_or_else(|| StoreError::missing(entity::TICKET, ticket.id.to_string()))?;
            if current.status != *expected {
                return Err(StoreError::stale_write(entity::TICKET, ticket.id.to_string()));
            }
            state.tickets.insert(ticket.id, ticket.clone());
        }
        EntityWrite::UpdateSubstitute { entry, expected } => {
            let current = state
                .substitutes
                .get(&entry.id)
                .ok_or_else(|| StoreError::missing(entity::SUBSTITUTE, entry.id.to_string()))?;
            if current.status != *expected {
                return Err(StoreError::stale_write(
                    entity::SUBSTITUTE,
                    entry.id.to_string(),
                ));
            }
            state.substitutes.insert(entry.id, entry.clone());
        }
    }
    Ok(())
}
