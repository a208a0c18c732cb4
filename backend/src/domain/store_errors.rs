//! Translation of storage failures into domain errors, and the commit step
//! every workflow service ends with.

use serde_json::json;

use crate::domain::ports::{StoreError, WorkflowStore, entity};
use crate::domain::{Error, HistoryDispatcher, UnitOfWork};

/// Commit `unit` atomically, then queue its history for delivery.
///
/// History is only dispatched once the writes are durable.
pub(crate) async fn commit_unit(
    store: &dyn WorkflowStore,
    history: &HistoryDispatcher,
    unit: UnitOfWork,
) -> Result<(), Error> {
    if !unit.is_empty() {
        store.commit(&unit).await.map_err(map_store_error)?;
    }
    history.dispatch(unit.into_history());
    Ok(())
}

/// Map a store failure raised by a read or a commit.
///
/// A lost compare-and-set on a defect record means another operation moved
/// the workflow first, so it surfaces as `IllegalTransition`; on any other
/// entity the resource is no longer in the required state.
pub(crate) fn map_store_error(error: StoreError) -> Error {
    match error {
        StoreError::Connection { message } => {
            Error::service_unavailable(format!("workflow store unavailable: {message}"))
        }
        StoreError::Query { message } => {
            Error::internal(format!("workflow store error: {message}"))
        }
        StoreError::StaleWrite { entity, id } => stale_write(&entity, &id),
        StoreError::Duplicate { entity, key } => {
            Error::conflict(format!("{entity} with {key} already exists")).with_details(json!({
                "entity": entity,
                "key": key,
                "code": "duplicate",
            }))
        }
        StoreError::Missing { entity, id } => {
            Error::internal(format!("{entity} {id} disappeared during commit"))
        }
    }
}

fn stale_write(entity_label: &str, id: &str) -> Error {
    let details = json!({
        "entity": entity_label,
        "id": id,
        "code": "stale_write",
    });
    if entity_label == entity::DEFECT {
        Error::illegal_transition(format!("defect {id} was changed by another operation"))
            .with_details(details)
    } else {
        Error::invalid_state(format!(
            "{entity_label} {id} is no longer in the expected state"
        ))
        .with_details(details)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    use super::*;
    use crate::domain::ErrorCode;

    #[rstest]
    #[case(StoreError::connection("refused"), ErrorCode::ServiceUnavailable)]
    #[case(StoreError::query("syntax"), ErrorCode::InternalError)]
    #[case(StoreError::stale_write(entity::DEFECT, "d-1"), ErrorCode::IllegalTransition)]
    #[case(StoreError::stale_write(entity::COMPONENT, "c-1"), ErrorCode::InvalidState)]
    #[case(StoreError::stale_write(entity::SUBSTITUTE, "s-1"), ErrorCode::InvalidState)]
    #[case(StoreError::duplicate(entity::COMPONENT, "serial SN-1"), ErrorCode::Conflict)]
    #[case(StoreError::missing(entity::SERVER, "srv-1"), ErrorCode::InternalError)]
    fn store_errors_map_to_stable_codes(#[case] error: StoreError, #[case] expected: ErrorCode) {
        assert_eq!(map_store_error(error).code(), expected);
    }

    #[test]
    fn stale_write_details_name_the_entity() {
        let error = map_store_error(StoreError::stale_write(entity::COMPONENT, "c-9"));
        let details = error.details().expect("details present");
        assert_eq!(details["entity"], "component");
        assert_eq!(details["id"], "c-9");
    }
}
