//! Diesel and pool error mapping onto [`StoreError`].

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;
use crate::domain::ports::StoreError;

/// Map pool failures to a transient connection error.
pub(crate) fn map_pool_error(error: PoolError) -> StoreError {
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    StoreError::connection(message)
}

/// Map Diesel failures, labelling unique violations with `entity`.
pub(crate) fn map_diesel_error(error: DieselError, entity: &str) -> StoreError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), entity, "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            entity,
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => StoreError::query("record not found"),
        DieselError::QueryBuilderError(_) => StoreError::query("database query error"),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            let key = info
                .constraint_name()
                .unwrap_or("unique key")
                .to_owned();
            StoreError::duplicate(entity, key)
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            StoreError::connection("database connection error")
        }
        DieselError::DatabaseError(
            DatabaseErrorKind::SerializationFailure | DatabaseErrorKind::ReadOnlyTransaction,
            _,
        ) => StoreError::connection("transaction aborted by the database"),
        _ => StoreError::query("database error"),
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for error mapping.

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn pool_checkout_failure_is_transient() {
        let error = map_pool_error(PoolError::checkout("connection refused"));

        assert!(error.is_transient());
        assert!(error.to_string().contains("connection refused"));
    }

    #[rstest]
    #[case(DieselError::NotFound)]
    #[case(DieselError::RollbackTransaction)]
    fn other_failures_are_query_errors(#[case] error: DieselError) {
        let mapped = map_diesel_error(error, "defect");

        assert!(matches!(mapped, StoreError::Query { .. }));
    }
}
