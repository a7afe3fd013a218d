//! Diesel and pool error mapping for the boundary repository.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::BoundaryRepositoryError;

use super::pool::PoolError;

/// Partial unique index holding at most one selected row per city.
pub(super) const ONE_SELECTED_INDEX: &str = "boundaries_one_selected_per_city";

/// Map pool errors into connection errors.
pub(super) fn map_pool_error(error: PoolError) -> BoundaryRepositoryError {
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    BoundaryRepositoryError::connection(message)
}

/// Map Diesel errors into repository errors, logging driver detail at debug.
///
/// A unique violation on [`ONE_SELECTED_INDEX`] means a concurrent writer
/// slipped past the advisory lock; it is reported as an invariant violation.
pub(super) fn map_diesel_error(error: DieselError) -> BoundaryRepositoryError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(
                ?kind,
                message = info.message(),
                constraint = info.constraint_name(),
                "diesel operation failed"
            );
        }
        _ => debug!(%error, "diesel operation failed"),
    }

    match error {
        DieselError::NotFound => BoundaryRepositoryError::not_found("record not found"),
        DieselError::QueryBuilderError(_) => {
            BoundaryRepositoryError::query("database query error")
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            BoundaryRepositoryError::connection("database connection error")
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)
            if info.constraint_name() == Some(ONE_SELECTED_INDEX)
                || info.message().contains(ONE_SELECTED_INDEX) =>
        {
            BoundaryRepositoryError::invariant_violation(
                "another boundary is already selected for this city",
            )
        }
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
            BoundaryRepositoryError::query("concurrent update conflict")
        }
        _ => BoundaryRepositoryError::query("database error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn database_error(kind: DatabaseErrorKind, message: &str) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(message.to_owned()))
    }

    #[rstest]
    fn pool_errors_become_connection_errors() {
        let error = map_pool_error(PoolError::checkout("timed out"));
        assert_eq!(error, BoundaryRepositoryError::connection("timed out"));
    }

    #[rstest]
    #[case(DieselError::NotFound, "NotFound")]
    #[case(database_error(DatabaseErrorKind::ClosedConnection, "gone"), "Connection")]
    #[case(
        database_error(
            DatabaseErrorKind::UniqueViolation,
            "duplicate key value violates unique constraint \"boundaries_one_selected_per_city\""
        ),
        "InvariantViolation"
    )]
    #[case(
        database_error(
            DatabaseErrorKind::UniqueViolation,
            "duplicate key value violates unique constraint \"boundaries_candidate_key\""
        ),
        "Query"
    )]
    #[case(database_error(DatabaseErrorKind::CheckViolation, "immutable"), "Query")]
    fn diesel_errors_map_to_repository_errors(#[case] error: DieselError, #[case] expected: &str) {
        let mapped = map_diesel_error(error);
        let actual = match mapped {
            BoundaryRepositoryError::Connection { .. } => "Connection",
            BoundaryRepositoryError::Query { .. } => "Query",
            BoundaryRepositoryError::NotFound { .. } => "NotFound",
            BoundaryRepositoryError::InvariantViolation { .. } => "InvariantViolation",
        };
        assert_eq!(actual, expected);
    }
}
