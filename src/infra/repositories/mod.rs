//! Repository layer - Data access abstraction
//!
//! Ports take an optional [`Tx`](super::Tx): `Some` joins that transaction,
//! `None` runs the statement in auto-commit mode.

pub(crate) mod entities;
mod matching_repository;
mod user_repository;

pub use matching_repository::{MatchingRepository, MatchingStore};
pub use user_repository::{UserRepository, UserStore};

use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, SqlErr};
use uuid::Uuid;

use super::Tx;
use crate::domain::MatchingStatus;
use crate::errors::{AppError, AppResult};

pub(crate) const DUPLICATE_MATCHING: &str = "matching between these users already exists";

/// A conditional status write found the row in another state.
pub(crate) fn status_changed(id: Uuid, expected: MatchingStatus) -> AppError {
    AppError::conflict(format!("matching {} is no longer {}", id, expected))
}

/// Map a failed write, turning constraint violations into domain errors.
///
/// A unique violation is a `Conflict` and a foreign key violation means a
/// referenced user is gone. Anything else stays a store failure.
pub(crate) fn write_error(op: &'static str, duplicate: &str, err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::conflict(duplicate),
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::NotFound("user"),
        _ => AppError::store(op, err),
    }
}

/// Where a relational statement runs.
pub(crate) enum Executor<'a> {
    Pool(&'a DatabaseConnection),
    Tx(&'a DatabaseTransaction),
}

impl<'a> Executor<'a> {
    pub(crate) fn resolve(db: &'a DatabaseConnection, tx: Option<Tx<'a>>) -> AppResult<Self> {
        match tx {
            None => Ok(Executor::Pool(db)),
            Some(tx) => Ok(Executor::Tx(tx.database()?)),
        }
    }
}

/// Run `$body` against whichever connection `$executor` resolves to.
macro_rules! on_executor {
    ($executor:expr, |$conn:ident| $body:expr) => {
        match $executor {
            $crate::infra::repositories::Executor::Pool($conn) => $body,
            $crate::infra::repositories::Executor::Tx($conn) => $body,
        }
    };
}

pub(crate) use on_executor;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_other_write_errors_stay_store_failures() {
        let err = write_error(
            "save matching",
            DUPLICATE_MATCHING,
            DbErr::Custom("connection reset".to_string()),
        );

        assert!(matches!(err, AppError::Store { op: "save matching", .. }));
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn test_status_change_is_conflict() {
        let err = status_changed(Uuid::nil(), MatchingStatus::Pending);

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().ends_with("is no longer pending"));
    }
}
