//! Application-wide error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use crate::lifecycle::LifecycleEvent;
use crate::models::{PaymentStatus, ProjectStatus};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid transition: event '{event}' is not valid in status '{from}'")]
    InvalidTransition {
        from: ProjectStatus,
        event: LifecycleEvent,
    },

    #[error("concurrent update lost on {0}")]
    Conflict(&'static str),

    #[error("commission rate {0} bps is outside [0, 10000]")]
    InvalidRate(i64),

    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("project is not approved (status '{0}')")]
    ProjectNotApproved(ProjectStatus),

    #[error("an active payment already exists for project {0}")]
    DuplicatePayment(String),

    #[error("payment is already terminal (status '{0}')")]
    InvalidPaymentState(PaymentStatus),

    #[error("freelancer account is suspended")]
    FreelancerSuspended,

    #[error("project can no longer be edited (status '{0}')")]
    ProjectLocked(ProjectStatus),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// SQLite reports write-lock contention as BUSY (primary code 5) or LOCKED
/// (primary code 6), including their extended variants.  Ledger writes map
/// those to [`LedgerError::Conflict`] so a losing concurrent caller sees a
/// retryable 409, not a server error.
pub(crate) fn is_lock_contention(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i64>().ok())
            .is_some_and(|code| matches!(code & 0xff, 5 | 6)),
        _ => false,
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::error::Error;

    #[derive(Debug)]
    struct StubDbError(&'static str);

    impl std::fmt::Display for StubDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("stub")
        }
    }
    impl Error for StubDbError {}

    impl sqlx::error::DatabaseError for StubDbError {
        fn message(&self) -> &str {
            "stub"
        }
        fn code(&self) -> Option<Cow<'_, str>> {
            Some(self.0.into())
        }
        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
        fn as_error(&self) -> &(dyn Error + Send + Sync + 'static) {
            self
        }
        fn as_error_mut(&mut self) -> &mut (dyn Error + Send + Sync + 'static) {
            self
        }
        fn into_error(self: Box<Self>) -> Box<dyn Error + Send + Sync + 'static> {
            self
        }
    }

    fn db_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(StubDbError(code)))
    }

    #[test]
    fn busy_and_locked_codes_are_contention() {
        // Primary codes and extended variants (SQLITE_BUSY_SNAPSHOT etc.).
        for code in ["5", "6", "261", "262", "517"] {
            assert!(is_lock_contention(&db_error(code)), "code {code}");
        }
    }

    #[test]
    fn other_errors_are_not_contention() {
        // Constraint violation (1555) and a non-numeric code.
        assert!(!is_lock_contention(&db_error("1555")));
        assert!(!is_lock_contention(&db_error("nope")));
        assert!(!is_lock_contention(&sqlx::Error::RowNotFound));
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = match &self {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::InvalidRate(_) | LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            LedgerError::InvalidTransition { .. }
            | LedgerError::Conflict(_)
            | LedgerError::ProjectNotApproved(_)
            | LedgerError::DuplicatePayment(_)
            | LedgerError::InvalidPaymentState(_)
            | LedgerError::FreelancerSuspended
            | LedgerError::ProjectLocked(_) => StatusCode::CONFLICT,
            LedgerError::Database(_) | LedgerError::Migrate(_) | LedgerError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("internal error: {self}");
        }

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
