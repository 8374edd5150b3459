//! Mapping of sqlx failures onto the engine taxonomy.

use pasajes_core::Error;

/// `SQLSTATE` codes worth retrying: serialization failure, deadlock and
/// lock-wait timeout.
const TRANSIENT_CODES: [&str; 3] = ["40001", "40P01", "55P03"];

/// Convert a sqlx error, tagging retryable failures as transient and
/// unique violations as validation errors.
pub(crate) fn map_sqlx(context: &str, err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            let constraint = db.constraint().unwrap_or("unique constraint").to_string();
            Error::Validation(format!("{context}: duplicate value violates {constraint}"))
        }
        sqlx::Error::Database(db)
            if db
                .code()
                .is_some_and(|code| TRANSIENT_CODES.contains(&code.as_ref())) =>
        {
            tracing::warn!(context, error = %err, "Lock contention, operation may be retried");
            metrics::counter!("pasajes.storage.transient_errors", "kind" => "contention")
                .increment(1);
            Error::transient(format!("{context}: {err}"))
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            tracing::warn!(context, error = %err, "Database connection unavailable");
            metrics::counter!("pasajes.storage.transient_errors", "kind" => "connection")
                .increment(1);
            Error::transient(format!("{context}: {err}"))
        }
        _ => {
            tracing::error!(context, error = %err, "Database operation failed");
            Error::storage(format!("{context}: {err}"))
        }
    }
}

/// A stored code or number that no longer fits the domain type.
pub(crate) fn corrupt(what: &str, detail: impl std::fmt::Display) -> Error {
    Error::storage(format!("corrupt {what} row: {detail}"))
}
