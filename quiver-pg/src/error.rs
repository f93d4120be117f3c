//! Mapping driver errors into `StorageError`

use deadpool_postgres::{CreatePoolError, PoolError};
use quiver_core::{QuiverError, StorageError};
use tokio_postgres::Row;
use tokio_postgres::types::FromSql;

pub(crate) fn db_error(err: tokio_postgres::Error) -> QuiverError {
    tracing::error!(error = ?err, "Database error");
    let reason = match err.as_db_error() {
        Some(db) => format!("{}: {}", db.code().code(), db.message()),
        None => err.to_string(),
    };
    QuiverError::Storage(StorageError::Database { reason })
}

pub(crate) fn pool_error(err: PoolError) -> QuiverError {
    tracing::error!(error = ?err, "Connection pool error");
    let reason = match err {
        PoolError::Timeout(_) => "timed out waiting for a connection".to_string(),
        PoolError::Closed => "connection pool is closed".to_string(),
        other => other.to_string(),
    };
    QuiverError::Storage(StorageError::Pool { reason })
}

pub(crate) fn pool_build_error(err: CreatePoolError) -> QuiverError {
    QuiverError::Storage(StorageError::Pool {
        reason: format!("Failed to create pool: {}", err),
    })
}

pub(crate) fn transaction_error(err: tokio_postgres::Error) -> QuiverError {
    tracing::error!(error = ?err, "Transaction failed");
    QuiverError::Storage(StorageError::TransactionFailed {
        reason: err.to_string(),
    })
}

/// Typed column read that reports the column on failure.
pub(crate) fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T, QuiverError> {
    row.try_get(name).map_err(|e| {
        QuiverError::Storage(StorageError::Decode {
            column: name.to_string(),
            reason: e.to_string(),
        })
    })
}

pub(crate) fn decode_error(column: &str, reason: impl Into<String>) -> QuiverError {
    QuiverError::Storage(StorageError::Decode {
        column: column.to_string(),
        reason: reason.into(),
    })
}
