//! Common error types for the labeler

use thiserror::Error;

/// Common result type for labeler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the image index, session assembler and label store
#[derive(Error, Debug)]
pub enum Error {
    /// Fatal at startup: unreadable image root, unusable database, bad settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed user input (overlapping label sets, missing fields)
    #[error("Validation error: {0}")]
    Validation(String),

    /// No images are available to build a session from
    #[error("No images found in {0}")]
    EmptyCorpus(String),

    /// The label store could not be reached for this request
    #[error("Label store unavailable: {0}")]
    StoreUnavailable(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// SQLite primary result codes reported as a transient store fault
const STORE_FAULT_CODES: &[i32] = &[
    5,  // SQLITE_BUSY
    6,  // SQLITE_LOCKED
    10, // SQLITE_IOERR
    14, // SQLITE_CANTOPEN
];

/// Whether an extended SQLite result code (as reported by the driver) is a
/// busy/locked/I/O/open fault. Extended codes carry the primary code in the
/// low byte.
pub fn is_store_fault_code(code: &str) -> bool {
    code.trim()
        .parse::<i32>()
        .map(|extended| STORE_FAULT_CODES.contains(&(extended & 0xFF)))
        .unwrap_or(false)
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for Error {
    /// Connectivity and lock faults become `StoreUnavailable`; everything
    /// else stays a plain database error.
    fn from(err: sqlx::Error) -> Self {
        let store_fault = match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_) => true,
            sqlx::Error::Database(db) => db.code().is_some_and(|code| is_store_fault_code(&code)),
            _ => false,
        };

        if store_fault {
            Error::StoreUnavailable(err.to_string())
        } else {
            Error::Database(err)
        }
    }
}

#[cfg(all(test, feature = "sqlx"))]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_store_unavailable() {
        let err: Error = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[test]
    fn test_store_fault_codes() {
        assert!(is_store_fault_code("5")); // SQLITE_BUSY
        assert!(is_store_fault_code("261")); // SQLITE_BUSY_RECOVERY
        assert!(is_store_fault_code("6")); // SQLITE_LOCKED
        assert!(is_store_fault_code("266")); // SQLITE_IOERR_READ
        assert!(is_store_fault_code("14")); // SQLITE_CANTOPEN
        assert!(!is_store_fault_code("19")); // SQLITE_CONSTRAINT
        assert!(!is_store_fault_code("2067")); // SQLITE_CONSTRAINT_UNIQUE
        assert!(!is_store_fault_code("HY000"));
    }

    #[test]
    fn test_row_not_found_stays_database_error() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::Database(_)));
    }
}
