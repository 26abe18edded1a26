//! Storage-level errors raised by store adapters

use thiserror::Error;

/// Errors from the relational backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[source] rusqlite::Error),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("invalid value in column {column}: {value}")]
    InvalidValue { column: &'static str, value: i64 },

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                StoreError::UniqueViolation(
                    message.clone().unwrap_or_else(|| "unique constraint".to_string()),
                )
            }
            _ => StoreError::Sqlite(err),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
