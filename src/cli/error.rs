//! CLI-level errors (wraps application errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    App(#[from] ApplicationError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<DomainError> for CliError {
    fn from(e: DomainError) -> Self {
        CliError::App(ApplicationError::Domain(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::Io { .. } => crate::exitcode::IOERR,
            CliError::Json { .. } => crate::exitcode::DATAERR,
            CliError::App(e) => match e {
                ApplicationError::Domain(d) => match d {
                    DomainError::NotFound(_) => crate::exitcode::NOINPUT,
                    DomainError::DuplicateSlug(_) => crate::exitcode::DATAERR,
                    DomainError::ConstraintViolation(_) => crate::exitcode::DATAERR,
                    DomainError::CorruptTree { .. } => crate::exitcode::SOFTWARE,
                },
                ApplicationError::StorageFailure { .. } => crate::exitcode::IOERR,
                ApplicationError::Config { .. } => crate::exitcode::CONFIG,
                ApplicationError::Import { .. } => crate::exitcode::DATAERR,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_domain_errors_when_mapping_then_uses_sysexits() {
        assert_eq!(
            CliError::from(DomainError::NotFound("x".into())).exit_code(),
            crate::exitcode::NOINPUT
        );
        assert_eq!(
            CliError::from(DomainError::corrupt(1, "overlap")).exit_code(),
            crate::exitcode::SOFTWARE
        );
        assert_eq!(
            CliError::Usage("nope".into()).exit_code(),
            crate::exitcode::USAGE
        );
    }
}
