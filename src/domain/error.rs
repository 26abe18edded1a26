//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::TreeId;

/// Domain errors represent nested-set invariant and policy violations.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("node not found: {0}")]
    NotFound(String),

    #[error("slug already in use: {0}")]
    DuplicateSlug(String),

    #[error("corrupt tree {tree_id}: {reason}")]
    CorruptTree { tree_id: TreeId, reason: String },

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

impl DomainError {
    pub fn corrupt(tree_id: TreeId, reason: impl Into<String>) -> Self {
        Self::CorruptTree {
            tree_id,
            reason: reason.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
