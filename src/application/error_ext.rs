//! Error conversion helpers for store results
//!
//! Provides an extension trait for attaching the failed action to storage errors.

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::DomainError;
use crate::infrastructure::{StoreError, StoreResult};

/// Extension trait for converting `StoreResult` to `ApplicationResult` with context.
pub trait StoreResultExt<T> {
    /// Add the attempted action to a storage error.
    ///
    /// A unique-constraint violation surfaces as [`DomainError::DuplicateSlug`]
    /// since `slug` is the only unique payload column.
    ///
    /// # Example
    /// ```ignore
    /// tx.insert_node(tree_id, bounds, &payload)
    ///     .with_store_context("insert node")?;
    /// ```
    fn with_store_context(self, action: &str) -> ApplicationResult<T>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn with_store_context(self, action: &str) -> ApplicationResult<T> {
        self.map_err(|e| match e {
            StoreError::UniqueViolation(detail) => {
                ApplicationError::Domain(DomainError::DuplicateSlug(detail))
            }
            other => ApplicationError::StorageFailure {
                context: action.to_string(),
                source: other,
            },
        })
    }
}
