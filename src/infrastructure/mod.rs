//! Infrastructure layer: storage adapters and DI container
//!
//! This layer implements the storage boundary traits and wires up services.

pub mod di;
pub mod error;
pub mod sql;
pub mod sqlite;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use sql::{Dialect, QueryBuilder, TableLayout};
pub use sqlite::SqliteStore;
pub use traits::{NodeStore, StoreTransaction, TreeStore};
