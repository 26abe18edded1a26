//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on the storage boundary traits (TreeStore, NodeStore)
//! but are themselves concrete structs, not traits.

mod active;
mod importer;
mod repository;

pub use active::ActiveMenu;
pub use importer::{HierarchyImporter, PersistHook, RootHook};
pub use repository::{protect_system_nodes, DeleteGuard, TreeRepository};
