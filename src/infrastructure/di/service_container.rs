//! Service container for dependency injection
//!
//! Wires the repository and the root registry to a store.

use std::sync::Arc;

use tracing::debug;

use crate::application::services::{protect_system_nodes, TreeRepository};
use crate::application::{ApplicationResult, RootRegistry, StoreResultExt};
use crate::config::Settings;
use crate::infrastructure::{SqliteStore, TreeStore};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Nested-set repository
    pub repository: TreeRepository,

    /// Named roots
    pub registry: RootRegistry,
}

impl ServiceContainer {
    /// Create a container on the SQLite database named in the settings.
    pub fn new(settings: Settings) -> ApplicationResult<Self> {
        debug!("ServiceContainer::new: database={}", settings.database.display());
        let store = SqliteStore::open(&settings.database, settings.layout.clone())
            .with_store_context("open database")?;
        Ok(Self::with_store(settings, Box::new(store)))
    }

    /// Create a service container on a custom store (for testing).
    pub fn with_store(settings: Settings, store: Box<dyn TreeStore>) -> Self {
        let mut repository =
            TreeRepository::new(store).with_verify_writes(settings.verify_writes);
        if settings.protect_system_nodes {
            repository = repository.with_delete_guard(protect_system_nodes());
        }
        let registry = RootRegistry::from_settings(&settings);

        Self {
            settings: Arc::new(settings),
            repository,
            registry,
        }
    }

    /// Same container without the delete guard (`delete --force`).
    pub fn without_delete_guard(mut self) -> Self {
        self.repository = self.repository.without_delete_guard();
        self
    }
}
