//! Named root registry
//!
//! Maps caller keys such as `admin` or `main` to the definition used when the
//! root has to be created. Unregistered keys fall back to a definition derived
//! from the key itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::application::services::TreeRepository;
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::domain::slug::{slugify, title_from_key};
use crate::domain::{NodeKey, NodePayload, TreeNode};

fn default_separator() -> char {
    '-'
}

/// How to create the root registered under `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootDefinition {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default = "default_separator")]
    pub separator: char,
    #[serde(default)]
    pub class: String,
}

impl RootDefinition {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            slug: None,
            separator: default_separator(),
            class: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Explicit slug, or the key slugified with the separator.
    pub fn slug(&self) -> String {
        self.slug
            .clone()
            .unwrap_or_else(|| slugify(&self.key, self.separator))
    }

    /// Explicit name, or the key title-cased.
    pub fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| title_from_key(&self.key))
    }

    /// Payload of a freshly created root. Roots are system-managed.
    pub fn payload(&self) -> NodePayload {
        NodePayload::new(self.name(), self.slug()).with_class(self.class.clone())
    }
}

/// Registered root definitions keyed by caller key.
#[derive(Debug, Clone, Default)]
pub struct RootRegistry {
    roots: BTreeMap<String, RootDefinition>,
}

impl RootRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut registry = Self::new();
        for definition in &settings.roots {
            registry.register(definition.clone());
        }
        registry
    }

    /// Register a definition, returning the one it replaced.
    pub fn register(&mut self, definition: RootDefinition) -> Option<RootDefinition> {
        debug!("register: {}", definition.key);
        self.roots.insert(definition.key.clone(), definition)
    }

    pub fn get(&self, key: &str) -> Option<&RootDefinition> {
        self.roots.get(key)
    }

    /// Registered definitions ordered by key.
    pub fn definitions(&self) -> impl Iterator<Item = &RootDefinition> {
        self.roots.values()
    }

    /// Registered definition for `key`, or one derived from the key.
    pub fn definition(&self, key: &str) -> RootDefinition {
        self.get(key)
            .cloned()
            .unwrap_or_else(|| RootDefinition::new(key))
    }

    /// Find the root for `key`, creating it from its definition when absent.
    pub fn resolve(&self, key: &str, repo: &mut TreeRepository) -> ApplicationResult<TreeNode> {
        let definition = self.definition(key);
        let slug = definition.slug();
        if let Some(root) = repo.find_root(&NodeKey::Slug(slug.clone()))? {
            debug!("resolve: {} -> existing root #{}", key, root.id);
            return Ok(root);
        }

        info!("Creating root {} for key {}", slug, key);
        repo.create_root(definition.payload())
    }
}
