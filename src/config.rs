//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/menutree/menutree.toml`
//! 3. Local config: `--config <file>`, or `./.menutree.toml` when present
//! 4. Environment variables: `MENUTREE_*` prefix

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::application::{ApplicationError, RootDefinition};
use crate::infrastructure::TableLayout;

/// Raw settings for intermediate parsing (fields are Option to detect "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub database: Option<PathBuf>,
    pub layout: Option<TableLayout>,
    pub verify_writes: Option<bool>,
    pub protect_system_nodes: Option<bool>,
    pub default_depth: Option<u32>,
    pub roots: Option<Vec<RootDefinition>>,
}

/// Unified configuration for menutree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// SQLite database file
    pub database: PathBuf,
    /// Table and nested-set column names
    pub layout: TableLayout,
    /// Validate the whole tree inside every structural write
    pub verify_writes: bool,
    /// Refuse deleting subtrees that contain system-managed nodes
    pub protect_system_nodes: bool,
    /// Depth limit for `tree` output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_depth: Option<u32>,
    /// Named roots
    pub roots: Vec<RootDefinition>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            layout: TableLayout::default(),
            verify_writes: true,
            protect_system_nodes: true,
            default_depth: None,
            roots: vec![
                RootDefinition::new("admin").with_name("Admin"),
                RootDefinition::new("main").with_name("Main"),
            ],
        }
    }
}

/// Default database location: `$XDG_DATA_HOME/menutree/menutree.db`.
fn default_database_path() -> PathBuf {
    ProjectDirs::from("", "", "menutree")
        .map(|dirs| dirs.data_dir().join("menutree.db"))
        .unwrap_or_else(|| PathBuf::from("menutree.db"))
}

/// Get the XDG config directory for menutree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "menutree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("menutree.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".menutree.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

fn identifier() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// Merge root definitions by key.
///
/// - Overlay definitions replace base definitions with the same key
/// - New keys are appended in overlay order
/// - A key prefixed with `!` removes the inherited definition
pub fn merge_roots(base: &[RootDefinition], overlay: &[RootDefinition]) -> Vec<RootDefinition> {
    let mut result = base.to_vec();
    for definition in overlay {
        if let Some(removed) = definition.key.strip_prefix('!') {
            result.retain(|d| d.key != removed);
        } else if let Some(existing) = result.iter_mut().find(|d| d.key == definition.key) {
            *existing = definition.clone();
        } else {
            result.push(definition.clone());
        }
    }
    result
}

impl Settings {
    /// Expand shell variables and tilde in the database path.
    ///
    /// Handles `~`, `$VAR`, and `${VAR}` syntax. Unknown variables are left as-is.
    fn expand_paths(&mut self) {
        let raw = self.database.to_string_lossy().to_string();
        let expanded = shellexpand::full(&raw)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| shellexpand::tilde(&raw).into_owned());
        self.database = PathBuf::from(expanded);
    }

    /// Merge local config onto self (base).
    ///
    /// - Scalar options: overlay wins if Some, otherwise keep base
    /// - Roots: merged by key with `!key` removal
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            database: overlay
                .database
                .clone()
                .unwrap_or_else(|| self.database.clone()),
            layout: overlay
                .layout
                .clone()
                .unwrap_or_else(|| self.layout.clone()),
            verify_writes: overlay.verify_writes.unwrap_or(self.verify_writes),
            protect_system_nodes: overlay
                .protect_system_nodes
                .unwrap_or(self.protect_system_nodes),
            default_depth: overlay.default_depth.or(self.default_depth),
            roots: overlay
                .roots
                .as_ref()
                .map(|o| merge_roots(&self.roots, o))
                .unwrap_or_else(|| self.roots.clone()),
        }
    }

    /// Apply global config onto defaults.
    ///
    /// Unlike `merge_with()`, a global `roots` list REPLACES the compiled
    /// defaults entirely.
    fn apply_global(&self, global: &RawSettings) -> Self {
        let mut merged = self.merge_with(&RawSettings {
            roots: None,
            ..global.clone()
        });
        if let Some(roots) = &global.roots {
            merged.roots = roots.clone();
        }
        merged
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local` - Optional local config file; a missing file is an error
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/menutree/menutree.toml` (roots REPLACE defaults)
    /// 3. Local config (roots merge by key)
    /// 4. Environment variables: `MENUTREE_*` prefix, `__` for nesting
    pub fn load(local: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        if let Some(path) = local {
            if !path.exists() {
                return Err(ApplicationError::Config {
                    message: format!("config file not found: {}", path.display()),
                });
            }
            let raw = load_raw_settings(path)?;
            current = current.merge_with(&raw);
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;

        Ok(current)
    }

    /// Apply MENUTREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("MENUTREE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("database") {
            settings.database = PathBuf::from(val);
        }
        if let Ok(val) = config.get_bool("verify_writes") {
            settings.verify_writes = val;
        }
        if let Ok(val) = config.get_bool("protect_system_nodes") {
            settings.protect_system_nodes = val;
        }
        if let Ok(val) = config.get_int("default_depth") {
            settings.default_depth = u32::try_from(val).ok();
        }
        if let Ok(val) = config.get_string("layout.table") {
            settings.layout.table = val;
        }
        if let Ok(val) = config.get_string("layout.left") {
            settings.layout.left = val;
        }
        if let Ok(val) = config.get_string("layout.right") {
            settings.layout.right = val;
        }
        if let Ok(val) = config.get_string("layout.tree") {
            settings.layout.tree = val;
        }

        Ok(settings)
    }

    /// Reject values that would produce broken SQL or ambiguous roots.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        let layout = &self.layout;
        for (what, name) in [
            ("table", &layout.table),
            ("left column", &layout.left),
            ("right column", &layout.right),
            ("tree column", &layout.tree),
        ] {
            if !identifier().is_match(name) {
                return Err(ApplicationError::Config {
                    message: format!("invalid {what} name: {name:?}"),
                });
            }
        }

        let mut keys: Vec<&str> = self.roots.iter().map(|r| r.key.as_str()).collect();
        keys.sort_unstable();
        if let Some(pair) = keys.windows(2).find(|w| w[0] == w[1]) {
            return Err(ApplicationError::Config {
                message: format!("root key defined twice: {}", pair[0]),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# menutree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/menutree/menutree.toml  (defines your baseline)
#   Local:  --config <file> or ./.menutree.toml
#   Env:    MENUTREE_* environment variables (explicit overrides),
#           nested keys use "__", e.g. MENUTREE_LAYOUT__TABLE=nav
#
# Root Merge Semantics:
#   Global [[roots]] REPLACE the compiled defaults (admin, main).
#   Local [[roots]] merge by key with the global ones.
#   Use key = "!name" in local config to REMOVE an inherited root.

# SQLite database file (~ and $VAR are expanded)
# database = "~/.local/share/menutree/menutree.db"

# Validate the whole tree before committing every structural change
# verify_writes = true

# Refuse deleting subtrees that contain system-managed nodes (override: delete --force)
# protect_system_nodes = true

# Depth limit for `menutree tree`
# default_depth = 3

[layout]
# table = "menus"
# left = "lft"
# right = "rgt"
# tree = "menu_id"

# [[roots]]
# key = "admin"
# name = "Admin"
# slug = "admin"
# separator = "-"
# class = ""
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_created_then_has_admin_and_main_roots() {
        let settings = Settings::default();
        let keys: Vec<&str> = settings.roots.iter().map(|r| r.key.as_str()).collect();

        assert_eq!(keys, vec!["admin", "main"]);
        assert!(settings.verify_writes);
        assert!(settings.database.ends_with("menutree.db"));
    }

    #[test]
    fn given_tilde_in_database_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            database: PathBuf::from("~/menus/menutree.db"),
            ..Settings::default()
        };

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let db = settings.database.to_string_lossy();
        assert!(db.starts_with(&home), "database should start with home: {db}");
        assert!(!db.contains('~'), "database should not contain tilde: {db}");
    }

    #[test]
    fn given_overlay_roots_when_merging_then_replaces_adds_and_removes_by_key() {
        let base = vec![
            RootDefinition::new("admin").with_name("Admin"),
            RootDefinition::new("main").with_name("Main"),
        ];
        let overlay = vec![
            RootDefinition::new("admin").with_name("Backend"),
            RootDefinition::new("!main"),
            RootDefinition::new("footer"),
        ];

        let result = merge_roots(&base, &overlay);

        let keys: Vec<&str> = result.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["admin", "footer"]);
        assert_eq!(result[0].name.as_deref(), Some("Backend"));
    }

    #[test]
    fn given_global_roots_when_applying_global_then_replaces_defaults() {
        let global = RawSettings {
            roots: Some(vec![RootDefinition::new("footer")]),
            verify_writes: Some(false),
            ..RawSettings::default()
        };

        let result = Settings::default().apply_global(&global);

        assert_eq!(result.roots, vec![RootDefinition::new("footer")]);
        assert!(!result.verify_writes);
        assert!(result.protect_system_nodes);
    }

    #[test]
    fn given_unsafe_column_name_when_validating_then_config_error() {
        let mut settings = Settings::default();
        settings.layout.left = "lft; DROP TABLE menus".into();

        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ApplicationError::Config { .. }));
    }

    #[test]
    fn given_duplicate_root_keys_when_validating_then_config_error() {
        let mut settings = Settings::default();
        settings.roots.push(RootDefinition::new("main"));

        assert!(settings.validate().is_err());
    }

    #[test]
    fn given_settings_when_serialized_then_template_and_toml_parse_back() {
        let settings = Settings::default();

        let rendered = settings.to_toml().expect("serialize");
        let parsed: Settings = toml::from_str(&rendered).expect("parse rendered");
        assert_eq!(parsed, settings);

        let template: RawSettings = toml::from_str(&Settings::template()).expect("parse template");
        assert!(template.database.is_none());
    }
}
