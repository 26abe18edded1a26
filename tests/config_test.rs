//! Integration tests for Settings config loading with layered merge semantics.
//!
//! Merge Semantics:
//! - Defaults → Global: REPLACE (global defines the real baseline)
//! - Global → Local: roots merge by key, `!key` removes an inherited root
//! - Any → Env vars: REPLACE (explicit user override)
//!
//! Note: These tests run without a global config (temp directories only),
//! so they effectively test local config merging with defaults.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use menutree::application::ApplicationError;
use menutree::config::{local_config_path, Settings};

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = local_config_path(dir.path());
    fs::write(&path, content).unwrap();
    path
}

fn root_keys(settings: &Settings) -> Vec<&str> {
    settings.roots.iter().map(|r| r.key.as_str()).collect()
}

#[test]
fn given_local_config_with_new_root_when_load_then_appended_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[[roots]]
key = "footer"
name = "Footer links"
"#,
    );

    let settings = Settings::load(Some(&path)).expect("load settings");

    assert_eq!(root_keys(&settings), vec!["admin", "main", "footer"]);
    assert_eq!(settings.roots[2].name.as_deref(), Some("Footer links"));
}

#[test]
fn given_local_config_with_negated_root_when_load_then_removes_it() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[[roots]]
key = "!admin"

[[roots]]
key = "main"
name = "Primary"
slug = "primary"
"#,
    );

    let settings = Settings::load(Some(&path)).expect("load settings");

    assert_eq!(root_keys(&settings), vec!["main"]);
    assert_eq!(settings.roots[0].slug(), "primary");
}

#[test]
fn given_local_config_with_scalars_when_load_then_overrides_scalars() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("menus.db");
    let path = write_config(
        &dir,
        &format!(
            r#"
database = "{}"
verify_writes = false
default_depth = 2

[layout]
table = "nav"
"#,
            db.display()
        ),
    );

    let settings = Settings::load(Some(&path)).expect("load settings");

    assert_eq!(settings.database, db);
    assert!(!settings.verify_writes);
    assert!(settings.protect_system_nodes);
    assert_eq!(settings.default_depth, Some(2));
    assert_eq!(settings.layout.table, "nav");
    assert_eq!(settings.layout.left, "lft", "unset layout keys keep defaults");
}

#[test]
fn given_local_config_without_roots_when_load_then_inherits_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "verify_writes = true\n");

    let settings = Settings::load(Some(&path)).expect("load settings");

    assert_eq!(root_keys(&settings), vec!["admin", "main"]);
}

#[test]
fn given_missing_config_file_when_load_then_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nope.toml");

    let err = Settings::load(Some(&path)).unwrap_err();

    assert!(matches!(err, ApplicationError::Config { .. }), "{err:?}");
}

#[test]
fn given_malformed_config_when_load_then_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "verify_writes = \"sometimes\"\n");

    let err = Settings::load(Some(&path)).unwrap_err();

    assert!(matches!(err, ApplicationError::Config { .. }), "{err:?}");
}

#[test]
fn given_unsafe_layout_in_config_when_load_then_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[layout]
tree = "menu_id); DROP TABLE menus; --"
"#,
    );

    let err = Settings::load(Some(&path)).unwrap_err();

    assert!(err.to_string().contains("tree column"), "{err}");
}

#[test]
fn given_template_when_written_as_config_then_loads_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, &Settings::template());

    let settings = Settings::load(Some(&path)).expect("load template");

    assert_eq!(root_keys(&settings), vec!["admin", "main"]);
    assert!(settings.verify_writes);
    assert_eq!(settings.default_depth, None);
}
