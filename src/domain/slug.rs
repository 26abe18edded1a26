//! Slug and display-name derivation for root menus.

use std::sync::OnceLock;

use regex::Regex;

fn non_alnum() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap())
}

/// Lowercase `value`, collapse every run of non-alphanumerics into
/// `separator` and trim separators from both ends.
///
/// `slugify("Admin Dashboard", '-')` → `admin-dashboard`
pub fn slugify(value: &str, separator: char) -> String {
    let lowered = value.to_lowercase();
    let sep = separator.to_string();
    let replaced = non_alnum().replace_all(&lowered, sep.as_str());
    replaced.trim_matches(separator).to_string()
}

/// Title-case a key such as `foo_bar` or `foo-bar` into `Foo Bar`.
pub fn title_from_key(key: &str) -> String {
    key.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Prefix `slug` with `<root_slug>-` unless it already carries that prefix.
///
/// `mainframe` below `main` becomes `main-mainframe`.
pub fn scope_to_root(slug: &str, root_slug: &str) -> String {
    let prefix = format!("{root_slug}-");
    if slug.starts_with(&prefix) {
        slug.to_string()
    } else {
        format!("{prefix}{slug}")
    }
}
