//! menutree: nested-set (MPTT) menu trees on a relational table.
//!
//! Layers, leaf first:
//! - [`domain`]: entities and the nested-set codec (pure arithmetic)
//! - [`infrastructure`]: storage traits, SQL generation, SQLite adapter
//! - [`application`]: repository, hierarchy importer, active-path resolver, root registry
//! - [`cli`]: the `menutree` command line

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
