//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

use crate::domain::{Target, Visibility};

/// Nested-set menu trees: inspect, edit, import and export
#[derive(Parser, Debug)]
#[command(name = "menutree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output (repeat for more: -d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Config file (default: ./.menutree.toml if present)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// SQLite database (overrides config)
    #[arg(long, global = true, env = "MENUTREE_DATABASE", value_hint = ValueHint::FilePath)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all roots
    Roots,

    /// Find or create the root registered under a key
    Ensure {
        /// Registry key (e.g. admin, main)
        key: String,
    },

    /// Show a tree
    Tree {
        /// Root or node (id or slug)
        node: String,
        /// Maximum depth below the node
        #[arg(long)]
        depth: Option<u32>,
        /// Include disabled nodes and their subtrees
        #[arg(short, long)]
        all: bool,
    },

    /// Append a node as last child
    Add {
        /// Parent node (id or slug)
        parent: String,
        /// Display name
        name: String,
        /// Slug (default: derived from name)
        #[arg(long)]
        slug: Option<String>,
        /// Link target
        #[arg(long)]
        uri: Option<String>,
        /// Link target frame
        #[arg(long, default_value = "self")]
        target: Target,
        /// Who sees the node
        #[arg(long, default_value = "always")]
        visibility: Visibility,
        /// CSS class
        #[arg(long, default_value = "")]
        class: String,
        /// Link requires a secure connection
        #[arg(long)]
        secure: bool,
        /// Mark the node as system-managed
        #[arg(long)]
        system: bool,
        /// Create the node disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Move a node (with its subtree) to the end of another node's children
    Move {
        /// Node to move (id or slug)
        node: String,
        /// New parent (id or slug)
        parent: String,
    },

    /// Enable a node
    Enable {
        /// Node (id or slug)
        node: String,
    },

    /// Disable a node (hides its subtree)
    Disable {
        /// Node (id or slug)
        node: String,
    },

    /// Delete a node and its subtree
    Delete {
        /// Node (id or slug)
        node: String,
        /// Also delete system-managed nodes
        #[arg(short, long)]
        force: bool,
    },

    /// Import children of a root from a JSON description
    Import {
        /// Root registry key, slug or id
        root: String,
        /// JSON file with an array of node descriptions ("-" for stdin)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Export children of a root as JSON
    Export {
        /// Root (id or slug)
        root: String,
    },

    /// Show the ancestor path of a node
    Path {
        /// Node (id or slug)
        node: String,
    },

    /// Verify the nested-set encoding of a tree
    Check {
        /// Root (id or slug); all roots when omitted
        root: Option<String>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Print a commented template
    Template,
    /// Show config file locations
    Path,
}
