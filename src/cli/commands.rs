//! Command dispatch

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::services::{HierarchyImporter, TreeRepository};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::slug::slugify;
use crate::domain::{NodeDescription, NodeKey, NodePayload, TreeNode};
use crate::infrastructure::di::ServiceContainer;

/// Arguments of `menutree add` after parsing.
struct NewNode<'a> {
    name: &'a str,
    slug: Option<&'a str>,
    uri: Option<&'a str>,
    target: crate::domain::Target,
    visibility: crate::domain::Visibility,
    class: &'a str,
    secure: bool,
    system: bool,
    disabled: bool,
}

impl NewNode<'_> {
    fn payload(&self) -> CliResult<NodePayload> {
        let slug = match self.slug {
            Some(s) => s.to_string(),
            None => slugify(self.name, '-'),
        };
        if slug.is_empty() {
            return Err(CliError::InvalidArgs(format!(
                "cannot derive a slug from {:?}, pass --slug",
                self.name
            )));
        }
        let mut payload = NodePayload::new(self.name, slug)
            .with_class(self.class)
            .user_editable(!self.system)
            .enabled(!self.disabled);
        payload.uri = self.uri.map(str::to_string);
        payload.target = self.target;
        payload.visibility = self.visibility;
        payload.secure = self.secure;
        Ok(payload)
    }
}

/// Execute a parsed command line.
pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see `menutree --help`".into(),
        ));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            return Ok(());
        }
        Commands::Config { command } => {
            let settings = load_settings(cli)?;
            return config_command(command, &settings, cli.config.as_deref());
        }
        _ => {}
    }

    let settings = load_settings(cli)?;
    let mut services = ServiceContainer::new(settings)?;
    if matches!(command, Commands::Delete { force: true, .. }) {
        output::warning("--force: system-managed nodes are not protected");
        services = services.without_delete_guard();
    }

    match command {
        Commands::Roots => cmd_roots(&services.repository),
        Commands::Ensure { key } => {
            let root = services.registry.resolve(key, &mut services.repository)?;
            output::action("Root", &output::node_label(&root));
            Ok(())
        }
        Commands::Tree { node, depth, all } => {
            let depth = depth.or(services.settings.default_depth);
            cmd_tree(&services.repository, node, depth, *all)
        }
        Commands::Add {
            parent,
            name,
            slug,
            uri,
            target,
            visibility,
            class,
            secure,
            system,
            disabled,
        } => {
            let new = NewNode {
                name,
                slug: slug.as_deref(),
                uri: uri.as_deref(),
                target: *target,
                visibility: *visibility,
                class,
                secure: *secure,
                system: *system,
                disabled: *disabled,
            };
            cmd_add(&mut services.repository, parent, &new)
        }
        Commands::Move { node, parent } => {
            let repo = &mut services.repository;
            let node = lookup(repo, node)?;
            let parent = lookup(repo, parent)?;
            let moved = repo.move_to_last_child(&node, &parent)?;
            output::action("Moved", &output::node_label(&moved));
            Ok(())
        }
        Commands::Enable { node } => cmd_set_enabled(&mut services.repository, node, true),
        Commands::Disable { node } => cmd_set_enabled(&mut services.repository, node, false),
        Commands::Delete { node, .. } => {
            let repo = &mut services.repository;
            let node = lookup(repo, node)?;
            let deleted = repo.delete_subtree(&node)?;
            output::action("Deleted", &format!("{} ({} nodes)", node, deleted));
            Ok(())
        }
        Commands::Import { root, file } => cmd_import(&mut services, root, file),
        Commands::Export { root } => {
            let importer = HierarchyImporter::new(&mut services.repository);
            let described = importer.export(&NodeKey::parse(root))?;
            let json = serde_json::to_string_pretty(&described).map_err(|e| CliError::Json {
                context: "export".into(),
                source: e,
            })?;
            output::info(&json);
            Ok(())
        }
        Commands::Path { node } => cmd_path(&services.repository, node),
        Commands::Check { root } => cmd_check(&services.repository, root.as_deref()),
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}

/// Settings for this invocation: layered config plus command-line overrides.
fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let local = match &cli.config {
        Some(path) => Some(path.clone()),
        None => std::env::current_dir()
            .ok()
            .map(|dir| local_config_path(&dir))
            .filter(|path| path.exists()),
    };
    let mut settings = Settings::load(local.as_deref())?;
    if let Some(database) = &cli.database {
        settings.database = database.clone();
    }
    debug!("load_settings: database={}", settings.database.display());
    Ok(settings)
}

fn lookup(repo: &TreeRepository, value: &str) -> CliResult<TreeNode> {
    Ok(repo.get(&NodeKey::parse(value))?)
}

fn cmd_roots(repo: &TreeRepository) -> CliResult<()> {
    let roots = repo.roots()?;
    if roots.is_empty() {
        output::info("No roots");
        return Ok(());
    }
    for root in &roots {
        output::info(&format!("{:>4}  {}", root.tree_id, output::node_label(root)));
    }
    Ok(())
}

#[instrument(skip(repo))]
fn cmd_tree(
    repo: &TreeRepository,
    node: &str,
    depth: Option<u32>,
    all: bool,
) -> CliResult<()> {
    let node = lookup(repo, node)?;
    let branch = repo.subtree(&node, depth, !all)?;
    output::info(&output::to_tree_string(&branch));
    Ok(())
}

fn cmd_add(repo: &mut TreeRepository, parent: &str, new: &NewNode<'_>) -> CliResult<()> {
    let parent = lookup(repo, parent)?;
    let node = repo.append_child(&parent, new.payload()?)?;
    output::action("Added", &output::node_label(&node));
    Ok(())
}

fn cmd_set_enabled(repo: &mut TreeRepository, node: &str, enabled: bool) -> CliResult<()> {
    let node = lookup(repo, node)?;
    let node = repo.set_enabled(node.id, enabled)?;
    let label = if enabled { "Enabled" } else { "Disabled" };
    output::action(label, &node);
    Ok(())
}

#[instrument(skip(services))]
fn cmd_import(services: &mut ServiceContainer, root: &str, file: &Path) -> CliResult<()> {
    let descriptions = read_descriptions(file)?;

    // Registered keys go through the registry so the root gets its configured payload.
    let key = match NodeKey::parse(root) {
        NodeKey::Slug(slug) if services.registry.get(&slug).is_some() => {
            let resolved = services.registry.resolve(&slug, &mut services.repository)?;
            NodeKey::Id(resolved.id)
        }
        key => key,
    };

    let branch = HierarchyImporter::new(&mut services.repository).import(&key, &descriptions)?;
    output::success(&format!(
        "Imported {} nodes below {}",
        branch.node_count() - 1,
        branch.node
    ));
    output::info(&output::to_tree_string(&branch));
    Ok(())
}

fn read_descriptions(file: &Path) -> CliResult<Vec<NodeDescription>> {
    let content = if file == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CliError::Io {
                context: "read stdin".into(),
                source: e,
            })?;
        buf
    } else {
        std::fs::read_to_string(file).map_err(|e| CliError::Io {
            context: format!("read {}", file.display()),
            source: e,
        })?
    };
    serde_json::from_str(&content).map_err(|e| CliError::Json {
        context: file.display().to_string(),
        source: e,
    })
}

fn cmd_path(repo: &TreeRepository, node: &str) -> CliResult<()> {
    let node = lookup(repo, node)?;
    let names = repo
        .path(&node)?
        .into_iter()
        .map(|id| lookup(repo, &id.to_string()).map(|n| n.payload.name))
        .collect::<CliResult<Vec<_>>>()?;
    output::info(&names.iter().join(" > "));
    Ok(())
}

fn cmd_check(repo: &TreeRepository, root: Option<&str>) -> CliResult<()> {
    let roots = match root {
        Some(value) => vec![lookup(repo, value)?],
        None => repo.roots()?,
    };

    let mut first_failure = None;
    for root in &roots {
        match repo.verify(root.tree_id) {
            Ok(()) => output::success(&format!("tree {} ({})", root.tree_id, root.payload.slug)),
            Err(e) => {
                output::failure(&format!("tree {}: {}", root.tree_id, e));
                first_failure.get_or_insert(e);
            }
        }
    }
    match first_failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn config_command(
    command: &ConfigCommands,
    settings: &Settings,
    explicit: Option<&Path>,
) -> CliResult<()> {
    match command {
        ConfigCommands::Show => output::info(&settings.to_toml()?),
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            let describe = |p: Option<PathBuf>| match p {
                Some(p) if p.exists() => p.display().to_string(),
                Some(p) => format!("{} (not found)", p.display()),
                None => "(unavailable)".to_string(),
            };
            output::header("Config files");
            output::detail(&format!("global:   {}", describe(global_config_path())));
            let local = explicit.map(Path::to_path_buf).or_else(|| {
                std::env::current_dir()
                    .ok()
                    .map(|dir| local_config_path(&dir))
            });
            output::detail(&format!("local:    {}", describe(local)));
            output::detail(&format!("database: {}", settings.database.display()));
        }
    }
    Ok(())
}
