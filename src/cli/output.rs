//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.

use colored::Colorize;
use termtree::Tree;

use crate::domain::{Branch, TreeNode};

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print warning (yellow "Warning:" prefix) to stderr
pub fn warning(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "Warning".yellow(), msg);
}

/// Print success status (green checkmark)
pub fn success(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{} {}", "✓".green(), msg);
}

/// Print failure status (red X, indented)
pub fn failure(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {} {}", "✗".red(), msg);
}

/// Print completed action (green label)
pub fn action(label: &str, msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print indented detail (no color)
pub fn detail(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {}", msg);
}

/// Print plain output (no color, for data/export output)
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// One-line node label: `#id name (slug) [left..right]`, dimmed when disabled.
pub fn node_label(node: &TreeNode) -> String {
    let mut label = format!(
        "#{} {} ({}) [{}..{}]",
        node.id, node.payload.name, node.payload.slug, node.left, node.right
    );
    if node.payload.user_editable {
        label.push_str(" *");
    }
    if node.payload.enabled {
        label
    } else {
        format!("{} {}", label.dimmed(), "(disabled)".yellow())
    }
}

/// Render a branch for terminal display.
pub fn to_tree_string(branch: &Branch) -> Tree<String> {
    let leaves: Vec<_> = branch.children.iter().map(to_tree_string).collect();
    Tree::new(node_label(&branch.node)).with_leaves(leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NodePayload;

    fn node(id: i64, slug: &str, left: i64, right: i64) -> TreeNode {
        TreeNode {
            id,
            tree_id: 1,
            left,
            right,
            payload: NodePayload::new(slug, slug),
        }
    }

    #[test]
    fn given_branch_when_rendering_then_lists_children_below_root() {
        colored::control::set_override(false);
        let mut branch = Branch::leaf(node(1, "main", 1, 4), 0);
        branch.children.push(Branch::leaf(node(2, "home", 2, 3), 1));

        let rendered = to_tree_string(&branch).to_string();

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "#1 main (main) [1..4]");
        assert!(lines[1].ends_with("#2 home (home) [2..3]"));
    }
}
