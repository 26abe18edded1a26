//! Domain entities: tree nodes, payload and hierarchy descriptions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::nested_set::Bounds;

/// Storage-assigned node identifier.
pub type NodeId = i64;

/// Partition key of one independent tree inside the shared table.
pub type TreeId = i64;

/// Browser target of a menu link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    #[default]
    #[serde(rename = "self")]
    SelfFrame,
    Blank,
    Parent,
    Top,
}

impl Target {
    pub fn code(self) -> i64 {
        match self {
            Target::SelfFrame => 0,
            Target::Blank => 1,
            Target::Parent => 2,
            Target::Top => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Target::SelfFrame),
            1 => Some(Target::Blank),
            2 => Some(Target::Parent),
            3 => Some(Target::Top),
            _ => None,
        }
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "self" => Ok(Target::SelfFrame),
            "blank" => Ok(Target::Blank),
            "parent" => Ok(Target::Parent),
            "top" => Ok(Target::Top),
            other => Err(format!(
                "unknown target '{other}' (expected self, blank, parent or top)"
            )),
        }
    }
}

/// Who gets to see a node. Interpreted by presentation code only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    #[default]
    Always,
    LoggedIn,
    LoggedOut,
    Admin,
}

impl Visibility {
    pub fn code(self) -> i64 {
        match self {
            Visibility::Always => 0,
            Visibility::LoggedIn => 1,
            Visibility::LoggedOut => 2,
            Visibility::Admin => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Visibility::Always),
            1 => Some(Visibility::LoggedIn),
            2 => Some(Visibility::LoggedOut),
            3 => Some(Visibility::Admin),
            _ => None,
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "always" => Ok(Visibility::Always),
            "logged-in" => Ok(Visibility::LoggedIn),
            "logged-out" => Ok(Visibility::LoggedOut),
            "admin" => Ok(Visibility::Admin),
            other => Err(format!(
                "unknown visibility '{other}' (expected always, logged-in, logged-out or admin)"
            )),
        }
    }
}

/// Caller-defined attributes carried by a node.
///
/// The tree engine only looks at `slug` (uniqueness), `enabled` (traversal
/// filtering) and `user_editable` (re-sync policy). Everything else is opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePayload {
    pub name: String,
    pub slug: String,
    pub extension: Option<String>,
    pub uri: Option<String>,
    pub target: Target,
    pub visibility: Visibility,
    pub secure: bool,
    pub enabled: bool,
    pub user_editable: bool,
    pub class: String,
}

impl NodePayload {
    /// Enabled, system-managed payload with empty display fields.
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            extension: None,
            uri: None,
            target: Target::default(),
            visibility: Visibility::default(),
            secure: false,
            enabled: true,
            user_editable: false,
            class: String::new(),
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    pub fn user_editable(mut self, user_editable: bool) -> Self {
        self.user_editable = user_editable;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A persisted node: identity, nested-set coordinates and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: NodeId,
    pub tree_id: TreeId,
    pub left: i64,
    pub right: i64,
    pub payload: NodePayload,
}

impl TreeNode {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.left, self.right)
    }

    pub fn is_root(&self) -> bool {
        self.left == 1
    }

    /// `(right - left - 1) / 2`
    pub fn descendant_count(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }

    /// Range predicate: `self.left < other.left AND other.right < self.right`.
    pub fn is_ancestor_of(&self, other: &TreeNode) -> bool {
        self.tree_id == other.tree_id && self.bounds().strictly_contains(&other.bounds())
    }

    pub fn slug(&self) -> &str {
        &self.payload.slug
    }

    pub fn name(&self) -> &str {
        &self.payload.name
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.payload.name, self.payload.slug)
    }
}

/// Lookup key: numeric values address the primary key, anything else the slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Id(NodeId),
    Slug(String),
}

impl NodeKey {
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<NodeId>() {
            Ok(id) => NodeKey::Id(id),
            Err(_) => NodeKey::Slug(value.trim().to_string()),
        }
    }
}

impl From<NodeId> for NodeKey {
    fn from(id: NodeId) -> Self {
        NodeKey::Id(id)
    }
}

impl From<&str> for NodeKey {
    fn from(value: &str) -> Self {
        NodeKey::parse(value)
    }
}

impl From<String> for NodeKey {
    fn from(value: String) -> Self {
        NodeKey::parse(&value)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Id(id) => write!(f, "#{id}"),
            NodeKey::Slug(slug) => write!(f, "{slug}"),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// One entry of an externally supplied hierarchy (e.g. an edited menu tree
/// submitted by an admin UI). Entries carrying an `id` refer to stored nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub class: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDescription>,
}

impl NodeDescription {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            slug: slug.into(),
            extension: None,
            uri: None,
            target: Target::default(),
            visibility: Visibility::default(),
            secure: false,
            enabled: true,
            class: String::new(),
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    /// Payload for a node that does not exist yet.
    pub fn to_payload(&self) -> NodePayload {
        NodePayload {
            name: self.name.clone(),
            slug: self.slug.clone(),
            extension: self.extension.clone(),
            uri: self.uri.clone(),
            target: self.target,
            visibility: self.visibility,
            secure: self.secure,
            enabled: self.enabled,
            user_editable: false,
            class: self.class.clone(),
        }
    }

    /// Reverse direction: describe a stored branch, ids included.
    pub fn from_branch(branch: &Branch) -> Self {
        let payload = &branch.node.payload;
        Self {
            id: Some(branch.node.id),
            name: payload.name.clone(),
            slug: payload.slug.clone(),
            extension: payload.extension.clone(),
            uri: payload.uri.clone(),
            target: payload.target,
            visibility: payload.visibility,
            secure: payload.secure,
            enabled: payload.enabled,
            class: payload.class.clone(),
            children: branch.children.iter().map(Self::from_branch).collect(),
        }
    }
}

/// In-memory subtree: a node with its depth relative to the branch root and
/// its children in preorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub node: TreeNode,
    pub depth: u32,
    pub children: Vec<Branch>,
}

impl Branch {
    pub fn leaf(node: TreeNode, depth: u32) -> Self {
        Self {
            node,
            depth,
            children: Vec::new(),
        }
    }

    /// Nodes of this branch in preorder, the branch root first.
    pub fn preorder(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            out.push(&current.node);
            for child in current.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Number of nodes in the branch, root included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Branch::node_count).sum::<usize>()
    }
}
