//! Hierarchy importer
//!
//! Reconciles an externally supplied nested description (typically an edited
//! menu submitted by an admin UI) with the stored tree below a root.
//!
//! ## Reconciliation rules
//!
//! ```text
//! description entry            stored state                 action
//! -----------------            ------------                 ------
//! no id, slug matches          node in this tree            treat as that node
//! no id / unknown id           -                            append as user node
//! id, system node              any                          keep stored name/slug/uri/secure/class
//! id, user node                any                          take description payload
//! id, already at its slot      payload unchanged            nothing
//! id, elsewhere in the tree    -                            move to last child of context
//! ```
//!
//! An entry without an id is matched by its scoped slug (`<root>-<slug>`),
//! then by its raw slug, so a description kept in code re-syncs cleanly.
//! Nodes missing from the description are never deleted.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::application::services::TreeRepository;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::slug::{scope_to_root, title_from_key};
use crate::domain::{Branch, DomainError, NodeDescription, NodeId, NodeKey, NodePayload, TreeNode};

/// Hook run on a freshly derived root payload before the root is created.
pub type RootHook<'h> = Box<dyn FnMut(NodePayload) -> NodePayload + 'h>;

/// Hook run on every node payload before it is written. Returning `None`
/// skips the node together with its subtree.
pub type PersistHook<'h> = Box<dyn FnMut(NodePayload) -> Option<NodePayload> + 'h>;

/// Builds or re-syncs a stored tree from a [`NodeDescription`] list.
pub struct HierarchyImporter<'r> {
    repo: &'r mut TreeRepository,
    before_root_persist: Option<RootHook<'r>>,
    before_persist: Option<PersistHook<'r>>,
}

/// Walk state shared across the recursion.
struct Walk {
    root: TreeNode,
    seen: HashSet<NodeId>,
}

impl<'r> HierarchyImporter<'r> {
    pub fn new(repo: &'r mut TreeRepository) -> Self {
        Self {
            repo,
            before_root_persist: None,
            before_persist: None,
        }
    }

    pub fn before_root_persist(
        mut self,
        hook: impl FnMut(NodePayload) -> NodePayload + 'r,
    ) -> Self {
        self.before_root_persist = Some(Box::new(hook));
        self
    }

    pub fn before_persist(
        mut self,
        hook: impl FnMut(NodePayload) -> Option<NodePayload> + 'r,
    ) -> Self {
        self.before_persist = Some(Box::new(hook));
        self
    }

    /// Import `children` below the root addressed by `root_key`, creating the
    /// root if a slug key does not resolve.
    ///
    /// Returns the root with the imported hierarchy attached, in description
    /// order, with coordinates as stored after the import.
    ///
    /// # Errors
    ///
    /// `Import` for an entry with a blank slug, `ConstraintViolation` for an
    /// id that repeats, belongs to another tree or names the root, and
    /// `DuplicateSlug` when a new node collides with a stored slug.
    ///
    /// Every root creation, append, update and move commits on its own. When
    /// an entry fails, the steps before it stay persisted; running the same
    /// import again converges because matched nodes are left in place.
    pub fn import(
        &mut self,
        root_key: &NodeKey,
        children: &[NodeDescription],
    ) -> ApplicationResult<Branch> {
        debug!("import: root={}, entries={}", root_key, children.len());
        let root = self.resolve_root(root_key)?;

        let mut walk = Walk {
            root: root.clone(),
            seen: HashSet::new(),
        };
        let built = self.sync_children(&mut walk, &root, 1, children)?;

        let fresh: HashMap<NodeId, TreeNode> = self
            .repo
            .tree_nodes(root.tree_id)?
            .into_iter()
            .map(|n| (n.id, n))
            .collect();
        let mut branch = Branch {
            node: root,
            depth: 0,
            children: built,
        };
        refresh(&mut branch, &fresh);

        info!(
            "Imported {} nodes below {}",
            branch.node_count() - 1,
            branch.node.payload.slug
        );
        Ok(branch)
    }

    /// Describe the stored children of a root, ids included. The result is
    /// accepted back by [`HierarchyImporter::import`].
    pub fn export(&self, root_key: &NodeKey) -> ApplicationResult<Vec<NodeDescription>> {
        let root = self
            .repo
            .find_root(root_key)?
            .ok_or_else(|| DomainError::NotFound(root_key.to_string()))?;
        let branch = self.repo.subtree(&root, None, false)?;
        Ok(NodeDescription::from_branch(&branch).children)
    }

    fn resolve_root(&mut self, key: &NodeKey) -> ApplicationResult<TreeNode> {
        if let Some(root) = self.repo.find_root(key)? {
            return Ok(root);
        }
        let slug = match key {
            NodeKey::Slug(slug) => slug,
            NodeKey::Id(_) => return Err(DomainError::NotFound(key.to_string()).into()),
        };

        let mut payload = NodePayload::new(title_from_key(slug), slug.clone());
        if let Some(hook) = self.before_root_persist.as_mut() {
            payload = hook(payload);
        }
        self.repo.create_root(payload)
    }

    fn sync_children(
        &mut self,
        walk: &mut Walk,
        context: &TreeNode,
        depth: u32,
        entries: &[NodeDescription],
    ) -> ApplicationResult<Vec<Branch>> {
        let mut built = Vec::with_capacity(entries.len());
        // Left coordinate of the next child slot while every child so far was
        // already in place. Once anything is appended, children go to the end.
        let mut cursor = Some(context.left + 1);

        for entry in entries {
            if entry.slug.trim().is_empty() {
                return Err(ApplicationError::Import {
                    message: format!("entry {:?} has an empty slug", entry.name),
                });
            }
            let ctx = self.repo.get(&NodeKey::Id(context.id))?;
            let existing = self.lookup(walk, entry)?;

            let payload = derive_payload(entry, existing.as_ref());
            let payload = match self.before_persist.as_mut() {
                Some(hook) => match hook(payload) {
                    Some(p) => p,
                    None => {
                        debug!("sync_children: hook skipped {}", entry.slug);
                        continue;
                    }
                },
                None => payload,
            };
            let payload = scope_payload(payload, &walk.root.payload.slug);

            let node = match existing {
                Some(stored) => {
                    let mut node = stored;
                    if node.payload != payload {
                        node = self.repo.update(node.id, payload)?;
                    }
                    let in_place = match cursor {
                        Some(left) => node.left == left,
                        None => node.right + 1 == ctx.right,
                    };
                    if !in_place {
                        node = self.repo.move_to_last_child(&node, &ctx)?;
                        cursor = None;
                    }
                    node
                }
                None => {
                    cursor = None;
                    self.repo.append_child(&ctx, payload)?
                }
            };

            let children = self.sync_children(walk, &node, depth + 1, &entry.children)?;
            if let Some(left) = cursor.as_mut() {
                *left = self.repo.get(&NodeKey::Id(node.id))?.right + 1;
            }
            built.push(Branch {
                node,
                depth,
                children,
            });
        }

        Ok(built)
    }

    /// Stored node an entry refers to, if any.
    fn lookup(
        &self,
        walk: &mut Walk,
        entry: &NodeDescription,
    ) -> ApplicationResult<Option<TreeNode>> {
        let Some(id) = entry.id else {
            return self.lookup_by_slug(walk, entry);
        };
        if !walk.seen.insert(id) {
            return Err(DomainError::ConstraintViolation(format!(
                "node #{id} appears twice in the description"
            ))
            .into());
        }
        match self.repo.find(&NodeKey::Id(id))? {
            Some(node) if node.tree_id != walk.root.tree_id => {
                Err(ApplicationError::Domain(DomainError::ConstraintViolation(
                    format!(
                        "node #{id} belongs to tree {}, not {}",
                        node.tree_id, walk.root.tree_id
                    ),
                )))
            }
            Some(node) if node.id == walk.root.id => {
                Err(ApplicationError::Domain(DomainError::ConstraintViolation(
                    format!("root #{id} cannot be placed below itself"),
                )))
            }
            Some(node) => Ok(Some(node)),
            None => {
                warn!("Unknown node #{} in description, creating {}", id, entry.slug);
                Ok(None)
            }
        }
    }

    /// Stored node of this tree carrying the entry's scoped or raw slug.
    fn lookup_by_slug(
        &self,
        walk: &mut Walk,
        entry: &NodeDescription,
    ) -> ApplicationResult<Option<TreeNode>> {
        let scoped = scope_to_root(&entry.slug, &walk.root.payload.slug);
        let mut candidates = vec![scoped];
        if candidates[0] != entry.slug {
            candidates.push(entry.slug.clone());
        }

        for slug in candidates {
            let Some(node) = self.repo.find(&NodeKey::Slug(slug))? else {
                continue;
            };
            if node.tree_id != walk.root.tree_id || node.id == walk.root.id {
                continue;
            }
            if !walk.seen.insert(node.id) {
                return Err(DomainError::ConstraintViolation(format!(
                    "node {} appears twice in the description",
                    node.payload.slug
                ))
                .into());
            }
            debug!("lookup_by_slug: {} -> #{}", entry.slug, node.id);
            return Ok(Some(node));
        }
        Ok(None)
    }
}

/// Payload to persist for `entry`. System-managed nodes keep their stored
/// identity fields; everything else comes from the description.
fn derive_payload(entry: &NodeDescription, existing: Option<&TreeNode>) -> NodePayload {
    let described = entry.to_payload();
    match existing {
        Some(stored) if !stored.payload.user_editable => {
            let kept = &stored.payload;
            NodePayload {
                name: kept.name.clone(),
                slug: kept.slug.clone(),
                uri: kept.uri.clone(),
                secure: kept.secure,
                class: kept.class.clone(),
                user_editable: false,
                ..described
            }
        }
        _ => described.user_editable(true),
    }
}

fn scope_payload(mut payload: NodePayload, root_slug: &str) -> NodePayload {
    if payload.user_editable {
        payload.slug = scope_to_root(&payload.slug, root_slug);
    }
    payload
}

fn refresh(branch: &mut Branch, fresh: &HashMap<NodeId, TreeNode>) {
    if let Some(node) = fresh.get(&branch.node.id) {
        branch.node = node.clone();
    }
    for child in &mut branch.children {
        refresh(child, fresh);
    }
}
