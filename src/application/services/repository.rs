//! Tree repository
//!
//! Single-node CRUD and range queries over nested-set trees. Every structural
//! mutation runs inside one store transaction: the transaction is committed
//! at the end of the happy path and rolled back on every early return, since
//! dropping an uncommitted transaction discards its changes.

use std::fmt;

use tracing::{debug, error, info, instrument};

use crate::application::{ApplicationError, ApplicationResult, StoreResultExt};
use crate::domain::nested_set::{self, append_position, check_node, plan_move, validate_tree};
use crate::domain::{
    Bounds, Branch, DomainError, GapShift, NodeId, NodeKey, NodePayload, TreeId, TreeNode,
};
use crate::infrastructure::{NodeStore, TreeStore};

/// Policy check run before a subtree is deleted. Receives the subtree root and
/// its descendants; an `Err` refuses the deletion.
pub type DeleteGuard = Box<dyn Fn(&TreeNode, &[TreeNode]) -> Result<(), String>>;

/// Guard refusing to delete subtrees that contain system-managed nodes.
pub fn protect_system_nodes() -> DeleteGuard {
    Box::new(|node, descendants| {
        match std::iter::once(node)
            .chain(descendants.iter())
            .find(|n| !n.payload.user_editable)
        {
            Some(system) => Err(format!(
                "{} contains system-managed node {}",
                node.payload.slug, system.payload.slug
            )),
            None => Ok(()),
        }
    })
}

/// Nested-set repository over a [`TreeStore`].
pub struct TreeRepository {
    store: Box<dyn TreeStore>,
    verify_writes: bool,
    delete_guard: Option<DeleteGuard>,
}

impl fmt::Debug for TreeRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeRepository")
            .field("verify_writes", &self.verify_writes)
            .field("delete_guard", &self.delete_guard.is_some())
            .finish()
    }
}

impl TreeRepository {
    /// Create a repository; post-write verification is on.
    pub fn new(store: Box<dyn TreeStore>) -> Self {
        Self {
            store,
            verify_writes: true,
            delete_guard: None,
        }
    }

    /// Toggle validation of the whole tree before each commit.
    pub fn with_verify_writes(mut self, verify: bool) -> Self {
        self.verify_writes = verify;
        self
    }

    /// Install a caller policy for [`TreeRepository::delete_subtree`].
    pub fn with_delete_guard(mut self, guard: DeleteGuard) -> Self {
        self.delete_guard = Some(guard);
        self
    }

    pub fn without_delete_guard(mut self) -> Self {
        self.delete_guard = None;
        self
    }

    // ============================================================
    // Reads
    // ============================================================

    /// Root node addressed by slug or id.
    #[instrument(level = "debug", skip(self))]
    pub fn find_root(&self, key: &NodeKey) -> ApplicationResult<Option<TreeNode>> {
        let root = self.store.find_root(key).with_store_context("find root")?;
        checked(root)
    }

    /// Any node addressed by slug or id.
    #[instrument(level = "debug", skip(self))]
    pub fn find(&self, key: &NodeKey) -> ApplicationResult<Option<TreeNode>> {
        let node = self.store.find(key).with_store_context("find node")?;
        checked(node)
    }

    /// Like [`TreeRepository::find`] but a miss is `NotFound`.
    pub fn get(&self, key: &NodeKey) -> ApplicationResult<TreeNode> {
        self.find(key)?
            .ok_or_else(|| DomainError::NotFound(key.to_string()).into())
    }

    /// All roots ordered by tree id.
    pub fn roots(&self) -> ApplicationResult<Vec<TreeNode>> {
        debug!("roots");
        let roots = self.store.roots().with_store_context("list roots")?;
        roots.iter().try_for_each(check_loudly)?;
        Ok(roots)
    }

    /// Every row of a tree in preorder.
    pub fn tree_nodes(&self, tree_id: TreeId) -> ApplicationResult<Vec<TreeNode>> {
        self.store
            .tree_nodes(tree_id)
            .with_store_context("read tree")
    }

    /// Enabled descendants with depth relative to `node`, ordered by `left`.
    /// A disabled node hides its whole subtree.
    #[instrument(level = "debug", skip(self, node), fields(node = %node))]
    pub fn enabled_descendants(
        &self,
        node: &TreeNode,
        max_depth: Option<u32>,
    ) -> ApplicationResult<Vec<(TreeNode, u32)>> {
        self.read_descendants(node, max_depth, true)
    }

    /// All descendants, enabled or not.
    #[instrument(level = "debug", skip(self, node), fields(node = %node))]
    pub fn descendants(
        &self,
        node: &TreeNode,
        max_depth: Option<u32>,
    ) -> ApplicationResult<Vec<(TreeNode, u32)>> {
        self.read_descendants(node, max_depth, false)
    }

    fn read_descendants(
        &self,
        node: &TreeNode,
        max_depth: Option<u32>,
        enabled_only: bool,
    ) -> ApplicationResult<Vec<(TreeNode, u32)>> {
        check_loudly(node)?;
        let rows = self
            .store
            .descendants(node, max_depth, enabled_only)
            .with_store_context("read descendants")?;
        rows.iter().try_for_each(|(row, _)| check_loudly(row))?;
        Ok(rows)
    }

    /// `node` and its descendants as an in-memory hierarchy.
    pub fn subtree(
        &self,
        node: &TreeNode,
        max_depth: Option<u32>,
        enabled_only: bool,
    ) -> ApplicationResult<Branch> {
        let rows = self.read_descendants(node, max_depth, enabled_only)?;
        Ok(nested_set::nest(node.clone(), rows))
    }

    /// Count of strict ancestors.
    pub fn depth(&self, node: &TreeNode) -> ApplicationResult<u32> {
        self.store.depth(node).with_store_context("compute depth")
    }

    /// Ancestor ids root first, ending with the node itself.
    pub fn path(&self, node: &TreeNode) -> ApplicationResult<Vec<NodeId>> {
        self.store
            .ancestor_ids(node)
            .with_store_context("compute path")
    }

    /// Validate the whole encoding of one tree.
    #[instrument(level = "debug", skip(self))]
    pub fn verify(&self, tree_id: TreeId) -> ApplicationResult<()> {
        let rows = self.tree_nodes(tree_id)?;
        validate_tree(tree_id, &rows).map_err(loud)?;
        Ok(())
    }

    // ============================================================
    // Writes
    // ============================================================

    /// Create a new tree holding a single root at `1..2`.
    #[instrument(level = "debug", skip(self, payload), fields(slug = %payload.slug))]
    pub fn create_root(&mut self, payload: NodePayload) -> ApplicationResult<TreeNode> {
        let tx = self.store.begin().with_store_context("begin")?;
        ensure_slug_free(&*tx, &payload.slug, None)?;

        let tree_id = tx.next_tree_id().with_store_context("allocate tree id")?;
        let id = tx
            .insert_node(tree_id, Bounds::ROOT, &payload)
            .with_store_context("insert root")?;
        verify_before_commit(&*tx, tree_id, self.verify_writes)?;
        tx.commit().with_store_context("commit")?;

        info!("Created root {} in tree {}", payload.slug, tree_id);
        Ok(TreeNode {
            id,
            tree_id,
            left: Bounds::ROOT.left,
            right: Bounds::ROOT.right,
            payload,
        })
    }

    /// Insert `payload` as the last child of `parent`.
    #[instrument(level = "debug", skip(self, parent, payload), fields(parent = %parent, slug = %payload.slug))]
    pub fn append_child(
        &mut self,
        parent: &TreeNode,
        payload: NodePayload,
    ) -> ApplicationResult<TreeNode> {
        let tx = self.store.begin().with_store_context("begin")?;
        let parent = reload(&*tx, parent.id)?;
        ensure_slug_free(&*tx, &payload.slug, None)?;

        let bounds = append_position(&parent)?;
        tx.shift(&GapShift::insert_gap(parent.tree_id, bounds.left, bounds.width()))
            .with_store_context("open gap")?;
        let id = tx
            .insert_node(parent.tree_id, bounds, &payload)
            .with_store_context("insert node")?;
        verify_before_commit(&*tx, parent.tree_id, self.verify_writes)?;
        tx.commit().with_store_context("commit")?;

        info!(
            "Appended {} under {} at {}..{}",
            payload.slug, parent.payload.slug, bounds.left, bounds.right
        );
        Ok(TreeNode {
            id,
            tree_id: parent.tree_id,
            left: bounds.left,
            right: bounds.right,
            payload,
        })
    }

    /// Remove `node` and every descendant, then close the gap.
    /// Returns the number of deleted rows.
    #[instrument(level = "debug", skip(self, node), fields(node = %node))]
    pub fn delete_subtree(&mut self, node: &TreeNode) -> ApplicationResult<usize> {
        let tx = self.store.begin().with_store_context("begin")?;
        let node = reload(&*tx, node.id)?;

        if let Some(guard) = &self.delete_guard {
            let below: Vec<TreeNode> = tx
                .descendants(&node, None, false)
                .with_store_context("read descendants")?
                .into_iter()
                .map(|(n, _)| n)
                .collect();
            guard(&node, &below).map_err(DomainError::ConstraintViolation)?;
        }

        let bounds = node.bounds();
        let deleted = tx
            .delete_range(node.tree_id, bounds)
            .with_store_context("delete range")?;
        tx.shift(&GapShift::close_gap(node.tree_id, bounds.left, bounds.width()))
            .with_store_context("close gap")?;
        verify_before_commit(&*tx, node.tree_id, self.verify_writes)?;
        tx.commit().with_store_context("commit")?;

        info!("Deleted {} ({} rows)", node.payload.slug, deleted);
        Ok(deleted)
    }

    /// Replace the payload of a node. Coordinates are untouched.
    #[instrument(level = "debug", skip(self, payload), fields(slug = %payload.slug))]
    pub fn update(&mut self, id: NodeId, payload: NodePayload) -> ApplicationResult<TreeNode> {
        let tx = self.store.begin().with_store_context("begin")?;
        let mut node = reload(&*tx, id)?;
        ensure_slug_free(&*tx, &payload.slug, Some(id))?;

        tx.update_payload(id, &payload)
            .with_store_context("update node")?;
        tx.commit().with_store_context("commit")?;

        info!("Updated {}", payload.slug);
        node.payload = payload;
        Ok(node)
    }

    /// Enable or disable a single node. Disabling hides the subtree from
    /// enabled traversal without touching the descendants' own flags.
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> ApplicationResult<TreeNode> {
        debug!("set_enabled: id={}, enabled={}", id, enabled);
        let tx = self.store.begin().with_store_context("begin")?;
        let mut node = reload(&*tx, id)?;
        tx.set_status(id, enabled)
            .with_store_context("update status")?;
        tx.commit().with_store_context("commit")?;

        info!(
            "{} {}",
            if enabled { "Enabled" } else { "Disabled" },
            node.payload.slug
        );
        node.payload.enabled = enabled;
        Ok(node)
    }

    /// Relocate `node` with its subtree to the last-child slot of `parent`.
    #[instrument(level = "debug", skip(self, node, parent), fields(node = %node, parent = %parent))]
    pub fn move_to_last_child(
        &mut self,
        node: &TreeNode,
        parent: &TreeNode,
    ) -> ApplicationResult<TreeNode> {
        let tx = self.store.begin().with_store_context("begin")?;
        let node = reload(&*tx, node.id)?;
        let parent = reload(&*tx, parent.id)?;

        let plan = plan_move(&node, &parent)?;
        if plan.is_noop() {
            debug!("move_to_last_child: {} already in place", node.payload.slug);
            return Ok(node);
        }

        tx.detach_range(plan.tree_id, plan.source)
            .with_store_context("detach subtree")?;
        tx.shift(&plan.close).with_store_context("close gap")?;
        tx.shift(&plan.open).with_store_context("open gap")?;
        tx.reattach(plan.tree_id, plan.offset)
            .with_store_context("reattach subtree")?;
        verify_before_commit(&*tx, plan.tree_id, self.verify_writes)?;
        let moved = reload(&*tx, node.id)?;
        tx.commit().with_store_context("commit")?;

        info!(
            "Moved {} under {} ({}..{})",
            moved.payload.slug, parent.payload.slug, moved.left, moved.right
        );
        Ok(moved)
    }
}

fn loud(err: DomainError) -> ApplicationError {
    if let DomainError::CorruptTree { tree_id, reason } = &err {
        error!("Corrupt tree {}: {}", tree_id, reason);
    }
    ApplicationError::Domain(err)
}

fn check_loudly(node: &TreeNode) -> ApplicationResult<()> {
    check_node(node).map_err(loud)
}

fn checked(node: Option<TreeNode>) -> ApplicationResult<Option<TreeNode>> {
    if let Some(n) = &node {
        check_loudly(n)?;
    }
    Ok(node)
}

fn reload<S: NodeStore + ?Sized>(store: &S, id: NodeId) -> ApplicationResult<TreeNode> {
    let node = store
        .find_by_id(id)
        .with_store_context("reload node")?
        .ok_or_else(|| DomainError::NotFound(NodeKey::Id(id).to_string()))?;
    check_loudly(&node)?;
    Ok(node)
}

fn ensure_slug_free<S: NodeStore + ?Sized>(
    store: &S,
    slug: &str,
    exclude: Option<NodeId>,
) -> ApplicationResult<()> {
    if store
        .slug_taken(slug, exclude)
        .with_store_context("check slug")?
    {
        return Err(DomainError::DuplicateSlug(slug.to_string()).into());
    }
    Ok(())
}

fn verify_before_commit<S: NodeStore + ?Sized>(
    store: &S,
    tree_id: TreeId,
    enabled: bool,
) -> ApplicationResult<()> {
    if !enabled {
        return Ok(());
    }
    let rows = store
        .tree_nodes(tree_id)
        .with_store_context("verify tree")?;
    validate_tree(tree_id, &rows).map_err(loud)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: NodeId, slug: &str, user_editable: bool) -> TreeNode {
        TreeNode {
            id,
            tree_id: 1,
            left: 2,
            right: 3,
            payload: NodePayload::new(slug, slug).user_editable(user_editable),
        }
    }

    #[test]
    fn given_only_user_nodes_when_guarding_then_allows_delete() {
        let guard = protect_system_nodes();
        let root = node(1, "custom", true);
        let below = vec![node(2, "custom-child", true)];

        assert!(guard(&root, &below).is_ok());
    }

    #[test]
    fn given_system_descendant_when_guarding_then_refuses_delete() {
        let guard = protect_system_nodes();
        let root = node(1, "custom", true);
        let below = vec![node(2, "dashboard", false)];

        let err = guard(&root, &below).unwrap_err();
        assert!(err.contains("dashboard"));
    }

    #[test]
    fn given_corrupt_bounds_when_checking_then_error() {
        let mut bad = node(1, "bad", true);
        bad.right = bad.left;

        let err = checked(Some(bad)).unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::CorruptTree { .. })
        ));
    }
}
