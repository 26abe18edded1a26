//! Storage boundary traits
//!
//! These traits describe the relational surface the tree engine needs:
//! range-predicate selects, threshold updates scoped by tree, and
//! transactions. Services only see these traits, so tests can swap the
//! backend.

use crate::domain::{Bounds, GapShift, NodeId, NodeKey, NodePayload, TreeId, TreeNode};
use crate::infrastructure::error::StoreResult;

/// Row-level reads and writes against the node table.
pub trait NodeStore {
    /// Smallest unused tree id.
    fn next_tree_id(&self) -> StoreResult<TreeId>;

    /// Insert a row at the given coordinates and return its id.
    fn insert_node(&self, tree_id: TreeId, bounds: Bounds, payload: &NodePayload)
        -> StoreResult<NodeId>;

    /// Overwrite the payload columns of a row.
    fn update_payload(&self, id: NodeId, payload: &NodePayload) -> StoreResult<usize>;

    /// Flip the enabled flag of a single row.
    fn set_status(&self, id: NodeId, enabled: bool) -> StoreResult<usize>;

    /// Delete every row whose `left` lies inside `bounds`.
    fn delete_range(&self, tree_id: TreeId, bounds: Bounds) -> StoreResult<usize>;

    /// Bulk threshold update of `left` and `right`.
    fn shift(&self, shift: &GapShift) -> StoreResult<usize>;

    /// Negate the coordinates of every row inside `bounds`.
    fn detach_range(&self, tree_id: TreeId, bounds: Bounds) -> StoreResult<usize>;

    /// Restore negated rows shifted by `offset`.
    fn reattach(&self, tree_id: TreeId, offset: i64) -> StoreResult<usize>;

    fn find_by_id(&self, id: NodeId) -> StoreResult<Option<TreeNode>>;

    fn find_by_slug(&self, slug: &str) -> StoreResult<Option<TreeNode>>;

    /// Root (`left = 1`) addressed by id or slug.
    fn find_root(&self, key: &NodeKey) -> StoreResult<Option<TreeNode>>;

    /// Every root, ordered by tree id.
    fn roots(&self) -> StoreResult<Vec<TreeNode>>;

    /// Whether `slug` is used by any row other than `exclude`.
    fn slug_taken(&self, slug: &str, exclude: Option<NodeId>) -> StoreResult<bool>;

    /// Every row of a tree in preorder.
    fn tree_nodes(&self, tree_id: TreeId) -> StoreResult<Vec<TreeNode>>;

    /// Descendants of `node` with their depth relative to it, in preorder.
    fn descendants(
        &self,
        node: &TreeNode,
        max_depth: Option<u32>,
        enabled_only: bool,
    ) -> StoreResult<Vec<(TreeNode, u32)>>;

    /// Ids of the rows containing `node`, root first, the node last.
    fn ancestor_ids(&self, node: &TreeNode) -> StoreResult<Vec<NodeId>>;

    /// Count of strict ancestors.
    fn depth(&self, node: &TreeNode) -> StoreResult<u32>;

    /// Any row addressed by id or slug.
    fn find(&self, key: &NodeKey) -> StoreResult<Option<TreeNode>> {
        match key {
            NodeKey::Id(id) => self.find_by_id(*id),
            NodeKey::Slug(slug) => self.find_by_slug(slug),
        }
    }
}

/// An open transaction. Dropping it without [`StoreTransaction::commit`]
/// rolls every change back.
pub trait StoreTransaction: NodeStore {
    fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// A store that can open transactions.
pub trait TreeStore: NodeStore {
    fn begin(&mut self) -> StoreResult<Box<dyn StoreTransaction + '_>>;
}
