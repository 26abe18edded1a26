//! Nested-set codec: pure arithmetic over `(left, right, tree_id)` triples.
//!
//! Nothing in here touches storage. The repository asks the codec *what* to
//! shift and validates what it reads back; the storage adapter only executes
//! the resulting threshold updates.

use crate::domain::entities::{Branch, TreeId, TreeNode};
use crate::domain::error::{DomainError, DomainResult};

/// Half-open description of a node's subtree range: `left < right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub left: i64,
    pub right: i64,
}

impl Bounds {
    /// Coordinates of a freshly created root.
    pub const ROOT: Bounds = Bounds { left: 1, right: 2 };

    pub fn new(left: i64, right: i64) -> Self {
        Self { left, right }
    }

    /// Number of coordinates the range occupies (`2 * node_count`).
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// `self.left < other.left AND other.right < self.right`
    pub fn strictly_contains(&self, other: &Bounds) -> bool {
        self.left < other.left && other.right < self.right
    }

    /// Reject coordinates no valid tree can produce.
    pub fn check(&self, tree_id: TreeId) -> DomainResult<()> {
        if self.left < 1 {
            return Err(DomainError::corrupt(
                tree_id,
                format!("left {} below 1", self.left),
            ));
        }
        if self.left >= self.right {
            return Err(DomainError::corrupt(
                tree_id,
                format!("left {} >= right {}", self.left, self.right),
            ));
        }
        if (self.right - self.left) % 2 == 0 {
            return Err(DomainError::corrupt(
                tree_id,
                format!("even span {}..{}", self.left, self.right),
            ));
        }
        Ok(())
    }
}

/// Shorthand for `node.bounds().check(node.tree_id)`.
pub fn check_node(node: &TreeNode) -> DomainResult<()> {
    node.bounds().check(node.tree_id)
}

/// Depth of `node` within `rows`: the count of its strict ancestors.
pub fn depth(node: &TreeNode, rows: &[TreeNode]) -> u32 {
    rows.iter().filter(|r| r.is_ancestor_of(node)).count() as u32
}

/// Threshold shift applied to one tree: every `left >= threshold` and every
/// `right >= threshold` moves by `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapShift {
    pub tree_id: TreeId,
    pub threshold: i64,
    pub delta: i64,
}

impl GapShift {
    /// Open `width` coordinates starting at `at_left`.
    pub fn insert_gap(tree_id: TreeId, at_left: i64, width: i64) -> Self {
        Self {
            tree_id,
            threshold: at_left,
            delta: width,
        }
    }

    /// Close the `width` coordinates that started at `from_left`.
    pub fn close_gap(tree_id: TreeId, from_left: i64, width: i64) -> Self {
        Self {
            tree_id,
            threshold: from_left + width,
            delta: -width,
        }
    }

    pub fn shift(&self, value: i64) -> i64 {
        if value >= self.threshold {
            value + self.delta
        } else {
            value
        }
    }

    /// In-memory form of the bulk update the store executes.
    pub fn apply(&self, nodes: &mut [TreeNode]) {
        for node in nodes.iter_mut().filter(|n| n.tree_id == self.tree_id) {
            node.left = self.shift(node.left);
            node.right = self.shift(node.right);
        }
    }
}

/// Position of a new last child of `parent`.
pub fn append_position(parent: &TreeNode) -> DomainResult<Bounds> {
    check_node(parent)?;
    Ok(Bounds::new(parent.right, parent.right + 1))
}

/// Relocation of a subtree to the last-child slot of another node.
///
/// Applied as: detach the source range (negate it), close its gap, open a gap
/// at `open.threshold`, reattach the detached rows shifted by `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    pub tree_id: TreeId,
    pub source: Bounds,
    pub close: GapShift,
    pub open: GapShift,
    pub offset: i64,
}

impl MovePlan {
    pub fn is_noop(&self) -> bool {
        self.offset == 0
    }

    /// In-memory form of the move.
    pub fn apply(&self, nodes: &mut [TreeNode]) {
        let (moving, rest): (Vec<_>, Vec<_>) = nodes
            .iter_mut()
            .filter(|n| n.tree_id == self.tree_id)
            .partition(|n| n.left >= self.source.left && n.right <= self.source.right);
        for node in rest {
            node.left = self.open.shift(self.close.shift(node.left));
            node.right = self.open.shift(self.close.shift(node.right));
        }
        for node in moving {
            node.left += self.offset;
            node.right += self.offset;
        }
    }
}

/// Plan moving `node` (with its subtree) to become the last child of `parent`.
pub fn plan_move(node: &TreeNode, parent: &TreeNode) -> DomainResult<MovePlan> {
    check_node(node)?;
    check_node(parent)?;
    if node.tree_id != parent.tree_id {
        return Err(DomainError::ConstraintViolation(format!(
            "cannot move {} across trees ({} -> {})",
            node.payload.slug, node.tree_id, parent.tree_id
        )));
    }
    if node.is_root() {
        return Err(DomainError::ConstraintViolation(format!(
            "cannot move root {}",
            node.payload.slug
        )));
    }
    if node.id == parent.id || node.is_ancestor_of(parent) {
        return Err(DomainError::ConstraintViolation(format!(
            "cannot move {} below itself ({})",
            node.payload.slug, parent.payload.slug
        )));
    }

    let width = node.bounds().width();
    let close = GapShift::close_gap(node.tree_id, node.left, width);
    let target = close.shift(parent.right);
    let open = GapShift::insert_gap(node.tree_id, target, width);

    Ok(MovePlan {
        tree_id: node.tree_id,
        source: node.bounds(),
        close,
        open,
        offset: target - node.left,
    })
}

/// Verify a whole tree: one root, proper nesting, endpoints exactly `1..=2n`.
pub fn validate_tree(tree_id: TreeId, nodes: &[TreeNode]) -> DomainResult<()> {
    if nodes.is_empty() {
        return Ok(());
    }

    let mut roots = 0;
    for node in nodes {
        if node.tree_id != tree_id {
            return Err(DomainError::corrupt(
                tree_id,
                format!("node {} belongs to tree {}", node.id, node.tree_id),
            ));
        }
        node.bounds().check(tree_id)?;
        if node.is_root() {
            roots += 1;
        }
    }
    if roots != 1 {
        return Err(DomainError::corrupt(
            tree_id,
            format!("expected exactly one root, found {roots}"),
        ));
    }

    let max = 2 * nodes.len() as i64;
    let mut seen = vec![false; max as usize + 1];
    for node in nodes {
        for value in [node.left, node.right] {
            if value > max {
                return Err(DomainError::corrupt(
                    tree_id,
                    format!("coordinate {value} exceeds {max} (node {})", node.id),
                ));
            }
            if std::mem::replace(&mut seen[value as usize], true) {
                return Err(DomainError::corrupt(
                    tree_id,
                    format!("coordinate {value} used twice (node {})", node.id),
                ));
            }
        }
    }

    let mut ordered: Vec<&TreeNode> = nodes.iter().collect();
    ordered.sort_by_key(|n| n.left);
    let mut open: Vec<&TreeNode> = Vec::new();
    for node in ordered {
        while open.last().is_some_and(|top| top.right < node.left) {
            open.pop();
        }
        if let Some(parent) = open.last() {
            if node.right > parent.right {
                return Err(DomainError::corrupt(
                    tree_id,
                    format!(
                        "node {} ({}..{}) overlaps node {} ({}..{})",
                        node.id, node.left, node.right, parent.id, parent.left, parent.right
                    ),
                ));
            }
        }
        open.push(node);
    }

    Ok(())
}

/// Rebuild a hierarchy from preorder rows `(node, depth)` below `root`.
/// Rows outside the root's range are ignored.
pub fn nest(root: TreeNode, rows: Vec<(TreeNode, u32)>) -> Branch {
    let root_bounds = root.bounds();
    let mut stack = vec![Branch::leaf(root, 0)];

    for (node, depth) in rows {
        if !root_bounds.strictly_contains(&node.bounds()) {
            continue;
        }
        while stack.len() > 1 {
            let top = &stack[stack.len() - 1];
            if top.node.bounds().strictly_contains(&node.bounds()) {
                break;
            }
            fold_top(&mut stack);
        }
        stack.push(Branch::leaf(node, depth));
    }
    while stack.len() > 1 {
        fold_top(&mut stack);
    }

    stack.remove(0)
}

fn fold_top(stack: &mut Vec<Branch>) {
    if let Some(done) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(done);
        }
    }
}
