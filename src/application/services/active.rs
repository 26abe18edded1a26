//! Active-path resolver
//!
//! Request-scoped memo of the "current" node and its ancestor chain, used by
//! presentation code for breadcrumbs and highlighting. Create one per request.

use tracing::debug;

use crate::application::services::TreeRepository;
use crate::application::ApplicationResult;
use crate::domain::{NodeId, NodeKey, TreeNode};

#[derive(Debug, Clone, Default)]
enum ActiveState {
    #[default]
    Unset,
    Pending(NodeKey),
    Resolved {
        node: TreeNode,
        path: Vec<NodeId>,
    },
    Missing,
}

/// Lazily resolved active node.
#[derive(Debug)]
pub struct ActiveMenu<'r> {
    repo: &'r TreeRepository,
    state: ActiveState,
}

impl<'r> ActiveMenu<'r> {
    pub fn new(repo: &'r TreeRepository) -> Self {
        Self {
            repo,
            state: ActiveState::Unset,
        }
    }

    /// Remember `key` for later resolution. No query is issued.
    pub fn set_active(&mut self, key: impl Into<NodeKey>) {
        let key = key.into();
        debug!("set_active: {}", key);
        self.state = ActiveState::Pending(key);
    }

    /// The active node. The first call after [`ActiveMenu::set_active`]
    /// resolves it and its path; later calls are served from the memo.
    /// A storage failure leaves the key pending so the lookup can be retried.
    pub fn active(&mut self) -> ApplicationResult<Option<&TreeNode>> {
        self.resolve()?;
        Ok(match &self.state {
            ActiveState::Resolved { node, .. } => Some(node),
            _ => None,
        })
    }

    /// Ancestor ids of the active node, root first and the node last. Empty
    /// when nothing is active or the lookup missed.
    pub fn active_path(&mut self) -> ApplicationResult<&[NodeId]> {
        self.resolve()?;
        Ok(match &self.state {
            ActiveState::Resolved { path, .. } => path.as_slice(),
            _ => &[],
        })
    }

    /// Whether `id` lies on the active path.
    pub fn is_active(&mut self, id: NodeId) -> ApplicationResult<bool> {
        Ok(self.active_path()?.contains(&id))
    }

    /// Forget the active node so the context can be reused.
    pub fn reset(&mut self) {
        self.state = ActiveState::Unset;
    }

    fn resolve(&mut self) -> ApplicationResult<()> {
        let ActiveState::Pending(key) = &self.state else {
            return Ok(());
        };
        let next = match self.repo.find(key)? {
            Some(node) => {
                let path = self.repo.path(&node)?;
                debug!("resolve: {} with path {:?}", node, path);
                ActiveState::Resolved { node, path }
            }
            None => {
                debug!("resolve: {} not found", key);
                ActiveState::Missing
            }
        };
        self.state = next;
        Ok(())
    }
}
