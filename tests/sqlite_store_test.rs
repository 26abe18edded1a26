//! Tests for the SQLite adapter
//!
//! - database files survive reopening
//! - unique-constraint failures surface as `UniqueViolation` / `DuplicateSlug`
//! - a failure in the middle of a write rolls the whole write back
//! - custom table layouts work end to end

use std::cell::Cell;
use std::rc::Rc;

use tempfile::TempDir;

use menutree::application::services::TreeRepository;
use menutree::application::ApplicationError;
use menutree::domain::{
    Bounds, DomainError, GapShift, NodeId, NodeKey, NodePayload, TreeId, TreeNode,
};
use menutree::infrastructure::{
    NodeStore, SqliteStore, StoreError, StoreResult, StoreTransaction, TableLayout, TreeStore,
};
use menutree::util::testing::init_test_setup;

fn payload(name: &str) -> NodePayload {
    NodePayload::new(name, name.to_lowercase())
}

// ============================================================
// Failure injection
// ============================================================

/// Store whose transactions fail every `insert_node` while `armed` is set.
struct FailingStore {
    inner: SqliteStore,
    armed: Rc<Cell<bool>>,
}

struct FailingTx<'a> {
    inner: Box<dyn StoreTransaction + 'a>,
    armed: Rc<Cell<bool>>,
}

macro_rules! delegate_reads {
    ($target:ident) => {
        fn next_tree_id(&self) -> StoreResult<TreeId> {
            self.$target.next_tree_id()
        }
        fn update_payload(&self, id: NodeId, payload: &NodePayload) -> StoreResult<usize> {
            self.$target.update_payload(id, payload)
        }
        fn set_status(&self, id: NodeId, enabled: bool) -> StoreResult<usize> {
            self.$target.set_status(id, enabled)
        }
        fn delete_range(&self, tree_id: TreeId, bounds: Bounds) -> StoreResult<usize> {
            self.$target.delete_range(tree_id, bounds)
        }
        fn shift(&self, shift: &GapShift) -> StoreResult<usize> {
            self.$target.shift(shift)
        }
        fn detach_range(&self, tree_id: TreeId, bounds: Bounds) -> StoreResult<usize> {
            self.$target.detach_range(tree_id, bounds)
        }
        fn reattach(&self, tree_id: TreeId, offset: i64) -> StoreResult<usize> {
            self.$target.reattach(tree_id, offset)
        }
        fn find_by_id(&self, id: NodeId) -> StoreResult<Option<TreeNode>> {
            self.$target.find_by_id(id)
        }
        fn find_by_slug(&self, slug: &str) -> StoreResult<Option<TreeNode>> {
            self.$target.find_by_slug(slug)
        }
        fn find_root(&self, key: &NodeKey) -> StoreResult<Option<TreeNode>> {
            self.$target.find_root(key)
        }
        fn roots(&self) -> StoreResult<Vec<TreeNode>> {
            self.$target.roots()
        }
        fn slug_taken(&self, slug: &str, exclude: Option<NodeId>) -> StoreResult<bool> {
            self.$target.slug_taken(slug, exclude)
        }
        fn tree_nodes(&self, tree_id: TreeId) -> StoreResult<Vec<TreeNode>> {
            self.$target.tree_nodes(tree_id)
        }
        fn descendants(
            &self,
            node: &TreeNode,
            max_depth: Option<u32>,
            enabled_only: bool,
        ) -> StoreResult<Vec<(TreeNode, u32)>> {
            self.$target.descendants(node, max_depth, enabled_only)
        }
        fn ancestor_ids(&self, node: &TreeNode) -> StoreResult<Vec<NodeId>> {
            self.$target.ancestor_ids(node)
        }
        fn depth(&self, node: &TreeNode) -> StoreResult<u32> {
            self.$target.depth(node)
        }
    };
}

impl NodeStore for FailingStore {
    delegate_reads!(inner);

    fn insert_node(
        &self,
        tree_id: TreeId,
        bounds: Bounds,
        payload: &NodePayload,
    ) -> StoreResult<NodeId> {
        self.inner.insert_node(tree_id, bounds, payload)
    }
}

impl TreeStore for FailingStore {
    fn begin(&mut self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        let inner = self.inner.begin()?;
        Ok(Box::new(FailingTx {
            inner,
            armed: self.armed.clone(),
        }))
    }
}

impl NodeStore for FailingTx<'_> {
    delegate_reads!(inner);

    fn insert_node(
        &self,
        tree_id: TreeId,
        bounds: Bounds,
        payload: &NodePayload,
    ) -> StoreResult<NodeId> {
        if self.armed.get() {
            return Err(StoreError::io(
                "injected failure",
                std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"),
            ));
        }
        self.inner.insert_node(tree_id, bounds, payload)
    }
}

impl StoreTransaction for FailingTx<'_> {
    fn commit(self: Box<Self>) -> StoreResult<()> {
        self.inner.commit()
    }
}

fn failing_repository() -> (TreeRepository, Rc<Cell<bool>>) {
    let armed = Rc::new(Cell::new(false));
    let store = FailingStore {
        inner: SqliteStore::open_in_memory(TableLayout::default()).unwrap(),
        armed: armed.clone(),
    };
    (TreeRepository::new(Box::new(store)), armed)
}

// ============================================================
// Tests
// ============================================================

#[test]
fn given_insert_failure_after_gap_opened_when_appending_then_rolled_back() {
    init_test_setup();
    let (mut repo, armed) = failing_repository();
    let main = repo.create_root(payload("Main")).unwrap();
    let home = repo.append_child(&main, payload("Home")).unwrap();
    let before = repo.tree_nodes(main.tree_id).unwrap();

    armed.set(true);
    let err = repo.append_child(&home, payload("News")).unwrap_err();

    assert!(matches!(err, ApplicationError::StorageFailure { .. }));
    assert_eq!(repo.tree_nodes(main.tree_id).unwrap(), before);

    armed.set(false);
    let home = repo.get(&NodeKey::Id(home.id)).unwrap();
    let news = repo.append_child(&home, payload("News")).unwrap();
    assert_eq!((news.left, news.right), (3, 4));
}

#[test]
fn given_insert_failure_when_creating_root_then_no_tree_left_behind() {
    let (mut repo, armed) = failing_repository();
    armed.set(true);

    assert!(repo.create_root(payload("Main")).is_err());

    assert!(repo.roots().unwrap().is_empty());
}

#[test]
fn given_database_file_when_reopened_then_trees_persist() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("dir").join("menutree.db");

    {
        let store = SqliteStore::open(&path, TableLayout::default()).unwrap();
        let mut repo = TreeRepository::new(Box::new(store));
        let main = repo.create_root(payload("Main")).unwrap();
        repo.append_child(&main, payload("Home")).unwrap();
    }

    assert!(path.exists());
    let store = SqliteStore::open(&path, TableLayout::default()).unwrap();
    let repo = TreeRepository::new(Box::new(store));
    let main = repo.find_root(&NodeKey::from("main")).unwrap().unwrap();
    assert_eq!((main.left, main.right), (1, 4));
    repo.verify(main.tree_id).unwrap();
}

#[test]
fn given_duplicate_slug_when_inserting_directly_then_unique_violation() {
    let store = SqliteStore::open_in_memory(TableLayout::default()).unwrap();
    store.insert_node(1, Bounds::ROOT, &payload("Main")).unwrap();

    let err = store
        .insert_node(2, Bounds::ROOT, &payload("Main"))
        .unwrap_err();

    assert!(matches!(err, StoreError::UniqueViolation(_)), "{err:?}");
}

#[test]
fn given_custom_layout_when_building_tree_then_works_end_to_end() {
    let layout = TableLayout {
        table: "nav".into(),
        left: "l".into(),
        right: "r".into(),
        tree: "nav_id".into(),
    };
    let store = SqliteStore::open_in_memory(layout).unwrap();
    let mut repo = TreeRepository::new(Box::new(store));

    let main = repo.create_root(payload("Main")).unwrap();
    let home = repo.append_child(&main, payload("Home")).unwrap();
    let news = repo.append_child(&home, payload("News")).unwrap();

    assert_eq!(repo.path(&news).unwrap(), vec![main.id, home.id, news.id]);
    let main = repo.get(&NodeKey::Id(main.id)).unwrap();
    assert_eq!((main.left, main.right), (1, 6));
    assert_eq!(repo.enabled_descendants(&main, None).unwrap().len(), 2);
}

#[test]
fn given_payload_fields_when_stored_then_read_back_unchanged() {
    use menutree::domain::{Target, Visibility};

    let mut repo = TreeRepository::new(Box::new(
        SqliteStore::open_in_memory(TableLayout::default()).unwrap(),
    ));
    let main = repo.create_root(payload("Main")).unwrap();
    let mut rich = payload("Docs")
        .with_uri("https://example.org/docs")
        .with_class("external")
        .user_editable(true);
    rich.extension = Some("docs".into());
    rich.target = Target::Blank;
    rich.visibility = Visibility::LoggedIn;
    rich.secure = true;

    let stored = repo.append_child(&main, rich.clone()).unwrap();

    let read = repo.find(&NodeKey::from("docs")).unwrap().unwrap();
    assert_eq!(read, stored);
    assert_eq!(read.payload, rich);
}

#[test]
fn given_duplicate_slug_via_repository_when_store_rejects_then_duplicate_slug() {
    let (mut repo, _) = failing_repository();
    repo.create_root(payload("Main")).unwrap();

    let err = repo.create_root(payload("Main")).unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::DuplicateSlug(_))
    ));
}
