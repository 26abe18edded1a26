//! SQLite implementation of the storage traits.

use std::path::Path;

use rusqlite::types::{ToSqlOutput, Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row, ToSql, Transaction};
use tracing::{debug, instrument};

use crate::domain::{
    Bounds, GapShift, NodeId, NodeKey, NodePayload, Target, TreeId, TreeNode, Visibility,
};
use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::sql::{Dialect, Query, QueryBuilder, SqlArg, TableLayout};
use crate::infrastructure::traits::{NodeStore, StoreTransaction, TreeStore};

impl ToSql for SqlArg {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlArg::Int(v) => ToSqlOutput::from(*v),
            SqlArg::Text(s) => ToSqlOutput::from(s.as_str()),
            SqlArg::Null => ToSqlOutput::Owned(Value::Null),
        })
    }
}

/// SQLite-backed node table.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    builder: QueryBuilder,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the table exists.
    pub fn open(path: &Path, layout: TableLayout) -> StoreResult<Self> {
        debug!("open: path={}", path.display());
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::io(format!("create {}", parent.display()), e)
                })?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::with_connection(conn, layout)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory(layout: TableLayout) -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, layout)
    }

    fn with_connection(conn: Connection, layout: TableLayout) -> StoreResult<Self> {
        let store = Self {
            conn,
            builder: QueryBuilder::new(Dialect::Sqlite, layout),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> StoreResult<()> {
        let layout = self.builder.layout();
        let q = |ident: &str| Dialect::Sqlite.quote(ident);
        self.conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
              "id" INTEGER PRIMARY KEY AUTOINCREMENT,
              {tree} INTEGER NOT NULL,
              {left} INTEGER NOT NULL,
              {right} INTEGER NOT NULL,
              "extension" TEXT,
              "name" TEXT NOT NULL,
              "slug" TEXT NOT NULL UNIQUE,
              "uri" TEXT,
              "target" INTEGER NOT NULL DEFAULT 0,
              "visibility" INTEGER NOT NULL DEFAULT 0,
              "secure" INTEGER NOT NULL DEFAULT 0,
              "user_editable" INTEGER NOT NULL DEFAULT 0,
              "class" TEXT NOT NULL DEFAULT '',
              "status" INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS {index} ON {table}({tree}, {left});
            "#,
            table = q(&layout.table),
            tree = q(&layout.tree),
            left = q(&layout.left),
            right = q(&layout.right),
            index = q(&format!("idx_{}_tree_left", layout.table)),
        ))?;
        Ok(())
    }
}

/// Open transaction on a [`SqliteStore`].
pub struct SqliteTx<'c> {
    tx: Transaction<'c>,
    builder: &'c QueryBuilder,
}

impl TreeStore for SqliteStore {
    fn begin(&mut self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        let tx = self.conn.transaction()?;
        Ok(Box::new(SqliteTx {
            tx,
            builder: &self.builder,
        }))
    }
}

impl StoreTransaction for SqliteTx<'_> {
    fn commit(self: Box<Self>) -> StoreResult<()> {
        let SqliteTx { tx, .. } = *self;
        tx.commit()?;
        Ok(())
    }
}

/// Anything that can hand out a connection and a query builder gets the
/// whole [`NodeStore`] surface.
pub trait SqlBackend {
    fn conn(&self) -> &Connection;
    fn builder(&self) -> &QueryBuilder;
}

impl SqlBackend for SqliteStore {
    fn conn(&self) -> &Connection {
        &self.conn
    }

    fn builder(&self) -> &QueryBuilder {
        &self.builder
    }
}

impl SqlBackend for SqliteTx<'_> {
    fn conn(&self) -> &Connection {
        &self.tx
    }

    fn builder(&self) -> &QueryBuilder {
        self.builder
    }
}

fn flag(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(row.get::<_, i64>(idx)? != 0)
}

fn invalid(idx: usize, column: &'static str, value: i64) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Integer,
        Box::new(StoreError::InvalidValue { column, value }),
    )
}

/// Map a row projected with `NODE_COLUMNS`.
fn row_to_node(row: &Row<'_>) -> rusqlite::Result<TreeNode> {
    let target_code: i64 = row.get(8)?;
    let visibility_code: i64 = row.get(9)?;
    Ok(TreeNode {
        id: row.get(0)?,
        tree_id: row.get(1)?,
        left: row.get(2)?,
        right: row.get(3)?,
        payload: NodePayload {
            extension: row.get(4)?,
            name: row.get(5)?,
            slug: row.get(6)?,
            uri: row.get(7)?,
            target: Target::from_code(target_code)
                .ok_or_else(|| invalid(8, "target", target_code))?,
            visibility: Visibility::from_code(visibility_code)
                .ok_or_else(|| invalid(9, "visibility", visibility_code))?,
            secure: flag(row, 10)?,
            user_editable: flag(row, 11)?,
            class: row.get(12)?,
            enabled: flag(row, 13)?,
        },
    })
}

fn row_to_node_with_depth(row: &Row<'_>) -> rusqlite::Result<(TreeNode, u32)> {
    let depth: i64 = row.get(14)?;
    Ok((row_to_node(row)?, depth.max(0) as u32))
}

impl<T: SqlBackend> NodeStore for T {
    #[instrument(level = "trace", skip(self))]
    fn next_tree_id(&self) -> StoreResult<TreeId> {
        scalar(self.conn(), &self.builder().next_tree_id())
    }

    #[instrument(level = "trace", skip(self, payload), fields(slug = %payload.slug))]
    fn insert_node(
        &self,
        tree_id: TreeId,
        bounds: Bounds,
        payload: &NodePayload,
    ) -> StoreResult<NodeId> {
        execute(self.conn(), &self.builder().insert_node(tree_id, bounds, payload))?;
        Ok(self.conn().last_insert_rowid())
    }

    #[instrument(level = "trace", skip(self, payload))]
    fn update_payload(&self, id: NodeId, payload: &NodePayload) -> StoreResult<usize> {
        execute(self.conn(), &self.builder().update_payload(id, payload))
    }

    #[instrument(level = "trace", skip(self))]
    fn set_status(&self, id: NodeId, enabled: bool) -> StoreResult<usize> {
        execute(self.conn(), &self.builder().set_status(id, enabled))
    }

    #[instrument(level = "trace", skip(self))]
    fn delete_range(&self, tree_id: TreeId, bounds: Bounds) -> StoreResult<usize> {
        execute(self.conn(), &self.builder().delete_range(tree_id, bounds))
    }

    #[instrument(level = "trace", skip(self))]
    fn shift(&self, shift: &GapShift) -> StoreResult<usize> {
        execute(self.conn(), &self.builder().shift(shift))
    }

    #[instrument(level = "trace", skip(self))]
    fn detach_range(&self, tree_id: TreeId, bounds: Bounds) -> StoreResult<usize> {
        execute(self.conn(), &self.builder().detach_range(tree_id, bounds))
    }

    #[instrument(level = "trace", skip(self))]
    fn reattach(&self, tree_id: TreeId, offset: i64) -> StoreResult<usize> {
        execute(self.conn(), &self.builder().reattach(tree_id, offset))
    }

    #[instrument(level = "trace", skip(self))]
    fn find_by_id(&self, id: NodeId) -> StoreResult<Option<TreeNode>> {
        query_one(self.conn(), &self.builder().select_by_id(id))
    }

    #[instrument(level = "trace", skip(self))]
    fn find_by_slug(&self, slug: &str) -> StoreResult<Option<TreeNode>> {
        query_one(self.conn(), &self.builder().select_by_slug(slug))
    }

    #[instrument(level = "trace", skip(self))]
    fn find_root(&self, key: &NodeKey) -> StoreResult<Option<TreeNode>> {
        query_one(self.conn(), &self.builder().select_root(key))
    }

    #[instrument(level = "trace", skip(self))]
    fn roots(&self) -> StoreResult<Vec<TreeNode>> {
        query_all(self.conn(), &self.builder().select_roots(), row_to_node)
    }

    #[instrument(level = "trace", skip(self))]
    fn slug_taken(&self, slug: &str, exclude: Option<NodeId>) -> StoreResult<bool> {
        let count: i64 = scalar(self.conn(), &self.builder().slug_taken(slug, exclude))?;
        Ok(count > 0)
    }

    #[instrument(level = "trace", skip(self))]
    fn tree_nodes(&self, tree_id: TreeId) -> StoreResult<Vec<TreeNode>> {
        query_all(self.conn(), &self.builder().select_tree(tree_id), row_to_node)
    }

    #[instrument(level = "trace", skip(self, node), fields(node = node.id))]
    fn descendants(
        &self,
        node: &TreeNode,
        max_depth: Option<u32>,
        enabled_only: bool,
    ) -> StoreResult<Vec<(TreeNode, u32)>> {
        query_all(
            self.conn(),
            &self.builder().descendants(node, max_depth, enabled_only),
            row_to_node_with_depth,
        )
    }

    #[instrument(level = "trace", skip(self, node), fields(node = node.id))]
    fn ancestor_ids(&self, node: &TreeNode) -> StoreResult<Vec<NodeId>> {
        query_all(self.conn(), &self.builder().ancestor_ids(node), |row| row.get(0))
    }

    #[instrument(level = "trace", skip(self, node), fields(node = node.id))]
    fn depth(&self, node: &TreeNode) -> StoreResult<u32> {
        let depth: i64 = scalar(self.conn(), &self.builder().depth(node))?;
        Ok(depth.max(0) as u32)
    }
}

fn execute(conn: &Connection, query: &Query) -> StoreResult<usize> {
    let mut stmt = conn.prepare_cached(&query.sql)?;
    Ok(stmt.execute(params_from_iter(query.args.iter()))?)
}

fn scalar<V: rusqlite::types::FromSql>(conn: &Connection, query: &Query) -> StoreResult<V> {
    let mut stmt = conn.prepare_cached(&query.sql)?;
    Ok(stmt.query_row(params_from_iter(query.args.iter()), |row| row.get(0))?)
}

fn query_one(conn: &Connection, query: &Query) -> StoreResult<Option<TreeNode>> {
    let mut stmt = conn.prepare_cached(&query.sql)?;
    Ok(stmt
        .query_row(params_from_iter(query.args.iter()), row_to_node)
        .optional()?)
}

fn query_all<V>(
    conn: &Connection,
    query: &Query,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<V>,
) -> StoreResult<Vec<V>> {
    let mut stmt = conn.prepare_cached(&query.sql)?;
    let rows = stmt.query_map(params_from_iter(query.args.iter()), map)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
