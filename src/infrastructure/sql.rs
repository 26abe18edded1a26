//! Parameterized SQL for the nested-set table.
//!
//! Every statement is generated from a [`TableLayout`] (which table, which
//! columns hold `left`/`right`/`tree`) and a [`Dialect`] (identifier quoting,
//! placeholders). Arguments travel next to the text in a [`Query`] so
//! adapters only bind and execute.

use serde::{Deserialize, Serialize};

use crate::domain::{Bounds, GapShift, NodeId, NodeKey, NodePayload, TreeId, TreeNode};

/// SQL flavour to render for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Mysql,
}

impl Dialect {
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Dialect::Sqlite => format!("\"{ident}\""),
            Dialect::Mysql => format!("`{ident}`"),
        }
    }
}

/// Names of the table and of the nested-set columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLayout {
    pub table: String,
    pub left: String,
    pub right: String,
    pub tree: String,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            table: "menus".into(),
            left: "lft".into(),
            right: "rgt".into(),
            tree: "menu_id".into(),
        }
    }
}

/// A bound argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlArg {
    Int(i64),
    Text(String),
    Null,
}

impl SqlArg {
    pub fn text(value: &str) -> Self {
        SqlArg::Text(value.to_string())
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(SqlArg::Null, SqlArg::text)
    }

    pub fn flag(value: bool) -> Self {
        SqlArg::Int(i64::from(value))
    }
}

/// Statement text plus its positional arguments in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub sql: String,
    pub args: Vec<SqlArg>,
}

impl Query {
    fn new(sql: String, args: Vec<SqlArg>) -> Self {
        debug_assert_eq!(sql.matches('?').count(), args.len());
        Self { sql, args }
    }
}

/// Column order every node projection uses. Adapters map rows by index.
pub const NODE_COLUMNS: [&str; 14] = [
    "id",
    "{tree}",
    "{left}",
    "{right}",
    "extension",
    "name",
    "slug",
    "uri",
    "target",
    "visibility",
    "secure",
    "user_editable",
    "class",
    "status",
];

/// Builds nested-set statements for one layout and dialect.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    dialect: Dialect,
    layout: TableLayout,
}

impl QueryBuilder {
    pub fn new(dialect: Dialect, layout: TableLayout) -> Self {
        Self { dialect, layout }
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    fn q(&self, ident: &str) -> String {
        self.dialect.quote(ident)
    }

    fn column_name<'a>(&'a self, name: &'a str) -> &'a str {
        match name {
            "{tree}" => &self.layout.tree,
            "{left}" => &self.layout.left,
            "{right}" => &self.layout.right,
            other => other,
        }
    }

    fn table(&self) -> String {
        self.q(&self.layout.table)
    }

    fn left(&self) -> String {
        self.q(&self.layout.left)
    }

    fn right(&self) -> String {
        self.q(&self.layout.right)
    }

    fn tree(&self) -> String {
        self.q(&self.layout.tree)
    }

    /// `alias.col` with quoting.
    fn col(&self, alias: &str, name: &str) -> String {
        format!("{}.{}", self.q(alias), self.q(self.column_name(name)))
    }

    /// Projection of [`NODE_COLUMNS`], optionally qualified by `alias`.
    pub fn node_columns(&self, alias: Option<&str>) -> String {
        NODE_COLUMNS
            .iter()
            .map(|c| match alias {
                Some(a) => self.col(a, c),
                None => self.q(self.column_name(c)),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn select_nodes_where(&self, condition: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {}",
            self.node_columns(None),
            self.table(),
            condition
        )
    }

    pub fn select_by_id(&self, id: NodeId) -> Query {
        Query::new(
            self.select_nodes_where(&format!("{} = ?", self.q("id"))),
            vec![SqlArg::Int(id)],
        )
    }

    pub fn select_by_slug(&self, slug: &str) -> Query {
        Query::new(
            self.select_nodes_where(&format!("{} = ?", self.q("slug"))),
            vec![SqlArg::text(slug)],
        )
    }

    pub fn select_root(&self, key: &NodeKey) -> Query {
        let (column, arg) = match key {
            NodeKey::Id(id) => ("id", SqlArg::Int(*id)),
            NodeKey::Slug(slug) => ("slug", SqlArg::text(slug)),
        };
        Query::new(
            self.select_nodes_where(&format!("{} = 1 AND {} = ?", self.left(), self.q(column))),
            vec![arg],
        )
    }

    pub fn select_roots(&self) -> Query {
        Query::new(
            format!(
                "{} ORDER BY {}",
                self.select_nodes_where(&format!("{} = 1", self.left())),
                self.tree()
            ),
            vec![],
        )
    }

    /// All rows of one tree in preorder.
    pub fn select_tree(&self, tree_id: TreeId) -> Query {
        Query::new(
            format!(
                "{} ORDER BY {}",
                self.select_nodes_where(&format!("{} = ?", self.tree())),
                self.left()
            ),
            vec![SqlArg::Int(tree_id)],
        )
    }

    pub fn slug_taken(&self, slug: &str, exclude: Option<NodeId>) -> Query {
        let mut sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            self.table(),
            self.q("slug")
        );
        let mut args = vec![SqlArg::text(slug)];
        if let Some(id) = exclude {
            sql.push_str(&format!(" AND {} <> ?", self.q("id")));
            args.push(SqlArg::Int(id));
        }
        Query::new(sql, args)
    }

    pub fn next_tree_id(&self) -> Query {
        Query::new(
            format!("SELECT COALESCE(MAX({}), 0) + 1 FROM {}", self.tree(), self.table()),
            vec![],
        )
    }

    pub fn insert_node(&self, tree_id: TreeId, bounds: Bounds, payload: &NodePayload) -> Query {
        let columns = NODE_COLUMNS[1..]
            .iter()
            .map(|c| self.q(self.column_name(c)))
            .collect::<Vec<_>>();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let mut args = vec![
            SqlArg::Int(tree_id),
            SqlArg::Int(bounds.left),
            SqlArg::Int(bounds.right),
        ];
        args.extend(payload_args(payload));
        Query::new(
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table(),
                columns.join(", "),
                placeholders
            ),
            args,
        )
    }

    pub fn update_payload(&self, id: NodeId, payload: &NodePayload) -> Query {
        let assignments = NODE_COLUMNS[4..]
            .iter()
            .map(|c| format!("{} = ?", self.q(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut args = payload_args(payload);
        args.push(SqlArg::Int(id));
        Query::new(
            format!(
                "UPDATE {} SET {} WHERE {} = ?",
                self.table(),
                assignments,
                self.q("id")
            ),
            args,
        )
    }

    pub fn set_status(&self, id: NodeId, enabled: bool) -> Query {
        Query::new(
            format!(
                "UPDATE {} SET {} = ? WHERE {} = ?",
                self.table(),
                self.q("status"),
                self.q("id")
            ),
            vec![SqlArg::flag(enabled), SqlArg::Int(id)],
        )
    }

    /// Remove every row inside `bounds` (inclusive).
    pub fn delete_range(&self, tree_id: TreeId, bounds: Bounds) -> Query {
        Query::new(
            format!(
                "DELETE FROM {} WHERE {} = ? AND {} BETWEEN ? AND ?",
                self.table(),
                self.tree(),
                self.left()
            ),
            vec![
                SqlArg::Int(tree_id),
                SqlArg::Int(bounds.left),
                SqlArg::Int(bounds.right),
            ],
        )
    }

    /// One statement for both columns of a threshold shift.
    pub fn shift(&self, shift: &GapShift) -> Query {
        let (l, r) = (self.left(), self.right());
        Query::new(
            format!(
                "UPDATE {t} SET \
                 {l} = CASE WHEN {l} >= ? THEN {l} + ? ELSE {l} END, \
                 {r} = CASE WHEN {r} >= ? THEN {r} + ? ELSE {r} END \
                 WHERE {tree} = ? AND {r} >= ?",
                t = self.table(),
                tree = self.tree(),
            ),
            vec![
                SqlArg::Int(shift.threshold),
                SqlArg::Int(shift.delta),
                SqlArg::Int(shift.threshold),
                SqlArg::Int(shift.delta),
                SqlArg::Int(shift.tree_id),
                SqlArg::Int(shift.threshold),
            ],
        )
    }

    /// Negate the coordinates of a range so gap shifts skip it.
    pub fn detach_range(&self, tree_id: TreeId, bounds: Bounds) -> Query {
        let (l, r) = (self.left(), self.right());
        Query::new(
            format!(
                "UPDATE {t} SET {l} = -{l}, {r} = -{r} \
                 WHERE {tree} = ? AND {l} >= ? AND {r} <= ?",
                t = self.table(),
                tree = self.tree(),
            ),
            vec![
                SqlArg::Int(tree_id),
                SqlArg::Int(bounds.left),
                SqlArg::Int(bounds.right),
            ],
        )
    }

    /// Restore detached rows, moved by `offset`.
    pub fn reattach(&self, tree_id: TreeId, offset: i64) -> Query {
        let (l, r) = (self.left(), self.right());
        Query::new(
            format!(
                "UPDATE {t} SET {l} = ? - {l}, {r} = ? - {r} WHERE {tree} = ? AND {l} < 0",
                t = self.table(),
                tree = self.tree(),
            ),
            vec![
                SqlArg::Int(offset),
                SqlArg::Int(offset),
                SqlArg::Int(tree_id),
            ],
        )
    }

    /// Ids of every row whose range contains `node` (the node included),
    /// root first.
    pub fn ancestor_ids(&self, node: &TreeNode) -> Query {
        Query::new(
            format!(
                "SELECT {pid} FROM {t} AS {n}, {t} AS {p} \
                 WHERE {nl} BETWEEN {pl} AND {pr} \
                 AND {nid} = ? AND {nt} = ? AND {pt} = ? \
                 ORDER BY {pl}",
                t = self.table(),
                n = self.q("node"),
                p = self.q("parent"),
                pid = self.col("parent", "id"),
                nid = self.col("node", "id"),
                nl = self.col("node", "{left}"),
                pl = self.col("parent", "{left}"),
                pr = self.col("parent", "{right}"),
                nt = self.col("node", "{tree}"),
                pt = self.col("parent", "{tree}"),
            ),
            vec![
                SqlArg::Int(node.id),
                SqlArg::Int(node.tree_id),
                SqlArg::Int(node.tree_id),
            ],
        )
    }

    /// Absolute depth: containing rows minus one.
    pub fn depth(&self, node: &TreeNode) -> Query {
        Query::new(
            format!(
                "SELECT (COUNT({pid}) - 1) FROM {t} AS {n}, {t} AS {p} \
                 WHERE {nl} BETWEEN {pl} AND {pr} \
                 AND {nid} = ? AND {nt} = ? AND {pt} = ?",
                t = self.table(),
                n = self.q("node"),
                p = self.q("parent"),
                pid = self.col("parent", "id"),
                nid = self.col("node", "id"),
                nl = self.col("node", "{left}"),
                pl = self.col("parent", "{left}"),
                pr = self.col("parent", "{right}"),
                nt = self.col("node", "{tree}"),
                pt = self.col("parent", "{tree}"),
            ),
            vec![
                SqlArg::Int(node.id),
                SqlArg::Int(node.tree_id),
                SqlArg::Int(node.tree_id),
            ],
        )
    }

    /// Descendants of `node` with their depth relative to it, in preorder.
    ///
    /// Three self-joins: `parent` counts every row containing a candidate,
    /// `sub_parent` pins the candidate inside the subtree and `sub_tree`
    /// carries the absolute depth of `node`, subtracted so depths start at 1.
    /// With `enabled_only`, disabled rows are dropped and so is every row
    /// below a disabled ancestor inside the subtree.
    pub fn descendants(&self, node: &TreeNode, max_depth: Option<u32>, enabled_only: bool) -> Query {
        let t = self.table();
        let id = self.q("id");
        let n = self.q("node");
        let p = self.q("parent");
        let sp = self.q("sub_parent");
        let st = self.q("sub_tree");
        let depth = self.q("depth");
        let root_depth = self.q("root_depth");

        let nid = self.col("node", "id");
        let pid = self.col("parent", "id");
        let nl = self.col("node", "{left}");
        let pl = self.col("parent", "{left}");
        let pr = self.col("parent", "{right}");
        let spl = self.col("sub_parent", "{left}");
        let spr = self.col("sub_parent", "{right}");
        let nt = self.col("node", "{tree}");
        let pt = self.col("parent", "{tree}");

        let mut args = vec![
            SqlArg::Int(node.id),
            SqlArg::Int(node.tree_id),
            SqlArg::Int(node.tree_id),
            SqlArg::Int(node.tree_id),
            SqlArg::Int(node.tree_id),
        ];

        let mut sql = format!(
            "SELECT {cols}, (COUNT({pid}) - ({st}.{root_depth} + 1)) AS {depth}\n\
             FROM {t} AS {n},\n     {t} AS {p},\n     {t} AS {sp},\n     (\n\
             \x20   SELECT {nid} AS {id}, (COUNT({pid}) - 1) AS {root_depth}\n\
             \x20   FROM {t} AS {n}, {t} AS {p}\n\
             \x20   WHERE {nl} BETWEEN {pl} AND {pr}\n\
             \x20   AND {nid} = ?\n\
             \x20   AND {nt} = ?\n\
             \x20   AND {pt} = ?\n\
             \x20   GROUP BY {nid}\n\
             \x20   ORDER BY {nl}\n\
             ) AS {st}\n\
             WHERE {nl} BETWEEN {pl} AND {pr}\n\
             AND {nl} BETWEEN {spl} AND {spr}\n\
             AND {spid} = {st}.{id}\n\
             AND {nt} = ?\n\
             AND {pt} = ?\n",
            cols = self.node_columns(Some("node")),
            spid = self.col("sub_parent", "id"),
        );
        if enabled_only {
            sql.push_str(&format!("AND {} = 1\n", self.col("node", "status")));
        }
        sql.push_str(&format!("GROUP BY {nid}\nHAVING {depth} > 0\n"));
        if enabled_only {
            sql.push_str(&format!(
                "AND SUM(CASE WHEN {ps} = 0 AND {pl} > {spl} THEN 1 ELSE 0 END) = 0\n",
                ps = self.col("parent", "status"),
            ));
        }
        if let Some(limit) = max_depth {
            sql.push_str(&format!("AND {depth} <= ?\n"));
            args.push(SqlArg::Int(i64::from(limit)));
        }
        sql.push_str(&format!("ORDER BY {nl}"));

        Query::new(sql, args)
    }
}

fn payload_args(payload: &NodePayload) -> Vec<SqlArg> {
    vec![
        SqlArg::opt_text(payload.extension.as_deref()),
        SqlArg::text(&payload.name),
        SqlArg::text(&payload.slug),
        SqlArg::opt_text(payload.uri.as_deref()),
        SqlArg::Int(payload.target.code()),
        SqlArg::Int(payload.visibility.code()),
        SqlArg::flag(payload.secure),
        SqlArg::flag(payload.user_editable),
        SqlArg::text(&payload.class),
        SqlArg::flag(payload.enabled),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_root() -> TreeNode {
        TreeNode {
            id: 1,
            tree_id: 1,
            left: 1,
            right: 6,
            payload: NodePayload::new("Main", "main"),
        }
    }

    #[test]
    fn given_enabled_descendants_when_built_then_keeps_triple_join_and_having() {
        let q = QueryBuilder::default().descendants(&main_root(), None, true);
        assert!(q.sql.contains(r#"FROM "menus" AS "node",
     "menus" AS "parent",
     "menus" AS "sub_parent""#));
        assert!(q.sql.contains(r#"HAVING "depth" > 0"#));
        assert!(q.sql.contains(r#"AND "node"."status" = 1"#));
        assert!(q.sql.ends_with(r#"ORDER BY "node"."lft""#));
        assert_eq!(q.args.len(), 5);
    }

    #[test]
    fn given_max_depth_when_built_then_filters_after_having() {
        let q = QueryBuilder::default().descendants(&main_root(), Some(2), false);
        let having = q.sql.find("HAVING").unwrap();
        let limit = q.sql.find(r#"AND "depth" <= ?"#).unwrap();
        assert!(limit > having);
        assert_eq!(q.args.last(), Some(&SqlArg::Int(2)));
        assert!(!q.sql.contains(r#"AND "node"."status" = 1"#));
        assert!(!q.sql.contains("SUM(CASE WHEN"));
    }

    #[test]
    fn given_mysql_dialect_with_custom_layout_when_built_then_uses_backticks() {
        let layout = TableLayout {
            table: "nav".into(),
            left: "l".into(),
            right: "r".into(),
            tree: "tree".into(),
        };
        let builder = QueryBuilder::new(Dialect::Mysql, layout);
        let q = builder.shift(&GapShift::insert_gap(7, 4, 2));
        assert!(q.sql.starts_with("UPDATE `nav` SET `l` = CASE WHEN `l` >= ?"));
        assert!(q.sql.contains("WHERE `tree` = ? AND `r` >= ?"));
        assert_eq!(q.args[4], SqlArg::Int(7));
    }

    #[test]
    fn given_insert_when_built_then_placeholders_match_args() {
        let q = QueryBuilder::default().insert_node(3, Bounds::ROOT, &NodePayload::new("A", "a"));
        assert_eq!(q.sql.matches('?').count(), q.args.len());
        assert_eq!(q.args.len(), NODE_COLUMNS.len() - 1);
    }
}
