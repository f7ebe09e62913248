//! The relational backend: SQLite with an FTS5 feature index (BM25 ranking)
//! and recursive CTEs for functional-subtree closure.

use crate::{
    EdgeFilter, EdgeSelector, FeatureHit, GraphStore, NodeFilter, NodePatch, apply_patch, tokenize,
};
use rpg_core::error::{Result, RpgError};
use rpg_core::model::{Edge, EdgeKind, GraphConfig, Node};
use rpg_core::schema::GraphDocument;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;
use std::path::Path;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS edges (
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    family TEXT NOT NULL,
    dep_type TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL,
    PRIMARY KEY (source, target, family, dep_type)
);
CREATE INDEX IF NOT EXISTS idx_edges_source ON edges (source, family);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges (target, family);
CREATE VIRTUAL TABLE IF NOT EXISTS node_fts USING fts5(
    node_id UNINDEXED,
    description,
    keywords,
    subfeatures
);
";

/// SQLite-backed graph store.
pub struct SqliteStore {
    conn: Connection,
}

fn store_err(err: rusqlite::Error) -> RpgError {
    RpgError::Store(err.to_string())
}

fn edge_family(kind: EdgeKind) -> (&'static str, &'static str) {
    match kind {
        EdgeKind::Functional => ("functional", ""),
        EdgeKind::Dependency(dep) => ("dependency", dep.name()),
    }
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL).map_err(store_err)?;
        Ok(Self { conn })
    }

    fn node_body(&self, id: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT body FROM nodes WHERE id = ?1", params![id], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(store_err)
    }

    fn write_fts(conn: &Connection, node: &Node) -> Result<()> {
        conn.execute(
            "DELETE FROM node_fts WHERE node_id = ?1",
            params![node.id()],
        )
        .map_err(store_err)?;
        let feature = node.feature();
        conn.execute(
            "INSERT INTO node_fts (node_id, description, keywords, subfeatures)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                node.id(),
                feature.description,
                feature.keywords.join(" "),
                feature
                    .sub_features
                    .as_ref()
                    .map(|s| s.join(" "))
                    .unwrap_or_default(),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn node_kind(node: &Node) -> &'static str {
        if node.is_high_level() {
            "high_level"
        } else {
            "low_level"
        }
    }

    fn parse_node(body: &str) -> Result<Node> {
        serde_json::from_str(body).map_err(|e| RpgError::Store(format!("corrupt node row: {e}")))
    }

    fn parse_edge(body: &str) -> Result<Edge> {
        serde_json::from_str(body).map_err(|e| RpgError::Store(format!("corrupt edge row: {e}")))
    }

    fn contains_node(&self, id: &str) -> Result<bool> {
        Ok(self.node_body(id)?.is_some())
    }

    /// Functional subtree closure via a recursive CTE.
    fn scope_closure(&self, scopes: &[String]) -> Result<HashSet<String>> {
        let mut closure = HashSet::new();
        let mut stmt = self
            .conn
            .prepare(
                "WITH RECURSIVE subtree(id) AS (
                     VALUES(?1)
                     UNION
                     SELECT e.target FROM edges e
                     JOIN subtree s ON e.source = s.id
                     WHERE e.family = 'functional'
                 )
                 SELECT id FROM subtree",
            )
            .map_err(store_err)?;
        for scope in scopes {
            let ids = stmt
                .query_map(params![scope], |row| row.get::<_, String>(0))
                .map_err(store_err)?;
            for id in ids {
                closure.insert(id.map_err(store_err)?);
            }
        }
        Ok(closure)
    }
}

impl GraphStore for SqliteStore {
    fn add_node(&mut self, node: Node) -> Result<()> {
        if let Some(body) = self.node_body(node.id())? {
            let existing = Self::parse_node(&body)?;
            if existing == node {
                return Ok(());
            }
            return Err(RpgError::Validation(format!(
                "duplicate node id: {}",
                node.id()
            )));
        }
        let body = serde_json::to_string(&node).map_err(|e| RpgError::Store(e.to_string()))?;
        let tx = self.conn.transaction().map_err(store_err)?;
        tx.execute(
            "INSERT INTO nodes (id, kind, body) VALUES (?1, ?2, ?3)",
            params![node.id(), Self::node_kind(&node), body],
        )
        .map_err(store_err)?;
        Self::write_fts(&tx, &node)?;
        tx.commit().map_err(store_err)?;
        Ok(())
    }

    fn get_node(&self, id: &str) -> Result<Option<Node>> {
        match self.node_body(id)? {
            Some(body) => Ok(Some(Self::parse_node(&body)?)),
            None => Ok(None),
        }
    }

    fn update_node(&mut self, id: &str, patch: &NodePatch) -> Result<()> {
        let Some(body) = self.node_body(id)? else {
            return Err(RpgError::NotFound(format!("node {id}")));
        };
        let mut node = Self::parse_node(&body)?;
        apply_patch(&mut node, patch);
        let body = serde_json::to_string(&node).map_err(|e| RpgError::Store(e.to_string()))?;
        let tx = self.conn.transaction().map_err(store_err)?;
        tx.execute(
            "UPDATE nodes SET kind = ?2, body = ?3 WHERE id = ?1",
            params![id, Self::node_kind(&node), body],
        )
        .map_err(store_err)?;
        Self::write_fts(&tx, &node)?;
        tx.commit().map_err(store_err)?;
        Ok(())
    }

    fn remove_node(&mut self, id: &str) -> Result<bool> {
        let tx = self.conn.transaction().map_err(store_err)?;
        let removed = tx
            .execute("DELETE FROM nodes WHERE id = ?1", params![id])
            .map_err(store_err)?;
        if removed == 0 {
            return Ok(false);
        }
        tx.execute(
            "DELETE FROM edges WHERE source = ?1 OR target = ?1",
            params![id],
        )
        .map_err(store_err)?;
        tx.execute("DELETE FROM node_fts WHERE node_id = ?1", params![id])
            .map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        Ok(true)
    }

    fn get_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM nodes ORDER BY id")
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(store_err)?;
        let mut nodes = Vec::new();
        for body in rows {
            let node = Self::parse_node(&body.map_err(store_err)?)?;
            if let Some(high) = filter.high_level
                && node.is_high_level() != high
            {
                continue;
            }
            if let Some(entity_type) = filter.entity_type
                && node.metadata().map(|m| m.entity_type) != Some(entity_type)
            {
                continue;
            }
            if let Some(prefix) = &filter.path_prefix
                && !node.path().is_some_and(|p| p.starts_with(prefix.as_str()))
            {
                continue;
            }
            nodes.push(node);
        }
        Ok(nodes)
    }

    fn add_edge(&mut self, edge: Edge) -> Result<bool> {
        if !self.contains_node(edge.source())? {
            return Err(RpgError::Validation(format!(
                "edge source does not exist: {}",
                edge.source()
            )));
        }
        if !self.contains_node(edge.target())? {
            return Err(RpgError::Validation(format!(
                "edge target does not exist: {}",
                edge.target()
            )));
        }
        let (family, dep_type) = edge_family(edge.kind());
        let body = serde_json::to_string(&edge).map_err(|e| RpgError::Store(e.to_string()))?;
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO edges (source, target, family, dep_type, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![edge.source(), edge.target(), family, dep_type, body],
            )
            .map_err(store_err)?;
        Ok(inserted > 0)
    }

    fn remove_edge(&mut self, source: &str, target: &str, kind: EdgeKind) -> Result<bool> {
        let (family, dep_type) = edge_family(kind);
        let removed = self
            .conn
            .execute(
                "DELETE FROM edges WHERE source = ?1 AND target = ?2
                 AND family = ?3 AND dep_type = ?4",
                params![source, target, family, dep_type],
            )
            .map_err(store_err)?;
        Ok(removed > 0)
    }

    fn get_edges(&self, filter: &EdgeFilter) -> Result<Vec<Edge>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM edges ORDER BY source, target, family, dep_type")
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(store_err)?;
        let mut edges = Vec::new();
        for body in rows {
            let edge = Self::parse_edge(&body.map_err(store_err)?)?;
            if filter.matches(&edge) {
                edges.push(edge);
            }
        }
        Ok(edges)
    }

    fn get_out_edges(&self, id: &str, selector: EdgeSelector) -> Result<Vec<Edge>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT body FROM edges WHERE source = ?1
                 ORDER BY target, family, dep_type",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![id], |row| row.get::<_, String>(0))
            .map_err(store_err)?;
        let mut edges = Vec::new();
        for body in rows {
            let edge = Self::parse_edge(&body.map_err(store_err)?)?;
            if selector.admits(&edge) {
                edges.push(edge);
            }
        }
        Ok(edges)
    }

    fn get_in_edges(&self, id: &str, selector: EdgeSelector) -> Result<Vec<Edge>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT body FROM edges WHERE target = ?1
                 ORDER BY source, family, dep_type",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![id], |row| row.get::<_, String>(0))
            .map_err(store_err)?;
        let mut edges = Vec::new();
        for body in rows {
            let edge = Self::parse_edge(&body.map_err(store_err)?)?;
            if selector.admits(&edge) {
                edges.push(edge);
            }
        }
        Ok(edges)
    }

    fn search_by_feature(&self, query: &str, scopes: &[String]) -> Result<Vec<FeatureHit>> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        // Quote every token so user input cannot inject FTS5 query syntax.
        let match_expr = terms
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR ");

        let closure = if scopes.is_empty() {
            None
        } else {
            Some(self.scope_closure(scopes)?)
        };

        let mut stmt = self
            .conn
            .prepare(
                "SELECT node_id, bm25(node_fts, 0.0, 1.0, 0.6, 0.4) AS rank
                 FROM node_fts WHERE node_fts MATCH ?1
                 ORDER BY rank ASC, node_id ASC",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![match_expr], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })
            .map_err(store_err)?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, rank) = row.map_err(store_err)?;
            if closure.as_ref().is_some_and(|c| !c.contains(&id)) {
                continue;
            }
            if let Some(node) = self.get_node(&id)? {
                // bm25() ranks best-first with smaller (more negative) values.
                hits.push(FeatureHit { node, score: -rank });
            }
        }
        Ok(hits)
    }

    fn export_document(&self) -> Result<GraphDocument> {
        Ok(GraphDocument::new(
            self.config(),
            self.get_nodes(&NodeFilter::default())?,
            self.get_edges(&EdgeFilter::default())?,
        ))
    }

    fn import_document(&mut self, doc: GraphDocument) -> Result<()> {
        let tx = self.conn.transaction().map_err(store_err)?;
        tx.execute_batch("DELETE FROM nodes; DELETE FROM edges; DELETE FROM node_fts;")
            .map_err(store_err)?;
        for node in &doc.nodes {
            let body = serde_json::to_string(node).map_err(|e| RpgError::Store(e.to_string()))?;
            tx.execute(
                "INSERT INTO nodes (id, kind, body) VALUES (?1, ?2, ?3)",
                params![node.id(), Self::node_kind(node), body],
            )
            .map_err(store_err)?;
            Self::write_fts(&tx, node)?;
        }
        for edge in &doc.edges {
            let (family, dep_type) = edge_family(edge.kind());
            let body = serde_json::to_string(edge).map_err(|e| RpgError::Store(e.to_string()))?;
            tx.execute(
                "INSERT OR IGNORE INTO edges (source, target, family, dep_type, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![edge.source(), edge.target(), family, dep_type, body],
            )
            .map_err(store_err)?;
        }
        let config = serde_json::to_string(&doc.config).map_err(|e| RpgError::Store(e.to_string()))?;
        tx.execute(
            "INSERT INTO meta (key, value) VALUES ('config', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![config],
        )
        .map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        Ok(())
    }

    fn config(&self) -> GraphConfig {
        self.conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'config'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .ok()
            .flatten()
            .and_then(|value| serde_json::from_str(&value).ok())
            .unwrap_or_default()
    }

    fn set_config(&mut self, config: GraphConfig) -> Result<()> {
        let value = serde_json::to_string(&config).map_err(|e| RpgError::Store(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO meta (key, value) VALUES ('config', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![value],
            )
            .map_err(store_err)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn node_count(&self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as usize)
            .map_err(store_err)
    }

    fn edge_count(&self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM edges", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as usize)
            .map_err(store_err)
    }
}
