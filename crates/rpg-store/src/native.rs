//! The native-graph backend: adjacency-indexed in-memory graph with a
//! built-in inverted text index and optional on-disk persistence of the
//! canonical JSON artifact (zstd-compressed files detected by magic bytes).

use crate::{
    EdgeFilter, EdgeSelector, FeatureHit, GraphStore, NodeFilter, NodePatch, apply_patch, tokenize,
};
use rpg_core::error::{Result, RpgError};
use rpg_core::model::{Edge, EdgeKind, GraphConfig, Node};
use rpg_core::schema::{self, GraphDocument};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Read as _;
use std::path::{Path, PathBuf};

type EdgeKey = (String, String, EdgeKind);

/// Zstd magic bytes: 0x28 0xB5 0x2F 0xFD.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// In-memory graph store with optional file persistence.
pub struct NativeStore {
    path: Option<PathBuf>,
    compress: bool,
    config: GraphConfig,
    nodes: BTreeMap<String, Node>,
    edges: BTreeMap<EdgeKey, Edge>,
    out_index: HashMap<String, BTreeSet<EdgeKey>>,
    in_index: HashMap<String, BTreeSet<EdgeKey>>,
    /// token → node id → term frequency
    text_index: HashMap<String, HashMap<String, usize>>,
}

impl NativeStore {
    /// An ephemeral store. Nothing touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            compress: false,
            config: GraphConfig::default(),
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            out_index: HashMap::new(),
            in_index: HashMap::new(),
            text_index: HashMap::new(),
        }
    }

    /// Open a store persisting to `path`. Loads an existing artifact when one
    /// is present; compressed files are detected by magic bytes.
    pub fn open(path: &Path) -> Result<Self> {
        let mut store = Self::in_memory();
        store.path = Some(path.to_path_buf());
        if path.exists() {
            let raw = std::fs::read(path)?;
            let json = if raw.len() >= 4 && raw[..4] == ZSTD_MAGIC {
                let mut decoder = zstd::Decoder::new(&raw[..])
                    .map_err(|e| RpgError::Store(format!("zstd init: {e}")))?;
                let mut decompressed = String::new();
                decoder
                    .read_to_string(&mut decompressed)
                    .map_err(|e| RpgError::Store(format!("zstd decompress: {e}")))?;
                decompressed
            } else {
                String::from_utf8(raw)
                    .map_err(|e| RpgError::Store(format!("artifact is not UTF-8: {e}")))?
            };
            let doc = schema::from_json(&json)?;
            store.load_document(doc)?;
        }
        Ok(store)
    }

    /// Compress the artifact on flush.
    pub fn set_compress(&mut self, compress: bool) {
        self.compress = compress;
    }

    fn load_document(&mut self, doc: GraphDocument) -> Result<()> {
        self.config = doc.config;
        self.nodes.clear();
        self.edges.clear();
        self.out_index.clear();
        self.in_index.clear();
        self.text_index.clear();
        for node in doc.nodes {
            self.add_node(node)?;
        }
        for edge in doc.edges {
            self.add_edge(edge)?;
        }
        Ok(())
    }

    fn index_node_text(&mut self, node: &Node) {
        for token in tokenize(&node.feature().index_text()) {
            *self
                .text_index
                .entry(token)
                .or_default()
                .entry(node.id().to_string())
                .or_insert(0) += 1;
        }
    }

    fn unindex_node_text(&mut self, id: &str) {
        self.text_index.retain(|_, postings| {
            postings.remove(id);
            !postings.is_empty()
        });
    }

    fn insert_edge_indexes(&mut self, key: &EdgeKey) {
        self.out_index
            .entry(key.0.clone())
            .or_default()
            .insert(key.clone());
        self.in_index
            .entry(key.1.clone())
            .or_default()
            .insert(key.clone());
    }

    fn remove_edge_indexes(&mut self, key: &EdgeKey) {
        if let Some(set) = self.out_index.get_mut(&key.0) {
            set.remove(key);
        }
        if let Some(set) = self.in_index.get_mut(&key.1) {
            set.remove(key);
        }
    }

    fn scope_closure(&self, scopes: &[String]) -> Result<HashSet<String>> {
        let mut closure = HashSet::new();
        for scope in scopes {
            for id in self.subtree_ids(scope)? {
                closure.insert(id);
            }
        }
        Ok(closure)
    }
}

impl GraphStore for NativeStore {
    fn add_node(&mut self, node: Node) -> Result<()> {
        if let Some(existing) = self.nodes.get(node.id()) {
            if *existing == node {
                return Ok(());
            }
            return Err(RpgError::Validation(format!(
                "duplicate node id: {}",
                node.id()
            )));
        }
        self.index_node_text(&node);
        self.nodes.insert(node.id().to_string(), node);
        Ok(())
    }

    fn get_node(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.nodes.get(id).cloned())
    }

    fn update_node(&mut self, id: &str, patch: &NodePatch) -> Result<()> {
        let Some(mut node) = self.nodes.get(id).cloned() else {
            return Err(RpgError::NotFound(format!("node {id}")));
        };
        apply_patch(&mut node, patch);
        self.unindex_node_text(id);
        self.index_node_text(&node);
        self.nodes.insert(id.to_string(), node);
        Ok(())
    }

    fn remove_node(&mut self, id: &str) -> Result<bool> {
        if self.nodes.remove(id).is_none() {
            return Ok(false);
        }
        self.unindex_node_text(id);
        let incident: Vec<EdgeKey> = self
            .edges
            .keys()
            .filter(|(source, target, _)| source == id || target == id)
            .cloned()
            .collect();
        for key in incident {
            self.edges.remove(&key);
            self.remove_edge_indexes(&key);
        }
        Ok(true)
    }

    fn get_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>> {
        Ok(self
            .nodes
            .values()
            .filter(|node| {
                if let Some(high) = filter.high_level
                    && node.is_high_level() != high
                {
                    return false;
                }
                if let Some(entity_type) = filter.entity_type
                    && node.metadata().map(|m| m.entity_type) != Some(entity_type)
                {
                    return false;
                }
                if let Some(prefix) = &filter.path_prefix
                    && !node.path().is_some_and(|p| p.starts_with(prefix.as_str()))
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect())
    }

    fn add_edge(&mut self, edge: Edge) -> Result<bool> {
        if !self.nodes.contains_key(edge.source()) {
            return Err(RpgError::Validation(format!(
                "edge source does not exist: {}",
                edge.source()
            )));
        }
        if !self.nodes.contains_key(edge.target()) {
            return Err(RpgError::Validation(format!(
                "edge target does not exist: {}",
                edge.target()
            )));
        }
        let key = edge.key();
        if self.edges.contains_key(&key) {
            return Ok(false);
        }
        self.insert_edge_indexes(&key);
        self.edges.insert(key, edge);
        Ok(true)
    }

    fn remove_edge(&mut self, source: &str, target: &str, kind: EdgeKind) -> Result<bool> {
        let key = (source.to_string(), target.to_string(), kind);
        if self.edges.remove(&key).is_none() {
            return Ok(false);
        }
        self.remove_edge_indexes(&key);
        Ok(true)
    }

    fn get_edges(&self, filter: &EdgeFilter) -> Result<Vec<Edge>> {
        Ok(self
            .edges
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    fn get_out_edges(&self, id: &str, selector: EdgeSelector) -> Result<Vec<Edge>> {
        let Some(keys) = self.out_index.get(id) else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter_map(|key| self.edges.get(key))
            .filter(|edge| selector.admits(edge))
            .cloned()
            .collect())
    }

    fn get_in_edges(&self, id: &str, selector: EdgeSelector) -> Result<Vec<Edge>> {
        let Some(keys) = self.in_index.get(id) else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter_map(|key| self.edges.get(key))
            .filter(|edge| selector.admits(edge))
            .cloned()
            .collect())
    }

    fn search_by_feature(&self, query: &str, scopes: &[String]) -> Result<Vec<FeatureHit>> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let closure = if scopes.is_empty() {
            None
        } else {
            Some(self.scope_closure(scopes)?)
        };

        let mut scores: BTreeMap<String, f64> = BTreeMap::new();
        for term in &terms {
            if let Some(postings) = self.text_index.get(term) {
                for (id, tf) in postings {
                    *scores.entry(id.clone()).or_insert(0.0) += *tf as f64;
                }
            }
        }

        let mut hits: Vec<FeatureHit> = scores
            .into_iter()
            .filter(|(id, _)| closure.as_ref().is_none_or(|c| c.contains(id)))
            .filter_map(|(id, score)| {
                self.nodes.get(&id).map(|node| FeatureHit {
                    node: node.clone(),
                    score: score / terms.len() as f64,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node.id().cmp(b.node.id()))
        });
        Ok(hits)
    }

    fn export_document(&self) -> Result<GraphDocument> {
        Ok(GraphDocument::new(
            self.config.clone(),
            self.nodes.values().cloned().collect(),
            self.edges.values().cloned().collect(),
        ))
    }

    fn import_document(&mut self, doc: GraphDocument) -> Result<()> {
        self.load_document(doc)
    }

    fn config(&self) -> GraphConfig {
        self.config.clone()
    }

    fn set_config(&mut self, config: GraphConfig) -> Result<()> {
        self.config = config;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = schema::to_json(&self.export_document()?)?;
        if self.compress {
            let compressed = zstd::encode_all(json.as_bytes(), 3)
                .map_err(|e| RpgError::Store(format!("zstd compress: {e}")))?;
            std::fs::write(&path, compressed)?;
        } else {
            std::fs::write(&path, json)?;
        }
        Ok(())
    }

    fn node_count(&self) -> Result<usize> {
        Ok(self.nodes.len())
    }

    fn edge_count(&self) -> Result<usize> {
        Ok(self.edges.len())
    }
}
