//! Graph store backends and the typed RPG façade.
//!
//! The [`GraphStore`] trait is the single storage surface. Two interchangeable
//! implementations conform to it: [`native::NativeStore`] (adjacency-indexed,
//! built-in text index, optional on-disk artifact) and
//! [`sqlite::SqliteStore`] (relational, FTS5/BM25 search, recursive CTEs).

pub mod native;
mod pathglob;
pub mod rpg;
pub mod sqlite;

pub use pathglob::path_matcher;
pub use rpg::Rpg;

use rpg_core::error::Result;
use rpg_core::model::{
    DependencyType, Edge, EdgeKind, EntityType, Node, SemanticFeature, SourceLanguage,
    StructuralMetadata,
};
use rpg_core::schema::GraphDocument;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

/// Node selection for `get_nodes`.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    /// `Some(true)` selects high-level nodes only, `Some(false)` low-level.
    pub high_level: Option<bool>,
    pub entity_type: Option<EntityType>,
    /// Matches nodes whose `metadata.path` starts with this prefix.
    pub path_prefix: Option<String>,
}

/// Edge selection for `get_edges`.
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub source: Option<String>,
    pub target: Option<String>,
    /// `Some(true)` selects functional edges only, `Some(false)` dependency.
    pub functional: Option<bool>,
    pub dependency_type: Option<DependencyType>,
}

impl EdgeFilter {
    fn matches(&self, edge: &Edge) -> bool {
        if let Some(source) = &self.source
            && edge.source() != source
        {
            return false;
        }
        if let Some(target) = &self.target
            && edge.target() != target
        {
            return false;
        }
        if let Some(functional) = self.functional
            && edge.is_functional() != functional
        {
            return false;
        }
        if let Some(dep) = self.dependency_type {
            match edge {
                Edge::Dependency(e) if e.dependency_type == dep => {}
                _ => return false,
            }
        }
        true
    }
}

/// Which edge family a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSelector {
    Functional,
    Dependency,
    Both,
}

impl EdgeSelector {
    pub fn admits(self, edge: &Edge) -> bool {
        match self {
            Self::Functional => edge.is_functional(),
            Self::Dependency => edge.is_dependency(),
            Self::Both => true,
        }
    }
}

/// Traversal direction relative to the current node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Both,
}

/// Bounded multi-edge traversal request.
#[derive(Debug, Clone)]
pub struct TraverseOptions {
    pub start_node: String,
    pub edge_type: EdgeSelector,
    pub direction: Direction,
    pub max_depth: usize,
    pub type_filter: Option<Vec<EntityType>>,
}

/// Traversal result: nodes and edges in visit order.
#[derive(Debug, Clone, Default)]
pub struct TraverseResult {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub max_depth_reached: usize,
}

/// A scored full-text search hit.
#[derive(Debug, Clone)]
pub struct FeatureHit {
    pub node: Node,
    pub score: f64,
}

/// Partial update applied by `update_node`.
///
/// `feature` deep-merges (non-empty description replaces, keywords union,
/// `sub_features` replaces when present); `metadata` replaces scalar fields
/// atomically and merges `extra` entries.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub feature: Option<SemanticFeature>,
    pub metadata: Option<MetadataPatch>,
    pub source_code: Option<String>,
}

impl NodePatch {
    pub fn feature(feature: SemanticFeature) -> Self {
        Self {
            feature: Some(feature),
            ..Default::default()
        }
    }

    pub fn metadata(metadata: MetadataPatch) -> Self {
        Self {
            metadata: Some(metadata),
            ..Default::default()
        }
    }
}

/// Partial structural metadata update.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub entity_type: Option<EntityType>,
    pub path: Option<String>,
    pub qualified_name: Option<String>,
    pub language: Option<SourceLanguage>,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The abstract graph store every backend implements.
pub trait GraphStore: Send {
    /// Insert a node. Re-adding an identical node is a no-op; a different
    /// node under an existing id is a validation error.
    fn add_node(&mut self, node: Node) -> Result<()>;

    fn get_node(&self, id: &str) -> Result<Option<Node>>;

    /// Apply a partial update. Missing id is a `NotFound` error.
    fn update_node(&mut self, id: &str, patch: &NodePatch) -> Result<()>;

    /// Remove a node and cascade its incident edges. Returns `false` if the
    /// node was absent.
    fn remove_node(&mut self, id: &str) -> Result<bool>;

    fn get_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>>;

    /// Insert an edge. Both endpoints must exist. Returns `false` when the
    /// identical `(source, target, kind)` edge already exists (no-op).
    fn add_edge(&mut self, edge: Edge) -> Result<bool>;

    fn remove_edge(&mut self, source: &str, target: &str, kind: EdgeKind) -> Result<bool>;

    fn get_edges(&self, filter: &EdgeFilter) -> Result<Vec<Edge>>;

    fn get_out_edges(&self, id: &str, selector: EdgeSelector) -> Result<Vec<Edge>>;

    fn get_in_edges(&self, id: &str, selector: EdgeSelector) -> Result<Vec<Edge>>;

    /// Full-text feature search, optionally restricted to the union of the
    /// functional subtrees rooted at `scopes`.
    fn search_by_feature(&self, query: &str, scopes: &[String]) -> Result<Vec<FeatureHit>>;

    /// Children along functional edges (source = id).
    fn get_children(&self, id: &str) -> Result<Vec<Node>> {
        let mut children = Vec::new();
        for edge in self.get_out_edges(id, EdgeSelector::Functional)? {
            if let Some(node) = self.get_node(edge.target())? {
                children.push(node);
            }
        }
        Ok(children)
    }

    /// Parent along the at-most-one incoming functional edge.
    fn get_parent(&self, id: &str) -> Result<Option<Node>> {
        match self.get_in_edges(id, EdgeSelector::Functional)?.first() {
            Some(edge) => self.get_node(edge.source()),
            None => Ok(None),
        }
    }

    /// Nodes this node depends on (dependency out-edges).
    fn get_dependencies(&self, id: &str) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        for edge in self.get_out_edges(id, EdgeSelector::Dependency)? {
            if let Some(node) = self.get_node(edge.target())? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Nodes depending on this node (dependency in-edges).
    fn get_dependents(&self, id: &str) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        for edge in self.get_in_edges(id, EdgeSelector::Dependency)? {
            if let Some(node) = self.get_node(edge.source())? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Bounded breadth-first traversal; `max_depth = 0` returns only the
    /// start node. Each node is visited once; termination is guaranteed by
    /// the visited set and the depth bound.
    fn traverse(&self, opts: &TraverseOptions) -> Result<TraverseResult> {
        let Some(start) = self.get_node(&opts.start_node)? else {
            return Err(rpg_core::RpgError::NotFound(format!(
                "node {}",
                opts.start_node
            )));
        };

        let mut result = TraverseResult {
            nodes: vec![start],
            ..Default::default()
        };
        let mut visited: HashSet<String> = HashSet::from([opts.start_node.clone()]);
        let mut seen_edges: HashSet<(String, String, EdgeKind)> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::from([(opts.start_node.clone(), 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= opts.max_depth {
                continue;
            }
            let mut candidates: Vec<(Edge, String)> = Vec::new();
            if matches!(opts.direction, Direction::Out | Direction::Both) {
                for edge in self.get_out_edges(&current, opts.edge_type)? {
                    let target = edge.target().to_string();
                    candidates.push((edge, target));
                }
            }
            if matches!(opts.direction, Direction::In | Direction::Both) {
                for edge in self.get_in_edges(&current, opts.edge_type)? {
                    let source = edge.source().to_string();
                    candidates.push((edge, source));
                }
            }
            for (edge, neighbor_id) in candidates {
                if visited.contains(&neighbor_id) {
                    continue;
                }
                let Some(neighbor) = self.get_node(&neighbor_id)? else {
                    continue;
                };
                if let Some(kinds) = &opts.type_filter
                    && !neighbor
                        .metadata()
                        .is_some_and(|m| kinds.contains(&m.entity_type))
                {
                    continue;
                }
                visited.insert(neighbor_id.clone());
                if seen_edges.insert(edge.key()) {
                    result.edges.push(edge);
                }
                result.nodes.push(neighbor);
                result.max_depth_reached = result.max_depth_reached.max(depth + 1);
                queue.push_back((neighbor_id, depth + 1));
            }
        }
        Ok(result)
    }

    /// Glob search over `metadata.path` and each entry of
    /// `metadata.extra.paths`. `*` matches one segment, `**` any number.
    fn search_by_path(&self, pattern: &str) -> Result<Vec<Node>> {
        let matcher = path_matcher(pattern)?;
        Ok(self
            .get_nodes(&NodeFilter::default())?
            .into_iter()
            .filter(|node| {
                node.grounded_paths()
                    .iter()
                    .any(|p| matcher.is_match(p.as_str()))
            })
            .collect())
    }

    /// Order over dependency edges: sources before their dependencies.
    fn topological_order(&self) -> Result<Vec<String>> {
        let node_ids: Vec<String> = self
            .get_nodes(&NodeFilter::default())?
            .iter()
            .map(|n| n.id().to_string())
            .collect();
        let dep_edges: Vec<(String, String)> = self
            .get_edges(&EdgeFilter {
                functional: Some(false),
                ..Default::default()
            })?
            .iter()
            .map(|e| (e.source().to_string(), e.target().to_string()))
            .collect();
        Ok(topo_order(&node_ids, &dep_edges))
    }

    fn export_document(&self) -> Result<GraphDocument>;

    /// Replace the entire graph with the document's contents, atomically.
    fn import_document(&mut self, doc: GraphDocument) -> Result<()>;

    fn config(&self) -> rpg_core::model::GraphConfig;

    fn set_config(&mut self, config: rpg_core::model::GraphConfig) -> Result<()>;

    /// Persist any pending state. A memory-backed store is a no-op.
    fn flush(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    fn node_count(&self) -> Result<usize> {
        Ok(self.get_nodes(&NodeFilter::default())?.len())
    }

    fn edge_count(&self) -> Result<usize> {
        Ok(self.get_edges(&EdgeFilter::default())?.len())
    }

    /// Ids in the functional subtree rooted at `root`, root included.
    fn subtree_ids(&self, root: &str) -> Result<Vec<String>> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([root.to_string()]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            order.push(id.clone());
            for edge in self.get_out_edges(&id, EdgeSelector::Functional)? {
                queue.push_back(edge.target().to_string());
            }
        }
        Ok(order)
    }
}

/// Open a store from a location spec: `"memory"` for the ephemeral native
/// backend, a `.db`/`.sqlite` path for the relational backend, any other path
/// for the native backend persisting the JSON artifact there.
pub fn open(spec: &str) -> Result<Box<dyn GraphStore>> {
    if spec == "memory" {
        return Ok(Box::new(native::NativeStore::in_memory()));
    }
    if spec.ends_with(".db") || spec.ends_with(".sqlite") {
        return Ok(Box::new(sqlite::SqliteStore::open(std::path::Path::new(
            spec,
        ))?));
    }
    Ok(Box::new(native::NativeStore::open(std::path::Path::new(
        spec,
    ))?))
}

/// Apply a [`NodePatch`] to a node in place. Shared by both backends so the
/// deep-merge semantics cannot drift between them.
pub(crate) fn apply_patch(node: &mut Node, patch: &NodePatch) {
    if let Some(feature) = &patch.feature {
        let current = node.feature_mut();
        if !feature.description.is_empty() {
            current.description = feature.description.clone();
        }
        for kw in &feature.keywords {
            if !current.keywords.contains(kw) {
                current.keywords.push(kw.clone());
            }
        }
        if feature.sub_features.is_some() {
            current.sub_features = feature.sub_features.clone();
        }
    }

    if let Some(meta_patch) = &patch.metadata {
        if node.metadata().is_none()
            && let Node::HighLevel(hl) = node
        {
            hl.metadata = Some(StructuralMetadata::default());
        }
        if let Some(meta) = node.metadata_mut() {
            if let Some(entity_type) = meta_patch.entity_type {
                meta.entity_type = entity_type;
            }
            if let Some(path) = &meta_patch.path {
                meta.path = Some(path.clone());
            }
            if let Some(qn) = &meta_patch.qualified_name {
                meta.qualified_name = Some(qn.clone());
            }
            if let Some(lang) = meta_patch.language {
                meta.language = Some(lang);
            }
            if let Some(start) = meta_patch.start_line {
                meta.start_line = Some(start);
            }
            if let Some(end) = meta_patch.end_line {
                meta.end_line = Some(end);
            }
            for (key, value) in &meta_patch.extra {
                meta.extra.insert(key.clone(), value.clone());
            }
        }
    }

    if let Some(source) = &patch.source_code
        && let Node::LowLevel(ll) = node
    {
        ll.source_code = Some(source.clone());
    }
}

/// Post-order over dependency edges, reversed, so every source precedes the
/// nodes it depends on. Cycles are broken by the visited set; ties resolve by
/// id order for determinism.
pub(crate) fn topo_order(node_ids: &[String], dep_edges: &[(String, String)]) -> Vec<String> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for (source, target) in dep_edges {
        adjacency
            .entry(source.as_str())
            .or_default()
            .push(target.as_str());
    }
    for targets in adjacency.values_mut() {
        targets.sort_unstable();
    }

    let mut sorted_ids: Vec<&str> = node_ids.iter().map(String::as_str).collect();
    sorted_ids.sort_unstable();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut post = Vec::with_capacity(node_ids.len());

    fn visit<'a>(
        id: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        visited: &mut HashSet<&'a str>,
        post: &mut Vec<String>,
    ) {
        if !visited.insert(id) {
            return;
        }
        if let Some(targets) = adjacency.get(id) {
            for target in targets.clone() {
                visit(target, adjacency, visited, post);
            }
        }
        post.push(id.to_string());
    }

    for id in sorted_ids {
        visit(id, &adjacency, &mut visited, &mut post);
    }
    post.reverse();
    post
}

/// Tokenize text for the built-in index and for FTS query sanitization.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
