//! The typed RPG façade over a graph store.
//!
//! Validates variant shape at the boundary (low-level nodes always carry a
//! path, functional edges stay a forest) and exposes hierarchy queries
//! without leaking store internals.

use crate::{GraphStore, native::NativeStore};
use rpg_core::error::{Result, RpgError};
use rpg_core::model::{
    DependencyType, Edge, FunctionalEdge, GraphConfig, HighLevelNode, LowLevelNode, Node,
    SemanticFeature, StructuralMetadata,
};

/// Arguments for a high-level node.
#[derive(Debug, Clone)]
pub struct HighLevelNodeArgs {
    pub id: String,
    pub feature: SemanticFeature,
    pub directory_path: Option<String>,
}

/// Arguments for a low-level node.
#[derive(Debug, Clone)]
pub struct LowLevelNodeArgs {
    pub id: String,
    pub feature: SemanticFeature,
    pub metadata: StructuralMetadata,
    pub source_code: Option<String>,
}

/// Arguments for a dependency edge.
#[derive(Debug, Clone)]
pub struct DependencyEdgeArgs {
    pub source: String,
    pub target: String,
    pub dependency_type: DependencyType,
    pub is_runtime: Option<bool>,
    pub line: Option<usize>,
}

/// Narrow a node to its high-level variant.
pub fn is_high_level(node: &Node) -> bool {
    node.is_high_level()
}

/// Narrow a node to its low-level variant.
pub fn is_low_level(node: &Node) -> bool {
    node.is_low_level()
}

/// Narrow an edge to the functional family.
pub fn is_functional(edge: &Edge) -> bool {
    edge.is_functional()
}

/// Narrow an edge to the dependency family.
pub fn is_dependency(edge: &Edge) -> bool {
    edge.is_dependency()
}

/// The Repository Planning Graph, wrapping an owned store.
pub struct Rpg {
    store: Box<dyn GraphStore>,
}

impl Rpg {
    pub fn new(store: Box<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// An ephemeral graph backed by the native in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Box::new(NativeStore::in_memory()))
    }

    /// Open a graph from a location spec (see [`crate::open`]).
    pub fn open(spec: &str) -> Result<Self> {
        Ok(Self::new(crate::open(spec)?))
    }

    pub fn store(&self) -> &dyn GraphStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn GraphStore {
        self.store.as_mut()
    }

    pub fn config(&self) -> GraphConfig {
        self.store.config()
    }

    pub fn set_config(&mut self, config: GraphConfig) -> Result<()> {
        self.store.set_config(config)
    }

    pub fn add_high_level_node(&mut self, args: HighLevelNodeArgs) -> Result<()> {
        if args.id.is_empty() {
            return Err(RpgError::Validation("node id must be non-empty".into()));
        }
        self.store.add_node(Node::HighLevel(HighLevelNode {
            id: args.id,
            feature: args.feature,
            metadata: None,
            directory_path: args.directory_path,
        }))
    }

    pub fn add_low_level_node(&mut self, args: LowLevelNodeArgs) -> Result<()> {
        if args.id.is_empty() {
            return Err(RpgError::Validation("node id must be non-empty".into()));
        }
        if args.metadata.path.as_deref().is_none_or(str::is_empty) {
            return Err(RpgError::Validation(format!(
                "low-level node {} requires a non-empty metadata path",
                args.id
            )));
        }
        self.store.add_node(Node::LowLevel(LowLevelNode {
            id: args.id,
            feature: args.feature,
            metadata: args.metadata,
            source_code: args.source_code,
        }))
    }

    /// Add a functional parent→child edge, keeping the hierarchy a forest:
    /// at most one incoming functional edge per node, and no edge whose
    /// ancestor chain already contains the target.
    pub fn add_functional_edge(&mut self, source: &str, target: &str) -> Result<bool> {
        if source == target {
            return Err(RpgError::Validation(format!(
                "functional self-edge on {source}"
            )));
        }
        if let Some(parent) = self.store.get_parent(target)? {
            if parent.id() == source {
                return Ok(false);
            }
            return Err(RpgError::Validation(format!(
                "node {target} already has functional parent {}",
                parent.id()
            )));
        }
        // Reject cycles: walking up from the source must not reach the target.
        let mut cursor = Some(source.to_string());
        while let Some(id) = cursor {
            if id == target {
                return Err(RpgError::Validation(format!(
                    "functional edge {source} -> {target} would create a cycle"
                )));
            }
            cursor = self.store.get_parent(&id)?.map(|n| n.id().to_string());
        }
        self.store.add_edge(Edge::Functional(FunctionalEdge {
            source: source.to_string(),
            target: target.to_string(),
            level: None,
            sibling_order: None,
        }))
    }

    pub fn add_dependency_edge(&mut self, args: DependencyEdgeArgs) -> Result<bool> {
        self.store
            .add_edge(Edge::Dependency(rpg_core::model::DependencyEdge {
                source: args.source,
                target: args.target,
                dependency_type: args.dependency_type,
                is_runtime: args.is_runtime,
                line: args.line,
            }))
    }

    /// Functional ancestor chain from the root down to `id`, inclusive.
    pub fn ancestry(&self, id: &str) -> Result<Vec<String>> {
        if self.store.get_node(id)?.is_none() {
            return Err(RpgError::NotFound(format!("node {id}")));
        }
        let mut chain = vec![id.to_string()];
        let mut cursor = id.to_string();
        while let Some(parent) = self.store.get_parent(&cursor)? {
            let parent_id = parent.id().to_string();
            if chain.contains(&parent_id) {
                break;
            }
            chain.push(parent_id.clone());
            cursor = parent_id;
        }
        chain.reverse();
        Ok(chain)
    }

    /// High-level roots: high-level nodes with no functional parent.
    pub fn hierarchy_roots(&self) -> Result<Vec<Node>> {
        let mut roots = Vec::new();
        for node in self.store.get_nodes(&crate::NodeFilter {
            high_level: Some(true),
            ..Default::default()
        })? {
            if self.store.get_parent(node.id())?.is_none() {
                roots.push(node);
            }
        }
        Ok(roots)
    }
}
