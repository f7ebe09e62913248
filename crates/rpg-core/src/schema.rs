//! The canonical serialized graph format, version 1.0.0.

use crate::error::{Result, RpgError};
use crate::model::{Edge, GraphConfig, Node};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: &str = "1.0.0";

/// A serialized graph: one record holding config, nodes, and edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub version: String,
    pub config: GraphConfig,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphDocument {
    pub fn new(config: GraphConfig, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            config,
            nodes,
            edges,
        }
    }
}

/// Serialize a graph document to pretty-printed JSON.
pub fn to_json(doc: &GraphDocument) -> Result<String> {
    serde_json::to_string_pretty(doc).map_err(|e| RpgError::Store(e.to_string()))
}

/// Deserialize and version-check a graph document.
pub fn from_json(json: &str) -> Result<GraphDocument> {
    let doc: GraphDocument = serde_json::from_str(json)
        .map_err(|e| RpgError::Validation(format!("malformed graph document: {e}")))?;
    if doc.version != SCHEMA_VERSION {
        return Err(RpgError::Validation(format!(
            "graph schema version mismatch: expected {SCHEMA_VERSION}, found {}",
            doc.version
        )));
    }
    Ok(doc)
}
