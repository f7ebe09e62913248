//! Graph data model: nodes, edges, semantic features, and structural metadata.
//!
//! The graph is heterogeneous over a shared node set: `HighLevel` nodes carry
//! architectural intent, `LowLevel` nodes anchor concrete code entities. Two
//! disjoint edge families layer over the nodes: `Functional` hierarchy edges
//! and `Dependency` edges recovered from ASTs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The structural role of a node's underlying artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    #[default]
    Module,
    File,
    Class,
    Function,
    Method,
}

impl EntityType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::File => "file",
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
        }
    }
}

/// Source languages the AST surface understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    TypeScript,
    JavaScript,
    Python,
    Rust,
    Go,
    Java,
}

impl SourceLanguage {
    /// Detect language from a file extension. Detection is by extension alone.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" | "tsx" => Some(Self::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "py" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    /// Detect language from a relative file path.
    pub fn from_path(path: &str) -> Option<Self> {
        path.rsplit_once('.').and_then(|(_, ext)| Self::from_extension(ext))
    }

    /// Extensions tried when resolving an extensionless import specifier.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::TypeScript => &["ts", "tsx", "js", "jsx"],
            Self::JavaScript => &["js", "jsx", "mjs", "cjs", "ts", "tsx"],
            Self::Python => &["py"],
            Self::Rust => &["rs"],
            Self::Go => &["go"],
            Self::Java => &["java"],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
        }
    }
}

/// A semantic feature: short behavioral description plus keywords.
///
/// After normalization the description is lowercase, 3-8 words, verb+object,
/// free of punctuation and implementation jargon, and single-responsibility
/// (multi-responsibility phrases are split into `sub_features`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticFeature {
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_features: Option<Vec<String>>,
}

impl SemanticFeature {
    pub fn new(description: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            description: description.into(),
            keywords,
            sub_features: None,
        }
    }

    /// All indexed text for this feature: description, keywords, sub-features.
    pub fn index_text(&self) -> String {
        let mut text = self.description.clone();
        for kw in &self.keywords {
            text.push(' ');
            text.push_str(kw);
        }
        if let Some(subs) = &self.sub_features {
            for sub in subs {
                text.push(' ');
                text.push_str(sub);
            }
        }
        text
    }
}

/// Structural metadata anchoring a node to the repository artifact it covers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralMetadata {
    #[serde(default)]
    pub entity_type: EntityType,
    /// Relative, POSIX-separated path. Always present on low-level nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<SourceLanguage>,
    /// 1-indexed, inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    /// Open key/value bag. `paths` holds the sorted multi-LCA path list for
    /// high-level nodes grounded in more than one directory.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Key under `StructuralMetadata::extra` holding the sorted multi-LCA paths.
pub const EXTRA_PATHS_KEY: &str = "paths";

impl StructuralMetadata {
    pub fn for_entity(
        entity_type: EntityType,
        path: impl Into<String>,
        qualified_name: impl Into<String>,
        language: SourceLanguage,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        Self {
            entity_type,
            path: Some(path.into()),
            qualified_name: Some(qualified_name.into()),
            language: Some(language),
            start_line: Some(start_line),
            end_line: Some(end_line),
            extra: BTreeMap::new(),
        }
    }

    /// The multi-LCA path list from `extra.paths`, if present.
    pub fn extra_paths(&self) -> Vec<String> {
        self.extra
            .get(EXTRA_PATHS_KEY)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_extra_paths(&mut self, paths: Vec<String>) {
        self.extra.insert(
            EXTRA_PATHS_KEY.to_string(),
            serde_json::Value::Array(paths.into_iter().map(serde_json::Value::String).collect()),
        );
    }
}

/// A high-level node: an abstract functional centroid in the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighLevelNode {
    pub id: String,
    pub feature: SemanticFeature,
    /// Populated by artifact grounding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<StructuralMetadata>,
    /// Deprecated: overlaps `metadata.path` after grounding. Preserved on
    /// round-trip, never written by grounding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_path: Option<String>,
}

/// A low-level node: a concrete code entity (file, class, function, method).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowLevelNode {
    pub id: String,
    pub feature: SemanticFeature,
    pub metadata: StructuralMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
}

/// A graph node, polymorphic over the two variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    HighLevel(HighLevelNode),
    LowLevel(LowLevelNode),
}

impl Node {
    pub fn high_level(id: impl Into<String>, feature: SemanticFeature) -> Self {
        Self::HighLevel(HighLevelNode {
            id: id.into(),
            feature,
            metadata: None,
            directory_path: None,
        })
    }

    pub fn low_level(
        id: impl Into<String>,
        feature: SemanticFeature,
        metadata: StructuralMetadata,
    ) -> Self {
        Self::LowLevel(LowLevelNode {
            id: id.into(),
            feature,
            metadata,
            source_code: None,
        })
    }

    pub fn id(&self) -> &str {
        match self {
            Self::HighLevel(n) => &n.id,
            Self::LowLevel(n) => &n.id,
        }
    }

    pub fn feature(&self) -> &SemanticFeature {
        match self {
            Self::HighLevel(n) => &n.feature,
            Self::LowLevel(n) => &n.feature,
        }
    }

    pub fn feature_mut(&mut self) -> &mut SemanticFeature {
        match self {
            Self::HighLevel(n) => &mut n.feature,
            Self::LowLevel(n) => &mut n.feature,
        }
    }

    pub fn metadata(&self) -> Option<&StructuralMetadata> {
        match self {
            Self::HighLevel(n) => n.metadata.as_ref(),
            Self::LowLevel(n) => Some(&n.metadata),
        }
    }

    pub fn metadata_mut(&mut self) -> Option<&mut StructuralMetadata> {
        match self {
            Self::HighLevel(n) => n.metadata.as_mut(),
            Self::LowLevel(n) => Some(&mut n.metadata),
        }
    }

    pub fn is_high_level(&self) -> bool {
        matches!(self, Self::HighLevel(_))
    }

    pub fn is_low_level(&self) -> bool {
        matches!(self, Self::LowLevel(_))
    }

    /// The node's grounded path, if any.
    pub fn path(&self) -> Option<&str> {
        self.metadata().and_then(|m| m.path.as_deref())
    }

    /// All grounded paths: `metadata.path` plus each entry of
    /// `metadata.extra.paths`.
    pub fn grounded_paths(&self) -> Vec<String> {
        let Some(meta) = self.metadata() else {
            return Vec::new();
        };
        let mut paths: Vec<String> = meta.path.iter().cloned().collect();
        for extra in meta.extra_paths() {
            if !paths.contains(&extra) {
                paths.push(extra);
            }
        }
        paths
    }

    pub fn source_code(&self) -> Option<&str> {
        match self {
            Self::HighLevel(_) => None,
            Self::LowLevel(n) => n.source_code.as_deref(),
        }
    }
}

/// The relation a dependency edge encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Import,
    Call,
    Inherit,
    Implement,
    Use,
}

impl DependencyType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Call => "call",
            Self::Inherit => "inherit",
            Self::Implement => "implement",
            Self::Use => "use",
        }
    }
}

/// A functional (hierarchy) edge: source is the parent of target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionalEdge {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_order: Option<u32>,
}

/// A dependency edge recovered from AST analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
    pub dependency_type: DependencyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_runtime: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

/// A graph edge, polymorphic over the two families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Edge {
    Functional(FunctionalEdge),
    Dependency(DependencyEdge),
}

/// Edge identity within the graph: `(source, target, kind)`. Dependency
/// edges of different relation types may coexist between the same endpoints;
/// exact duplicates collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    Functional,
    Dependency(DependencyType),
}

impl Edge {
    pub fn functional(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Functional(FunctionalEdge {
            source: source.into(),
            target: target.into(),
            level: None,
            sibling_order: None,
        })
    }

    pub fn dependency(
        source: impl Into<String>,
        target: impl Into<String>,
        dependency_type: DependencyType,
    ) -> Self {
        Self::Dependency(DependencyEdge {
            source: source.into(),
            target: target.into(),
            dependency_type,
            is_runtime: None,
            line: None,
        })
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Functional(e) => &e.source,
            Self::Dependency(e) => &e.source,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Self::Functional(e) => &e.target,
            Self::Dependency(e) => &e.target,
        }
    }

    pub fn kind(&self) -> EdgeKind {
        match self {
            Self::Functional(_) => EdgeKind::Functional,
            Self::Dependency(e) => EdgeKind::Dependency(e.dependency_type),
        }
    }

    pub fn is_functional(&self) -> bool {
        matches!(self, Self::Functional(_))
    }

    pub fn is_dependency(&self) -> bool {
        matches!(self, Self::Dependency(_))
    }

    /// Identity key for deduplication and removal.
    pub fn key(&self) -> (String, String, EdgeKind) {
        (
            self.source().to_string(),
            self.target().to_string(),
            self.kind(),
        )
    }
}

/// Top-level graph configuration carried by the serialized artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_serde_tags() {
        let node = Node::high_level("domain:Auth", SemanticFeature::new("validate credentials", vec![]));
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"type\":\"high_level\""));

        let meta = StructuralMetadata::for_entity(
            EntityType::Function,
            "src/a.ts",
            "greet",
            SourceLanguage::TypeScript,
            1,
            3,
        );
        let node = Node::low_level("src/a.ts:function:greet", SemanticFeature::default(), meta);
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"type\":\"low_level\""));
        assert!(json.contains("\"entityType\":\"function\""));
        assert!(json.contains("\"language\":\"typescript\""));

        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), "src/a.ts:function:greet");
        assert!(back.is_low_level());
    }

    #[test]
    fn edge_serde_tags() {
        let edge = Edge::dependency("a", "b", DependencyType::Import);
        let json = serde_json::to_string(&edge).unwrap();
        assert!(json.contains("\"type\":\"dependency\""));
        assert!(json.contains("\"dependencyType\":\"import\""));

        let edge = Edge::functional("a", "b");
        let json = serde_json::to_string(&edge).unwrap();
        assert!(json.contains("\"type\":\"functional\""));
    }

    #[test]
    fn edge_keys_distinguish_dependency_types() {
        let import = Edge::dependency("a", "b", DependencyType::Import);
        let call = Edge::dependency("a", "b", DependencyType::Call);
        assert_ne!(import.key(), call.key());
        assert_eq!(import.key(), import.clone().key());
    }

    #[test]
    fn grounded_paths_merge_extra() {
        let mut meta = StructuralMetadata {
            entity_type: EntityType::Module,
            path: Some("src/utils".to_string()),
            ..Default::default()
        };
        meta.set_extra_paths(vec!["src/utils".to_string(), "tests/utils".to_string()]);
        let node = Node::HighLevel(HighLevelNode {
            id: "h".to_string(),
            feature: SemanticFeature::default(),
            metadata: Some(meta),
            directory_path: None,
        });
        assert_eq!(node.grounded_paths(), vec!["src/utils", "tests/utils"]);
    }

    #[test]
    fn language_detection_by_extension() {
        assert_eq!(SourceLanguage::from_path("src/a.tsx"), Some(SourceLanguage::TypeScript));
        assert_eq!(SourceLanguage::from_path("lib/b.py"), Some(SourceLanguage::Python));
        assert_eq!(SourceLanguage::from_path("Makefile"), None);
    }
}
