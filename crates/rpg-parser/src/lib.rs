//! The AST surface: tree-sitter based extraction of entities, imports, call
//! sites, and inheritance relations for six languages.
//!
//! Malformed input never aborts the pipeline: grammar failures yield an empty
//! [`ParseResult`] with non-empty `errors`, and recoverable syntax errors are
//! recorded alongside whatever the parser could still extract.

pub mod calls;
pub mod entities;
pub mod imports;
pub mod inherits;
pub mod languages;

use rpg_core::model::{EntityType, SourceLanguage};

/// The kind of code entity extracted from source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeEntityKind {
    Function,
    Class,
    Method,
    Variable,
    Import,
}

impl CodeEntityKind {
    /// Map to the structural entity type carried on graph nodes. Variables
    /// and imports are not lifted into nodes.
    pub fn entity_type(self) -> Option<EntityType> {
        match self {
            Self::Function => Some(EntityType::Function),
            Self::Class => Some(EntityType::Class),
            Self::Method => Some(EntityType::Method),
            Self::Variable | Self::Import => None,
        }
    }
}

/// A code entity extracted from the AST.
#[derive(Debug, Clone)]
pub struct CodeEntity {
    pub kind: CodeEntityKind,
    pub name: String,
    /// 1-indexed, inclusive.
    pub start_line: usize,
    pub end_line: usize,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    /// Enclosing class/impl/type name, when nested.
    pub parent: Option<String>,
    pub source_text: String,
}

impl CodeEntity {
    /// Dot-qualified name: `Class.method` for nested entities, bare name
    /// otherwise. Line numbers are deliberately excluded so ids stay stable
    /// when diffs shift code.
    pub fn qualified_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{parent}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// One imported symbol, possibly aliased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSymbol {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportSymbol {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    /// The name the symbol is bound to in the importing file.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// An import statement: module specifier plus imported symbols.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub module: String,
    pub symbols: Vec<ImportSymbol>,
    pub line: usize,
}

/// Receiver classification for a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverKind {
    /// `self` / `this`.
    SelfRef,
    Super,
    Variable,
    None,
}

/// A call site recovered from the AST.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// The unqualified callee symbol.
    pub callee: String,
    pub caller_file: String,
    /// Dot-qualified enclosing context, e.g. `Class.method`.
    pub caller_entity: Option<String>,
    pub line: usize,
    /// Receiver expression text, e.g. `self.loader` or `client`.
    pub receiver: Option<String>,
    pub receiver_kind: ReceiverKind,
    /// The full callee expression as written, e.g. `client.fetch`.
    pub qualified_name: Option<String>,
}

/// Whether a relation is inheritance or interface/trait implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InheritKind {
    Extends,
    Implements,
}

/// An inheritance relation: child extends/implements parent.
#[derive(Debug, Clone)]
pub struct InheritanceRelation {
    pub child: String,
    pub parent: String,
    pub kind: InheritKind,
    pub line: usize,
}

/// Result of parsing one file.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub entities: Vec<CodeEntity>,
    pub imports: Vec<ImportRecord>,
    pub errors: Vec<String>,
}

/// Parse a source file into entities and imports.
pub fn parse(source: &str, language: SourceLanguage, path: &str) -> ParseResult {
    let tree = match languages::parse_tree(source, language) {
        Ok(tree) => tree,
        Err(err) => {
            return ParseResult {
                errors: vec![format!("{path}: {err}")],
                ..Default::default()
            };
        }
    };

    let mut result = ParseResult::default();
    if tree.root_node().has_error() {
        result
            .errors
            .push(format!("{path}: syntax errors; extracting valid regions"));
    }
    result.entities = entities::extract(&tree, source, language);
    result.imports = imports::extract(&tree, source, language);
    result
}

/// Extract call sites with enclosing-scope context.
pub fn extract_call_sites(source: &str, language: SourceLanguage, path: &str) -> Vec<CallSite> {
    let Ok(tree) = languages::parse_tree(source, language) else {
        return Vec::new();
    };
    calls::extract(&tree, source, language, path)
}

/// Extract inheritance and implementation relations.
pub fn extract_inheritances(
    source: &str,
    language: SourceLanguage,
    _path: &str,
) -> Vec<InheritanceRelation> {
    let Ok(tree) = languages::parse_tree(source, language) else {
        return Vec::new();
    };
    inherits::extract(&tree, source, language)
}
