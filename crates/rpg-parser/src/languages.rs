//! Grammar loading and parse-tree construction.

use rpg_core::model::SourceLanguage;

/// The tree-sitter grammar for a language.
pub fn grammar(language: SourceLanguage) -> tree_sitter::Language {
    match language {
        SourceLanguage::Python => tree_sitter_python::LANGUAGE.into(),
        SourceLanguage::Rust => tree_sitter_rust::LANGUAGE.into(),
        SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TSX.into(),
        SourceLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        SourceLanguage::Go => tree_sitter_go::LANGUAGE.into(),
        SourceLanguage::Java => tree_sitter_java::LANGUAGE.into(),
    }
}

/// Parse source text into a tree. Errors describe grammar setup or total
/// parse failure; syntax errors inside the tree are the caller's concern.
pub fn parse_tree(source: &str, language: SourceLanguage) -> Result<tree_sitter::Tree, String> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&grammar(language))
        .map_err(|e| format!("failed to load {} grammar: {e}", language.name()))?;
    parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| format!("{} parser produced no tree", language.name()))
}

/// Text of a node.
pub(crate) fn text<'s>(node: &tree_sitter::Node, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

/// Text of a named field child, if present.
pub(crate) fn field_text(node: &tree_sitter::Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| text(&n, source).to_string())
}

/// Whether the node has a direct child of the given kind.
pub(crate) fn has_child_kind(node: &tree_sitter::Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| c.kind() == kind)
}
