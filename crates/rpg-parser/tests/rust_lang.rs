use rpg_core::model::SourceLanguage;
use rpg_parser::{CodeEntityKind, InheritKind};

const SOURCE: &str = r#"
use std::collections::HashMap;
use crate::store::{GraphStore, NodeFilter};

pub struct Graph {
    nodes: HashMap<String, String>,
}

pub trait Indexed {
    fn reindex(&mut self);
}

impl Graph {
    pub fn insert(&mut self, id: String) {
        self.nodes.insert(id.clone(), id);
    }
}

impl Indexed for Graph {
    fn reindex(&mut self) {
        self.rebuild();
    }
}

pub fn build() -> Graph {
    Graph::new()
}

pub enum Mode { Fast, Slow }
"#;

#[test]
fn extracts_items_and_impl_methods() {
    let result = rpg_parser::parse(SOURCE, SourceLanguage::Rust, "src/graph.rs");
    assert!(result.errors.is_empty());

    let find = |name: &str| result.entities.iter().find(|e| e.name == name).unwrap();
    assert_eq!(find("Graph").kind, CodeEntityKind::Class);
    assert_eq!(find("Indexed").kind, CodeEntityKind::Class);
    assert_eq!(find("Mode").kind, CodeEntityKind::Class);
    assert_eq!(find("build").kind, CodeEntityKind::Function);
    assert_eq!(find("insert").kind, CodeEntityKind::Method);
    assert_eq!(find("insert").qualified_name(), "Graph.insert");
}

#[test]
fn extracts_use_declarations() {
    let result = rpg_parser::parse(SOURCE, SourceLanguage::Rust, "src/graph.rs");
    let std_import = result
        .imports
        .iter()
        .find(|i| i.module == "std::collections")
        .unwrap();
    assert_eq!(std_import.symbols[0].name, "HashMap");

    let grouped = result
        .imports
        .iter()
        .find(|i| i.module == "crate::store")
        .unwrap();
    let names: Vec<&str> = grouped.symbols.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["GraphStore", "NodeFilter"]);
}

#[test]
fn call_sites_cover_paths_and_methods() {
    let calls = rpg_parser::extract_call_sites(SOURCE, SourceLanguage::Rust, "src/graph.rs");

    let new_call = calls.iter().find(|c| c.callee == "new").unwrap();
    assert_eq!(new_call.qualified_name.as_deref(), Some("Graph::new"));
    assert_eq!(new_call.caller_entity.as_deref(), Some("build"));

    let rebuild = calls.iter().find(|c| c.callee == "rebuild").unwrap();
    assert_eq!(rebuild.receiver.as_deref(), Some("self"));
    assert_eq!(rebuild.caller_entity.as_deref(), Some("Graph.reindex"));
}

#[test]
fn trait_impls_are_implement_relations() {
    let relations = rpg_parser::extract_inheritances(SOURCE, SourceLanguage::Rust, "src/graph.rs");
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].child, "Graph");
    assert_eq!(relations[0].parent, "Indexed");
    assert_eq!(relations[0].kind, InheritKind::Implements);
}
