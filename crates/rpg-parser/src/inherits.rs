//! Extract inheritance and implementation relations.

use crate::languages::text;
use crate::{InheritKind, InheritanceRelation};
use rpg_core::model::SourceLanguage;

/// Extract inheritance relations from a parsed tree.
pub fn extract(
    tree: &tree_sitter::Tree,
    source: &str,
    language: SourceLanguage,
) -> Vec<InheritanceRelation> {
    let mut relations = Vec::new();
    walk(&tree.root_node(), source, language, &mut relations);
    relations
}

fn walk(
    node: &tree_sitter::Node,
    source: &str,
    language: SourceLanguage,
    relations: &mut Vec<InheritanceRelation>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match (language, child.kind()) {
            (SourceLanguage::Python, "class_definition") => {
                if let Some(name) = child.child_by_field_name("name") {
                    let class_name = text(&name, source);
                    if let Some(bases) = child.child_by_field_name("superclasses") {
                        for base in parse_python_bases(text(&bases, source)) {
                            relations.push(InheritanceRelation {
                                child: class_name.to_string(),
                                parent: base,
                                kind: InheritKind::Extends,
                                line: child.start_position().row + 1,
                            });
                        }
                    }
                }
            }
            (
                SourceLanguage::TypeScript | SourceLanguage::JavaScript,
                "class_declaration",
            ) => {
                if let Some(name) = child.child_by_field_name("name") {
                    let class_name = text(&name, source);
                    let mut ic = child.walk();
                    for heritage in child.children(&mut ic) {
                        if heritage.kind() == "class_heritage" {
                            parse_js_heritage(
                                text(&heritage, source),
                                class_name,
                                child.start_position().row + 1,
                                relations,
                            );
                        }
                    }
                }
            }
            (SourceLanguage::Java, "class_declaration" | "interface_declaration") => {
                if let Some(name) = child.child_by_field_name("name") {
                    let class_name = text(&name, source).to_string();
                    let line = child.start_position().row + 1;
                    if let Some(superclass) = child.child_by_field_name("superclass") {
                        let parent = text(&superclass, source)
                            .trim_start_matches("extends")
                            .trim()
                            .to_string();
                        if !parent.is_empty() {
                            relations.push(InheritanceRelation {
                                child: class_name.clone(),
                                parent,
                                kind: InheritKind::Extends,
                                line,
                            });
                        }
                    }
                    if let Some(interfaces) = child.child_by_field_name("interfaces") {
                        for parent in text(&interfaces, source)
                            .trim_start_matches("implements")
                            .split(',')
                            .map(|s| strip_generics(s.trim()))
                            .filter(|s| !s.is_empty())
                        {
                            relations.push(InheritanceRelation {
                                child: class_name.clone(),
                                parent,
                                kind: InheritKind::Implements,
                                line,
                            });
                        }
                    }
                }
            }
            (SourceLanguage::Rust, "impl_item") => {
                // `impl Trait for Type` is a trait implementation.
                if let Some(trait_node) = child.child_by_field_name("trait")
                    && let Some(type_node) = child.child_by_field_name("type")
                {
                    relations.push(InheritanceRelation {
                        child: strip_generics(text(&type_node, source)),
                        parent: strip_generics(text(&trait_node, source)),
                        kind: InheritKind::Implements,
                        line: child.start_position().row + 1,
                    });
                }
            }
            // Go has no inheritance.
            _ => {}
        }
        walk(&child, source, language, relations);
    }
}

fn parse_python_bases(bases: &str) -> Vec<String> {
    bases
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(|s| strip_generics(s.trim()))
        .filter(|s| !s.is_empty() && s != "object")
        .collect()
}

fn parse_js_heritage(
    heritage: &str,
    class_name: &str,
    line: usize,
    relations: &mut Vec<InheritanceRelation>,
) {
    // "extends Foo implements Bar, Baz": mode switches on the keywords.
    let mut kind = InheritKind::Extends;
    for token in heritage.split([' ', ',']) {
        let token = token.trim();
        match token {
            "" => {}
            "extends" => kind = InheritKind::Extends,
            "implements" => kind = InheritKind::Implements,
            parent => relations.push(InheritanceRelation {
                child: class_name.to_string(),
                parent: strip_generics(parent),
                kind,
                line,
            }),
        }
    }
}

/// Drop a trailing generic argument list: `Base<T>` → `Base`.
fn strip_generics(name: &str) -> String {
    match name.find(['<', '(']) {
        Some(idx) => name[..idx].trim().to_string(),
        None => name.trim().to_string(),
    }
}
