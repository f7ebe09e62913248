//! Extract code entities (functions, classes, methods) from ASTs.

use crate::languages::{field_text, has_child_kind, text};
use crate::{CodeEntity, CodeEntityKind};
use rpg_core::model::SourceLanguage;

/// Extract entities from a parsed tree, ordered by position.
pub fn extract(tree: &tree_sitter::Tree, source: &str, language: SourceLanguage) -> Vec<CodeEntity> {
    let mut entities = Vec::new();
    let root = tree.root_node();
    match language {
        SourceLanguage::Python => walk_python(&root, source, None, &mut entities),
        SourceLanguage::Rust => walk_rust(&root, source, None, &mut entities),
        SourceLanguage::TypeScript | SourceLanguage::JavaScript => {
            walk_js(&root, source, None, &mut entities);
        }
        SourceLanguage::Go => walk_go(&root, source, &mut entities),
        SourceLanguage::Java => walk_java(&root, source, None, &mut entities),
    }
    entities
}

fn make_entity(
    node: &tree_sitter::Node,
    source: &str,
    kind: CodeEntityKind,
    name: &str,
    parent: Option<&str>,
) -> CodeEntity {
    CodeEntity {
        kind,
        name: name.to_string(),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        parameters: Vec::new(),
        return_type: None,
        parent: parent.map(String::from),
        source_text: text(node, source).to_string(),
    }
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

fn walk_python(
    node: &tree_sitter::Node,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<CodeEntity>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" | "async_function_definition" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let kind = if parent_class.is_some() {
                        CodeEntityKind::Method
                    } else {
                        CodeEntityKind::Function
                    };
                    let mut entity = make_entity(&child, source, kind, &name, parent_class);
                    entity.parameters = python_parameters(&child, source);
                    entity.return_type = field_text(&child, "return_type", source);
                    entities.push(entity);
                }
            }
            // @property, @staticmethod and friends wrap the definition.
            "decorated_definition" => {
                walk_python(&child, source, parent_class, entities);
            }
            "class_definition" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(make_entity(&child, source, CodeEntityKind::Class, &name, None));
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_python(&body, source, Some(&name), entities);
                    }
                }
            }
            _ => {
                if parent_class.is_none() {
                    walk_python(&child, source, None, entities);
                }
            }
        }
    }
}

fn python_parameters(node: &tree_sitter::Node, source: &str) -> Vec<String> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        let name = match child.kind() {
            "identifier" => Some(text(&child, source).to_string()),
            "typed_parameter" | "default_parameter" | "typed_default_parameter" => child
                .child_by_field_name("name")
                .or_else(|| child.child(0).filter(|n| n.kind() == "identifier"))
                .map(|n| text(&n, source).to_string()),
            _ => None,
        };
        if let Some(name) = name
            && name != "self"
            && name != "cls"
        {
            out.push(name);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Rust
// ---------------------------------------------------------------------------

fn walk_rust(
    node: &tree_sitter::Node,
    source: &str,
    parent_type: Option<&str>,
    entities: &mut Vec<CodeEntity>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_item" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let kind = if parent_type.is_some() {
                        CodeEntityKind::Method
                    } else {
                        CodeEntityKind::Function
                    };
                    let mut entity = make_entity(&child, source, kind, &name, parent_type);
                    entity.parameters = rust_parameters(&child, source);
                    entity.return_type = field_text(&child, "return_type", source)
                        .map(|t| t.trim_start_matches("->").trim().to_string());
                    entities.push(entity);
                }
            }
            "struct_item" | "enum_item" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(make_entity(&child, source, CodeEntityKind::Class, &name, None));
                }
            }
            "trait_item" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(make_entity(&child, source, CodeEntityKind::Class, &name, None));
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_rust(&body, source, Some(&name), entities);
                    }
                }
            }
            "impl_item" => {
                if let Some(type_name) = field_text(&child, "type", source)
                    && let Some(body) = child.child_by_field_name("body")
                {
                    walk_rust(&body, source, Some(&type_name), entities);
                }
            }
            _ => {
                if parent_type.is_none() {
                    walk_rust(&child, source, None, entities);
                }
            }
        }
    }
}

fn rust_parameters(node: &tree_sitter::Node, source: &str) -> Vec<String> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        if child.kind() == "parameter" {
            let raw = text(&child, source);
            let name = raw.split_once(':').map_or(raw, |(n, _)| n).trim();
            if !name.is_empty() {
                out.push(name.to_string());
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// TypeScript / JavaScript
// ---------------------------------------------------------------------------

fn walk_js(
    node: &tree_sitter::Node,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<CodeEntity>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let kind = if parent_class.is_some() {
                        CodeEntityKind::Method
                    } else {
                        CodeEntityKind::Function
                    };
                    let mut entity = make_entity(&child, source, kind, &name, parent_class);
                    entity.parameters = js_parameters(&child, source);
                    entity.return_type = field_text(&child, "return_type", source)
                        .map(|t| t.trim_start_matches(':').trim().to_string());
                    entities.push(entity);
                }
            }
            "class_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(make_entity(&child, source, CodeEntityKind::Class, &name, None));
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_js(&body, source, Some(&name), entities);
                    }
                }
            }
            // TS only; absent kinds simply never match for JS.
            "interface_declaration" | "type_alias_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(make_entity(&child, source, CodeEntityKind::Class, &name, None));
                }
            }
            "method_definition" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let mut entity =
                        make_entity(&child, source, CodeEntityKind::Method, &name, parent_class);
                    entity.parameters = js_parameters(&child, source);
                    entities.push(entity);
                }
            }
            // Arrow functions assigned to a named declaration bind the
            // declared name: const greet = () => {}
            "lexical_declaration" | "variable_declaration" => {
                let mut inner = child.walk();
                for decl in child.children(&mut inner) {
                    if decl.kind() != "variable_declarator" {
                        continue;
                    }
                    let is_function = has_child_kind(&decl, "arrow_function")
                        || has_child_kind(&decl, "function_expression")
                        || has_child_kind(&decl, "function");
                    if is_function
                        && let Some(name) = field_text(&decl, "name", source)
                    {
                        entities.push(make_entity(
                            &child,
                            source,
                            CodeEntityKind::Function,
                            &name,
                            parent_class,
                        ));
                    }
                }
            }
            "export_statement" => {
                walk_js(&child, source, parent_class, entities);
            }
            _ => {
                if parent_class.is_none() {
                    walk_js(&child, source, None, entities);
                }
            }
        }
    }
}

fn js_parameters(node: &tree_sitter::Node, source: &str) -> Vec<String> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        match child.kind() {
            "identifier" => out.push(text(&child, source).to_string()),
            "required_parameter" | "optional_parameter" => {
                if let Some(name) = field_text(&child, "pattern", source) {
                    out.push(name);
                }
            }
            _ => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Go
// ---------------------------------------------------------------------------

fn walk_go(node: &tree_sitter::Node, source: &str, entities: &mut Vec<CodeEntity>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(make_entity(&child, source, CodeEntityKind::Function, &name, None));
                }
            }
            "method_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let receiver = go_receiver_type(&child, source);
                    entities.push(make_entity(
                        &child,
                        source,
                        CodeEntityKind::Method,
                        &name,
                        receiver.as_deref(),
                    ));
                }
            }
            "type_declaration" => {
                let mut tc = child.walk();
                for spec in child.children(&mut tc) {
                    if spec.kind() == "type_spec"
                        && let Some(name) = field_text(&spec, "name", source)
                    {
                        entities.push(make_entity(&spec, source, CodeEntityKind::Class, &name, None));
                    }
                }
            }
            _ => {}
        }
    }
}

fn go_receiver_type(node: &tree_sitter::Node, source: &str) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    receiver
        .children(&mut cursor)
        .find(|n| n.kind() == "parameter_declaration")
        .and_then(|pd| pd.child_by_field_name("type"))
        .map(|t| text(&t, source).trim_start_matches('*').to_string())
}

// ---------------------------------------------------------------------------
// Java
// ---------------------------------------------------------------------------

fn walk_java(
    node: &tree_sitter::Node,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<CodeEntity>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_declaration" | "interface_declaration" | "enum_declaration"
            | "record_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(make_entity(
                        &child,
                        source,
                        CodeEntityKind::Class,
                        &name,
                        parent_class,
                    ));
                    if let Some(body) = child.child_by_field_name("body") {
                        walk_java(&body, source, Some(&name), entities);
                    }
                }
            }
            "method_declaration" | "constructor_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let mut entity =
                        make_entity(&child, source, CodeEntityKind::Method, &name, parent_class);
                    entity.return_type = field_text(&child, "type", source);
                    entities.push(entity);
                }
            }
            _ => {
                walk_java(&child, source, parent_class, entities);
            }
        }
    }
}
