//! Extract import statements with symbol and alias bindings.

use crate::languages::text;
use crate::{ImportRecord, ImportSymbol};
use rpg_core::model::SourceLanguage;

/// Extract imports from a parsed tree, ordered by position.
pub fn extract(
    tree: &tree_sitter::Tree,
    source: &str,
    language: SourceLanguage,
) -> Vec<ImportRecord> {
    let mut imports = Vec::new();
    let root = tree.root_node();
    match language {
        SourceLanguage::Python => walk_python(&root, source, &mut imports),
        SourceLanguage::Rust => walk_rust(&root, source, &mut imports),
        SourceLanguage::TypeScript | SourceLanguage::JavaScript => {
            walk_js(&root, source, &mut imports);
        }
        SourceLanguage::Go => walk_go(&root, source, &mut imports),
        SourceLanguage::Java => walk_java(&root, source, &mut imports),
    }
    imports
}

fn line_of(node: &tree_sitter::Node) -> usize {
    node.start_position().row + 1
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

fn walk_python(node: &tree_sitter::Node, source: &str, imports: &mut Vec<ImportRecord>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_statement" | "import_from_statement" => {
                if let Some(record) = parse_python_import(text(&child, source), line_of(&child)) {
                    imports.push(record);
                }
            }
            _ => walk_python(&child, source, imports),
        }
    }
}

fn parse_python_import(stmt: &str, line: usize) -> Option<ImportRecord> {
    let stmt = stmt.trim();
    if let Some(rest) = stmt.strip_prefix("from ") {
        let (module, names) = rest.split_once(" import ")?;
        let symbols = names
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split(',')
            .filter_map(parse_aliased)
            .filter(|s| s.name != "*")
            .collect();
        return Some(ImportRecord {
            module: module.trim().to_string(),
            symbols,
            line,
        });
    }
    if let Some(rest) = stmt.strip_prefix("import ") {
        // `import a.b as c` binds c; `import a.b` binds the module itself.
        let symbol = parse_aliased(rest)?;
        return Some(ImportRecord {
            module: symbol.name.clone(),
            symbols: symbol.alias.is_some().then_some(symbol).into_iter().collect(),
            line,
        });
    }
    None
}

fn parse_aliased(fragment: &str) -> Option<ImportSymbol> {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return None;
    }
    match fragment.split_once(" as ") {
        Some((name, alias)) => Some(ImportSymbol {
            name: name.trim().to_string(),
            alias: Some(alias.trim().to_string()),
        }),
        None => Some(ImportSymbol::plain(fragment)),
    }
}

// ---------------------------------------------------------------------------
// Rust
// ---------------------------------------------------------------------------

fn walk_rust(node: &tree_sitter::Node, source: &str, imports: &mut Vec<ImportRecord>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "use_declaration" {
            imports.push(parse_rust_use(text(&child, source), line_of(&child)));
        } else {
            walk_rust(&child, source, imports);
        }
    }
}

fn parse_rust_use(stmt: &str, line: usize) -> ImportRecord {
    let mut body = stmt.trim();
    if let Some(rest) = body.strip_prefix("pub") {
        // pub, pub(crate), pub(super), pub(in path)
        body = match rest.trim_start().strip_prefix('(') {
            Some(inner) => inner.split_once(')').map_or(rest, |(_, tail)| tail).trim(),
            None => rest.trim(),
        };
    }
    let body = body
        .trim_start_matches("use ")
        .trim_end_matches(';')
        .trim();

    if let Some((module, tail)) = body.rsplit_once("::") {
        let tail = tail.trim();
        if let Some(group) = tail.strip_prefix('{') {
            let symbols = group
                .trim_end_matches('}')
                .split(',')
                .filter_map(parse_aliased)
                .collect();
            return ImportRecord {
                module: module.to_string(),
                symbols,
                line,
            };
        }
        let symbols = parse_aliased(tail).into_iter().filter(|s| s.name != "*").collect();
        return ImportRecord {
            module: module.to_string(),
            symbols,
            line,
        };
    }
    ImportRecord {
        module: body.to_string(),
        symbols: Vec::new(),
        line,
    }
}

// ---------------------------------------------------------------------------
// TypeScript / JavaScript
// ---------------------------------------------------------------------------

fn walk_js(node: &tree_sitter::Node, source: &str, imports: &mut Vec<ImportRecord>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_statement" => {
                if let Some(src) = child.child_by_field_name("source") {
                    let module = text(&src, source)
                        .trim_matches(|c: char| c == '\'' || c == '"')
                        .to_string();
                    let mut symbols = Vec::new();
                    let mut ic = child.walk();
                    for clause in child.children(&mut ic) {
                        if clause.kind() == "import_clause" {
                            collect_js_import_names(&clause, source, &mut symbols);
                        }
                    }
                    imports.push(ImportRecord {
                        module,
                        symbols,
                        line: line_of(&child),
                    });
                }
            }
            // export { X } from './y' re-imports X for the re-export.
            "export_statement" => {
                if let Some(src) = child.child_by_field_name("source") {
                    let module = text(&src, source)
                        .trim_matches(|c: char| c == '\'' || c == '"')
                        .to_string();
                    imports.push(ImportRecord {
                        module,
                        symbols: Vec::new(),
                        line: line_of(&child),
                    });
                }
            }
            _ => walk_js(&child, source, imports),
        }
    }
}

fn collect_js_import_names(node: &tree_sitter::Node, source: &str, symbols: &mut Vec<ImportSymbol>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "identifier" => symbols.push(ImportSymbol::plain(text(&child, source))),
            "named_imports" => {
                let mut ic = child.walk();
                for spec in child.children(&mut ic) {
                    if spec.kind() == "import_specifier" {
                        let name = spec
                            .child_by_field_name("name")
                            .map(|n| text(&n, source).to_string());
                        let alias = spec
                            .child_by_field_name("alias")
                            .map(|n| text(&n, source).to_string());
                        if let Some(name) = name {
                            symbols.push(ImportSymbol { name, alias });
                        }
                    }
                }
            }
            "namespace_import" => {
                // import * as ns from './mod'
                let mut ic = child.walk();
                if let Some(alias) = child
                    .children(&mut ic)
                    .find(|n| n.kind() == "identifier")
                    .map(|n| text(&n, source).to_string())
                {
                    symbols.push(ImportSymbol {
                        name: "*".to_string(),
                        alias: Some(alias),
                    });
                }
            }
            _ => collect_js_import_names(&child, source, symbols),
        }
    }
}

// ---------------------------------------------------------------------------
// Go
// ---------------------------------------------------------------------------

fn walk_go(node: &tree_sitter::Node, source: &str, imports: &mut Vec<ImportRecord>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_declaration" {
            let mut ic = child.walk();
            for spec in child.children(&mut ic) {
                match spec.kind() {
                    "import_spec" => push_go_spec(&spec, source, imports),
                    "import_spec_list" => {
                        let mut lc = spec.walk();
                        for item in spec.children(&mut lc) {
                            if item.kind() == "import_spec" {
                                push_go_spec(&item, source, imports);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

fn push_go_spec(spec: &tree_sitter::Node, source: &str, imports: &mut Vec<ImportRecord>) {
    let Some(path) = spec.child_by_field_name("path") else {
        return;
    };
    let module = text(&path, source).trim_matches('"').to_string();
    let alias = spec
        .child_by_field_name("name")
        .map(|n| text(&n, source).to_string());
    let package = module.rsplit('/').next().unwrap_or(&module).to_string();
    imports.push(ImportRecord {
        module,
        symbols: vec![ImportSymbol {
            name: package,
            alias,
        }],
        line: line_of(spec),
    });
}

// ---------------------------------------------------------------------------
// Java
// ---------------------------------------------------------------------------

fn walk_java(node: &tree_sitter::Node, source: &str, imports: &mut Vec<ImportRecord>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_declaration" {
            let stmt = text(&child, source)
                .trim_start_matches("import")
                .trim_end_matches(';')
                .trim()
                .trim_start_matches("static ")
                .to_string();
            let (module, symbol) = match stmt.rsplit_once('.') {
                Some((module, last)) if last != "*" => {
                    (module.to_string(), Some(ImportSymbol::plain(last)))
                }
                Some((module, _)) => (module.to_string(), None),
                None => (stmt, None),
            };
            imports.push(ImportRecord {
                module,
                symbols: symbol.into_iter().collect(),
                line: line_of(&child),
            });
        }
    }
}
