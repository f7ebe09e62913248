//! Dependency injection: resolve imports, build the symbol table, extract
//! calls and inheritance, apply type inference, and emit dependency edges.

use crate::infer::infer_receiver_class;
use rpg_core::config::InjectorConfig;
use rpg_core::error::Result;
use rpg_core::lca::parent_dir;
use rpg_core::model::{DependencyType, EntityType, SourceLanguage};
use rpg_store::rpg::{DependencyEdgeArgs, Rpg};
use rpg_store::{GraphStore, NodeFilter};
use rpg_parser::{
    CallSite, CodeEntity, ImportRecord, InheritKind, InheritanceRelation, ParseResult,
};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Everything dependency injection needs to know about one file.
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    pub path: String,
    pub language: SourceLanguage,
    pub entities: Vec<CodeEntity>,
    pub imports: Vec<ImportRecord>,
    pub calls: Vec<CallSite>,
    pub inherits: Vec<InheritanceRelation>,
}

/// Analyze one file: reuse the parse result, extract call sites and
/// inheritance relations once.
pub fn analyze_file(
    path: &str,
    source: &str,
    language: SourceLanguage,
    parse: &ParseResult,
) -> FileAnalysis {
    FileAnalysis {
        path: path.to_string(),
        language,
        entities: parse.entities.clone(),
        imports: parse.imports.clone(),
        calls: rpg_parser::extract_call_sites(source, language, path),
        inherits: rpg_parser::extract_inheritances(source, language, path),
    }
}

/// Repository-wide symbol index, built from the persisted low-level nodes
/// plus the inheritance relations of the analyzed files.
#[derive(Debug, Default)]
pub struct SymbolTable {
    /// Every known source file path.
    pub files: BTreeSet<String>,
    /// Class name → files defining it.
    pub classes: HashMap<String, Vec<String>>,
    /// Class name → its method names.
    pub methods: HashMap<String, HashSet<String>>,
    /// Class name → recorded base classes.
    pub bases: HashMap<String, Vec<String>>,
    /// Unqualified entity name → files defining it (the name-collision set).
    pub name_files: HashMap<String, BTreeSet<String>>,
}

/// Build the symbol table from the graph's low-level population.
pub fn build_symbol_table(rpg: &Rpg, analyses: &[FileAnalysis]) -> Result<SymbolTable> {
    let mut table = SymbolTable::default();

    for node in rpg.store().get_nodes(&NodeFilter {
        high_level: Some(false),
        ..Default::default()
    })? {
        let Some(meta) = node.metadata() else {
            continue;
        };
        let Some(path) = meta.path.clone() else {
            continue;
        };
        let qualified = meta.qualified_name.clone().unwrap_or_default();
        match meta.entity_type {
            EntityType::File => {
                table.files.insert(path);
            }
            EntityType::Class => {
                table.classes.entry(qualified.clone()).or_default().push(path.clone());
                table
                    .name_files
                    .entry(qualified)
                    .or_default()
                    .insert(path);
            }
            EntityType::Function | EntityType::Method => {
                let name = qualified.rsplit('.').next().unwrap_or(&qualified).to_string();
                if let Some((class, method)) = qualified.split_once('.') {
                    table
                        .methods
                        .entry(class.to_string())
                        .or_default()
                        .insert(method.to_string());
                }
                table.name_files.entry(name).or_default().insert(path);
            }
            EntityType::Module => {}
        }
    }

    for analysis in analyses {
        for rel in &analysis.inherits {
            let bases = table.bases.entry(rel.child.clone()).or_default();
            if !bases.contains(&rel.parent) {
                bases.push(rel.parent.clone());
            }
        }
    }

    Ok(table)
}

/// Edge counts emitted by an injection pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InjectSummary {
    pub import_edges: usize,
    pub call_edges: usize,
    pub inherit_edges: usize,
}

fn file_node_id(path: &str) -> String {
    format!("{path}:file")
}

/// Collapse `.` and `..` segments of a joined relative path.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Resolve an import specifier to a known file: relative-path resolution
/// with the language's extension set first, repo-wide suffix match second.
/// Ambiguous suffix matches stay unresolved.
pub fn resolve_import(
    importer: &str,
    module: &str,
    language: SourceLanguage,
    files: &BTreeSet<String>,
) -> Option<String> {
    let base = parent_dir(importer);

    // Relative specifiers: ./x, ../x (JS family), .x / ..x (Python).
    let relative = if module.starts_with("./") || module.starts_with("../") {
        Some(normalize_path(&format!("{base}/{module}")))
    } else if language == SourceLanguage::Python && module.starts_with('.') {
        let dots = module.chars().take_while(|&c| c == '.').count();
        let rest = module[dots..].replace('.', "/");
        let mut dir = base.clone();
        for _ in 1..dots {
            dir = parent_dir(&dir);
        }
        let joined = if rest.is_empty() {
            dir
        } else if dir.is_empty() {
            rest
        } else {
            format!("{dir}/{rest}")
        };
        Some(joined)
    } else {
        None
    };

    if let Some(candidate) = relative {
        if files.contains(&candidate) {
            return Some(candidate);
        }
        for ext in language.extensions() {
            let with_ext = format!("{candidate}.{ext}");
            if files.contains(&with_ext) {
                return Some(with_ext);
            }
            let index = format!("{candidate}/index.{ext}");
            if files.contains(&index) {
                return Some(index);
            }
        }
        return None;
    }

    // Suffix match: convert module separators to path segments and find the
    // unique file whose extensionless path ends with them.
    let needle = module
        .replace("::", "/")
        .replace('.', "/")
        .trim_matches('/')
        .to_string();
    if needle.is_empty() {
        return None;
    }
    let matches: Vec<&String> = files
        .iter()
        .filter(|file| {
            let stem = file.rsplit_once('.').map_or(file.as_str(), |(s, _)| s);
            stem == needle || stem.ends_with(&format!("/{needle}"))
        })
        .collect();
    match matches.as_slice() {
        [only] => Some((*only).clone()),
        _ => None,
    }
}

/// Inject dependency edges for the analyzed files. The symbol table comes
/// from the graph, so the same pass serves full encodes and the file-scoped
/// slice evolution replays. Edges deduplicate on `(source, target, type)`.
pub fn inject(
    rpg: &mut Rpg,
    analyses: &[FileAnalysis],
    config: &InjectorConfig,
) -> Result<InjectSummary> {
    let table = build_symbol_table(rpg, analyses)?;
    let common: HashSet<&str> = config.common_names.iter().map(String::as_str).collect();
    let mut summary = InjectSummary::default();

    for analysis in analyses {
        let source_node = file_node_id(&analysis.path);
        if rpg.store().get_node(&source_node)?.is_none() {
            continue;
        }

        // Phase 1: import edges plus the file-local alias table.
        let mut aliases: HashMap<String, String> = HashMap::new();
        for import in &analysis.imports {
            let Some(target) =
                resolve_import(&analysis.path, &import.module, analysis.language, &table.files)
            else {
                continue;
            };
            for symbol in &import.symbols {
                aliases.insert(symbol.local_name().to_string(), target.clone());
            }
            if analysis.path != target
                && rpg.store().get_node(&file_node_id(&target))?.is_some()
                && rpg.add_dependency_edge(DependencyEdgeArgs {
                    source: source_node.clone(),
                    target: file_node_id(&target),
                    dependency_type: DependencyType::Import,
                    is_runtime: None,
                    line: Some(import.line),
                })?
            {
                summary.import_edges += 1;
            }
        }

        // Phases 3-5: calls, with type inference ahead of the fallbacks.
        for call in &analysis.calls {
            let target_file = resolve_call_target(call, analysis, &table, &aliases, &common);
            let Some(target_file) = target_file else {
                continue;
            };
            if target_file == analysis.path {
                continue;
            }
            if rpg.store().get_node(&file_node_id(&target_file))?.is_some()
                && rpg.add_dependency_edge(DependencyEdgeArgs {
                    source: source_node.clone(),
                    target: file_node_id(&target_file),
                    dependency_type: DependencyType::Call,
                    is_runtime: None,
                    line: Some(call.line),
                })?
            {
                summary.call_edges += 1;
            }
        }

        // Inheritance relations.
        for rel in &analysis.inherits {
            let target_file = aliases.get(&rel.parent).cloned().or_else(|| {
                table
                    .classes
                    .get(&rel.parent)
                    .filter(|files| files.len() == 1)
                    .map(|files| files[0].clone())
            });
            let Some(target_file) = target_file else {
                continue;
            };
            if target_file == analysis.path {
                continue;
            }
            let dependency_type = match rel.kind {
                InheritKind::Extends => DependencyType::Inherit,
                InheritKind::Implements => DependencyType::Implement,
            };
            if rpg.store().get_node(&file_node_id(&target_file))?.is_some()
                && rpg.add_dependency_edge(DependencyEdgeArgs {
                    source: source_node.clone(),
                    target: file_node_id(&target_file),
                    dependency_type,
                    is_runtime: None,
                    line: Some(rel.line),
                })?
            {
                summary.inherit_edges += 1;
            }
        }
    }

    Ok(summary)
}

/// Resolution precedence: type-aware target, then the enclosing file's
/// alias bindings, then a repository-wide unique unqualified match with
/// common names rejected.
fn resolve_call_target(
    call: &CallSite,
    analysis: &FileAnalysis,
    table: &SymbolTable,
    aliases: &HashMap<String, String>,
    common: &HashSet<&str>,
) -> Option<String> {
    if let Some(class) = infer_receiver_class(call, &analysis.entities, table)
        && let Some(files) = table.classes.get(&class)
        && let Some(file) = files.first()
    {
        return Some(file.clone());
    }

    if let Some(target) = aliases.get(&call.callee) {
        return Some(target.clone());
    }
    // Calls through an imported module object: ns.helper() where ns is bound
    // by an import.
    if let Some(receiver) = &call.receiver
        && let Some(target) = aliases.get(receiver.as_str())
    {
        return Some(target.clone());
    }

    if common.contains(call.callee.as_str()) {
        return None;
    }
    let files = table.name_files.get(&call.callee)?;
    let cross: Vec<&String> = files.iter().filter(|f| **f != analysis.path).collect();
    match cross.as_slice() {
        [only] => Some((*only).clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| (*p).to_string()).collect()
    }

    #[test]
    fn relative_js_import_with_extension_set() {
        let known = files(&["src/main.ts", "src/utils.ts"]);
        assert_eq!(
            resolve_import("src/main.ts", "./utils", SourceLanguage::TypeScript, &known),
            Some("src/utils.ts".to_string())
        );
    }

    #[test]
    fn parent_relative_import() {
        let known = files(&["src/app/main.ts", "src/lib.ts"]);
        assert_eq!(
            resolve_import("src/app/main.ts", "../lib", SourceLanguage::TypeScript, &known),
            Some("src/lib.ts".to_string())
        );
    }

    #[test]
    fn python_dotted_relative_import() {
        let known = files(&["pkg/mod/loader.py", "pkg/helpers.py"]);
        assert_eq!(
            resolve_import("pkg/mod/loader.py", "..helpers", SourceLanguage::Python, &known),
            Some("pkg/helpers.py".to_string())
        );
    }

    #[test]
    fn suffix_match_fallback_requires_uniqueness() {
        let known = files(&["src/pkg/loader.py", "src/other/loader.py", "src/only/codec.py"]);
        // Ambiguous: both loaders match.
        assert_eq!(
            resolve_import("main.py", "loader", SourceLanguage::Python, &known),
            None
        );
        assert_eq!(
            resolve_import("main.py", "only.codec", SourceLanguage::Python, &known),
            Some("src/only/codec.py".to_string())
        );
    }

    #[test]
    fn suffix_match_is_segment_aligned() {
        let known = files(&["src/graph-store.rs", "src/graph.rs"]);
        assert_eq!(
            resolve_import("main.rs", "crate::graph", SourceLanguage::Rust, &known),
            Some("src/graph.rs".to_string())
        );
    }

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(normalize_path("src/app/../lib/./x.ts"), "src/lib/x.ts");
    }
}
