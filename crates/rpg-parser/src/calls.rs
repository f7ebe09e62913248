//! Extract call sites with enclosing-scope context and receiver analysis.

use crate::languages::text;
use crate::{CallSite, ReceiverKind};
use rpg_core::model::SourceLanguage;

/// A function or method scope that can contain call sites.
#[derive(Debug, Clone)]
struct Scope {
    /// Dot-qualified name, e.g. `Class.method`.
    name: String,
    start_row: usize,
    end_row: usize,
}

/// Extract call sites from a parsed tree.
pub fn extract(
    tree: &tree_sitter::Tree,
    source: &str,
    language: SourceLanguage,
    path: &str,
) -> Vec<CallSite> {
    let root = tree.root_node();
    let mut scopes = Vec::new();
    collect_scopes(&root, source, language, None, &mut scopes);

    let mut calls = Vec::new();
    collect_calls(&root, source, language, path, &scopes, &mut calls);
    calls
}

/// Innermost scope containing the row.
fn enclosing_scope(scopes: &[Scope], row: usize) -> Option<String> {
    scopes
        .iter()
        .filter(|s| row >= s.start_row && row <= s.end_row)
        .min_by_key(|s| s.end_row - s.start_row)
        .map(|s| s.name.clone())
}

/// Collect class/function/impl scopes while traversing the AST.
fn collect_scopes(
    node: &tree_sitter::Node,
    source: &str,
    language: SourceLanguage,
    parent: Option<&str>,
    scopes: &mut Vec<Scope>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let (scope_name, container) = match (language, child.kind()) {
            (SourceLanguage::Python, "function_definition" | "async_function_definition")
            | (SourceLanguage::Rust, "function_item")
            | (
                SourceLanguage::TypeScript | SourceLanguage::JavaScript,
                "function_declaration" | "method_definition",
            )
            | (SourceLanguage::Go, "function_declaration")
            | (SourceLanguage::Java, "method_declaration" | "constructor_declaration") => {
                (child.child_by_field_name("name").map(|n| text(&n, source)), None)
            }
            (SourceLanguage::Python, "class_definition")
            | (
                SourceLanguage::TypeScript | SourceLanguage::JavaScript,
                "class_declaration",
            )
            | (SourceLanguage::Java, "class_declaration" | "interface_declaration") => {
                (None, child.child_by_field_name("name").map(|n| text(&n, source)))
            }
            (SourceLanguage::Rust, "impl_item") => {
                (None, child.child_by_field_name("type").map(|n| text(&n, source)))
            }
            (SourceLanguage::Go, "method_declaration") => (
                child.child_by_field_name("name").map(|n| text(&n, source)),
                None,
            ),
            (
                SourceLanguage::TypeScript | SourceLanguage::JavaScript,
                "lexical_declaration" | "variable_declaration",
            ) => {
                let mut inner = child.walk();
                for decl in child.children(&mut inner) {
                    if decl.kind() == "variable_declarator"
                        && (crate::languages::has_child_kind(&decl, "arrow_function")
                            || crate::languages::has_child_kind(&decl, "function_expression")
                            || crate::languages::has_child_kind(&decl, "function"))
                        && let Some(name) = decl.child_by_field_name("name")
                    {
                        scopes.push(Scope {
                            name: text(&name, source).to_string(),
                            start_row: child.start_position().row,
                            end_row: child.end_position().row,
                        });
                    }
                }
                (None, None)
            }
            _ => (None, None),
        };

        if let Some(name) = scope_name {
            let qualified = match parent {
                Some(p) => format!("{p}.{name}"),
                None => name.to_string(),
            };
            scopes.push(Scope {
                name: qualified,
                start_row: child.start_position().row,
                end_row: child.end_position().row,
            });
        }
        if let Some(container) = container {
            collect_scopes(&child, source, language, Some(container), scopes);
            continue;
        }
        collect_scopes(&child, source, language, parent, scopes);
    }
}

fn classify_receiver(receiver: &str) -> ReceiverKind {
    match receiver {
        "self" | "this" => ReceiverKind::SelfRef,
        "super" | "super()" => ReceiverKind::Super,
        _ => ReceiverKind::Variable,
    }
}

fn push_call(
    calls: &mut Vec<CallSite>,
    path: &str,
    scopes: &[Scope],
    node: &tree_sitter::Node,
    callee: &str,
    receiver: Option<String>,
    qualified: Option<String>,
) {
    if callee.is_empty() {
        return;
    }
    let receiver_kind = receiver
        .as_deref()
        .map_or(ReceiverKind::None, classify_receiver);
    calls.push(CallSite {
        callee: callee.to_string(),
        caller_file: path.to_string(),
        caller_entity: enclosing_scope(scopes, node.start_position().row),
        line: node.start_position().row + 1,
        receiver,
        receiver_kind,
        qualified_name: qualified,
    });
}

fn collect_calls(
    node: &tree_sitter::Node,
    source: &str,
    language: SourceLanguage,
    path: &str,
    scopes: &[Scope],
    calls: &mut Vec<CallSite>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match (language, child.kind()) {
            (SourceLanguage::Python, "call") => {
                if let Some(func) = child.child_by_field_name("function") {
                    match func.kind() {
                        "identifier" => {
                            push_call(calls, path, scopes, &child, text(&func, source), None, None);
                        }
                        "attribute" => {
                            let callee = func
                                .child_by_field_name("attribute")
                                .map(|n| text(&n, source))
                                .unwrap_or_default();
                            let receiver = func
                                .child_by_field_name("object")
                                .map(|n| text(&n, source).to_string());
                            push_call(
                                calls,
                                path,
                                scopes,
                                &child,
                                callee,
                                receiver,
                                Some(text(&func, source).to_string()),
                            );
                        }
                        _ => {}
                    }
                }
            }
            (SourceLanguage::Rust, "call_expression") => {
                if let Some(func) = child.child_by_field_name("function") {
                    match func.kind() {
                        "identifier" => {
                            push_call(calls, path, scopes, &child, text(&func, source), None, None);
                        }
                        "scoped_identifier" => {
                            let full = text(&func, source);
                            let callee = full.rsplit("::").next().unwrap_or(full);
                            push_call(
                                calls,
                                path,
                                scopes,
                                &child,
                                callee,
                                None,
                                Some(full.to_string()),
                            );
                        }
                        // x.foo() parses as call_expression over field_expression
                        "field_expression" => {
                            let callee = func
                                .child_by_field_name("field")
                                .map(|n| text(&n, source))
                                .unwrap_or_default();
                            let receiver = func
                                .child_by_field_name("value")
                                .map(|n| text(&n, source).to_string());
                            push_call(
                                calls,
                                path,
                                scopes,
                                &child,
                                callee,
                                receiver,
                                Some(text(&func, source).to_string()),
                            );
                        }
                        _ => {}
                    }
                }
            }
            (
                SourceLanguage::TypeScript | SourceLanguage::JavaScript,
                "call_expression",
            ) => {
                if let Some(func) = child.child_by_field_name("function") {
                    match func.kind() {
                        "identifier" => {
                            push_call(calls, path, scopes, &child, text(&func, source), None, None);
                        }
                        "member_expression" => {
                            let callee = func
                                .child_by_field_name("property")
                                .map(|n| text(&n, source))
                                .unwrap_or_default();
                            let receiver = func
                                .child_by_field_name("object")
                                .map(|n| text(&n, source).to_string());
                            push_call(
                                calls,
                                path,
                                scopes,
                                &child,
                                callee,
                                receiver,
                                Some(text(&func, source).to_string()),
                            );
                        }
                        _ => {}
                    }
                }
            }
            // new Foo() records a call to the constructor's class.
            (
                SourceLanguage::TypeScript | SourceLanguage::JavaScript,
                "new_expression",
            ) => {
                if let Some(ctor) = child.child_by_field_name("constructor") {
                    push_call(calls, path, scopes, &child, text(&ctor, source), None, None);
                }
            }
            (SourceLanguage::Go, "call_expression") => {
                if let Some(func) = child.child_by_field_name("function") {
                    match func.kind() {
                        "identifier" => {
                            push_call(calls, path, scopes, &child, text(&func, source), None, None);
                        }
                        "selector_expression" => {
                            let callee = func
                                .child_by_field_name("field")
                                .map(|n| text(&n, source))
                                .unwrap_or_default();
                            let receiver = func
                                .child_by_field_name("operand")
                                .map(|n| text(&n, source).to_string());
                            push_call(
                                calls,
                                path,
                                scopes,
                                &child,
                                callee,
                                receiver,
                                Some(text(&func, source).to_string()),
                            );
                        }
                        _ => {}
                    }
                }
            }
            (SourceLanguage::Java, "method_invocation") => {
                let callee = child
                    .child_by_field_name("name")
                    .map(|n| text(&n, source))
                    .unwrap_or_default();
                let receiver = child
                    .child_by_field_name("object")
                    .map(|n| text(&n, source).to_string());
                let qualified = receiver
                    .as_ref()
                    .map(|r| format!("{r}.{callee}"));
                push_call(calls, path, scopes, &child, callee, receiver, qualified);
            }
            (SourceLanguage::Java, "object_creation_expression") => {
                if let Some(ty) = child.child_by_field_name("type") {
                    // Strip generic arguments: `new ArrayList<>()` calls ArrayList.
                    let raw = text(&ty, source);
                    let name = raw.split('<').next().unwrap_or(raw).trim();
                    push_call(calls, path, scopes, &child, name, None, None);
                }
            }
            _ => {}
        }
        collect_calls(&child, source, language, path, scopes, calls);
    }
}
