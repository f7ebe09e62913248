//! Receiver type inference for call resolution.
//!
//! Resolves the class behind a call receiver from (a) local constructor
//! assignments, (b) constructor-assigned attributes, (c) `self`/`this`, and
//! (d) `super` via a cycle-guarded depth-first walk of recorded inheritance.

use crate::inject::SymbolTable;
use rpg_parser::{CallSite, CodeEntity, ReceiverKind};
use std::collections::HashSet;

/// The class that would receive this call, if it can be inferred.
pub fn infer_receiver_class(
    call: &CallSite,
    entities: &[CodeEntity],
    table: &SymbolTable,
) -> Option<String> {
    let receiver = call.receiver.as_deref()?;

    match call.receiver_kind {
        ReceiverKind::SelfRef => enclosing_class(call, table),
        ReceiverKind::Super => {
            let class = enclosing_class(call, table)?;
            resolve_super(&class, &call.callee, table)
        }
        ReceiverKind::Variable => {
            // self.field / this.field: the attribute case.
            if let Some(field) = receiver
                .strip_prefix("self.")
                .or_else(|| receiver.strip_prefix("this."))
            {
                let class = enclosing_class(call, table)?;
                return attribute_class(&class, field, entities, table);
            }
            local_variable_class(receiver, call, entities, table)
        }
        ReceiverKind::None => None,
    }
}

/// The class named by the caller context, when the prefix of `Class.method`
/// is a known class.
fn enclosing_class(call: &CallSite, table: &SymbolTable) -> Option<String> {
    let caller = call.caller_entity.as_deref()?;
    let (class, _) = caller.split_once('.')?;
    table.classes.contains_key(class).then(|| class.to_string())
}

/// Walk the MRO depth-first from the class's bases, returning the first
/// ancestor that defines the method. The visited set guards against cycles
/// in recorded inheritance.
fn resolve_super(class: &str, method: &str, table: &SymbolTable) -> Option<String> {
    let mut visited: HashSet<String> = HashSet::from([class.to_string()]);
    let mut stack: Vec<String> = table.bases.get(class).cloned().unwrap_or_default();
    while let Some(base) = stack.pop() {
        if !visited.insert(base.clone()) {
            continue;
        }
        if table
            .methods
            .get(&base)
            .is_some_and(|methods| methods.contains(method))
        {
            return Some(base);
        }
        if let Some(grand) = table.bases.get(&base) {
            stack.extend(grand.iter().cloned());
        }
    }
    None
}

/// `self.field = Bar()` inside the enclosing class's constructor.
fn attribute_class(
    class: &str,
    field: &str,
    entities: &[CodeEntity],
    table: &SymbolTable,
) -> Option<String> {
    let ctor = entities.iter().find(|e| {
        e.parent.as_deref() == Some(class)
            && (e.name == "__init__" || e.name == "constructor" || e.name == class)
    })?;
    for needle in [format!("self.{field} ="), format!("this.{field} =")] {
        if let Some(class_name) = assigned_constructor(&ctor.source_text, &needle, table) {
            return Some(class_name);
        }
    }
    None
}

/// `x = Foo()` within the enclosing function.
fn local_variable_class(
    receiver: &str,
    call: &CallSite,
    entities: &[CodeEntity],
    table: &SymbolTable,
) -> Option<String> {
    let caller = call.caller_entity.as_deref()?;
    let scope = entities.iter().find(|e| e.qualified_name() == caller)?;
    for needle in [format!("{receiver} ="), format!("{receiver} :=")] {
        if let Some(class_name) = assigned_constructor(&scope.source_text, &needle, table) {
            return Some(class_name);
        }
    }
    None
}

/// Scan `source` for `needle <Class>(` (or `new <Class>(`, `<Class>::new(`)
/// where `<Class>` is known, returning the class.
fn assigned_constructor(source: &str, needle: &str, table: &SymbolTable) -> Option<String> {
    let mut search_from = 0;
    while let Some(found) = source[search_from..].find(needle) {
        let after = &source[search_from + found + needle.len()..];
        let rhs = after.trim_start().trim_start_matches("new ").trim_start_matches("await ");
        let ident: String = rhs
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if !ident.is_empty() && table.classes.contains_key(&ident) {
            return Some(ident);
        }
        search_from += found + needle.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_parser::CodeEntityKind;
    use std::collections::{BTreeSet, HashMap, HashSet};

    fn table_with(classes: &[(&str, &str)], methods: &[(&str, &[&str])], bases: &[(&str, &[&str])]) -> SymbolTable {
        let mut table = SymbolTable {
            files: BTreeSet::new(),
            classes: HashMap::new(),
            methods: HashMap::new(),
            bases: HashMap::new(),
            name_files: HashMap::new(),
        };
        for (class, file) in classes {
            table
                .classes
                .entry((*class).to_string())
                .or_default()
                .push((*file).to_string());
        }
        for (class, names) in methods {
            table.methods.insert(
                (*class).to_string(),
                names.iter().map(|n| (*n).to_string()).collect::<HashSet<_>>(),
            );
        }
        for (class, parents) in bases {
            table.bases.insert(
                (*class).to_string(),
                parents.iter().map(|p| (*p).to_string()).collect(),
            );
        }
        table
    }

    fn call(callee: &str, caller: &str, receiver: &str, kind: ReceiverKind) -> CallSite {
        CallSite {
            callee: callee.to_string(),
            caller_file: "src/a.py".to_string(),
            caller_entity: Some(caller.to_string()),
            line: 5,
            receiver: Some(receiver.to_string()),
            receiver_kind: kind,
            qualified_name: None,
        }
    }

    fn entity(name: &str, parent: Option<&str>, source: &str) -> CodeEntity {
        CodeEntity {
            kind: CodeEntityKind::Method,
            name: name.to_string(),
            start_line: 1,
            end_line: 10,
            parameters: vec![],
            return_type: None,
            parent: parent.map(String::from),
            source_text: source.to_string(),
        }
    }

    #[test]
    fn local_constructor_assignment() {
        let table = table_with(&[("Foo", "src/foo.py")], &[], &[]);
        let entities = vec![entity("run", None, "def run():\n    x = Foo()\n    x.go()")];
        let mut c = call("go", "run", "x", ReceiverKind::Variable);
        c.caller_entity = Some("run".to_string());
        assert_eq!(infer_receiver_class(&c, &entities, &table), Some("Foo".to_string()));
    }

    #[test]
    fn attribute_initialized_in_init() {
        let table = table_with(&[("Bar", "src/bar.py"), ("Svc", "src/svc.py")], &[], &[]);
        let entities = vec![
            entity("__init__", Some("Svc"), "def __init__(self):\n    self.field = Bar()"),
            entity("work", Some("Svc"), "def work(self):\n    self.field.go()"),
        ];
        let c = call("go", "Svc.work", "self.field", ReceiverKind::Variable);
        assert_eq!(infer_receiver_class(&c, &entities, &table), Some("Bar".to_string()));
    }

    #[test]
    fn self_resolves_to_enclosing_class() {
        let table = table_with(&[("Svc", "src/svc.py")], &[], &[]);
        let c = call("helper", "Svc.work", "self", ReceiverKind::SelfRef);
        assert_eq!(infer_receiver_class(&c, &[], &table), Some("Svc".to_string()));
    }

    #[test]
    fn super_walks_mro_with_cycle_guard() {
        let table = table_with(
            &[("A", "a.py"), ("B", "b.py"), ("C", "c.py")],
            &[("A", &["greet"])],
            // C -> B -> A, plus a cycle A -> C that must not loop forever.
            &[("C", &["B"]), ("B", &["A"]), ("A", &["C"])],
        );
        let c = call("greet", "C.run", "super()", ReceiverKind::Super);
        assert_eq!(infer_receiver_class(&c, &[], &table), Some("A".to_string()));
    }

    #[test]
    fn unknown_receiver_stays_unresolved() {
        let table = table_with(&[("Foo", "src/foo.py")], &[], &[]);
        let entities = vec![entity("run", None, "def run():\n    x = mystery()\n    x.go()")];
        let c = call("go", "run", "x", ReceiverKind::Variable);
        assert_eq!(infer_receiver_class(&c, &entities, &table), None);
    }
}
