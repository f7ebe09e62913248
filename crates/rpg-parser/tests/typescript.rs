use rpg_core::model::SourceLanguage;
use rpg_parser::{CodeEntityKind, InheritKind, ReceiverKind};

const SOURCE: &str = r#"
import { greet, farewell as bye } from './utils';
import * as fs from 'fs';

export function welcome(name: string): string {
    return greet(name);
}

const shout = (name: string) => greet(name).toUpperCase();

export class Greeter extends BaseGreeter implements Friendly {
    say(name: string) {
        this.log(name);
        return greet(name);
    }
}
"#;

#[test]
fn extracts_functions_classes_and_named_arrows() {
    let result = rpg_parser::parse(SOURCE, SourceLanguage::TypeScript, "src/a.ts");
    assert!(result.errors.is_empty());

    let names: Vec<(&str, CodeEntityKind)> = result
        .entities
        .iter()
        .map(|e| (e.name.as_str(), e.kind))
        .collect();
    assert!(names.contains(&("welcome", CodeEntityKind::Function)));
    assert!(names.contains(&("shout", CodeEntityKind::Function)));
    assert!(names.contains(&("Greeter", CodeEntityKind::Class)));
    assert!(names.contains(&("say", CodeEntityKind::Method)));

    let say = result.entities.iter().find(|e| e.name == "say").unwrap();
    assert_eq!(say.parent.as_deref(), Some("Greeter"));
    assert_eq!(say.qualified_name(), "Greeter.say");
}

#[test]
fn extracts_imports_with_aliases() {
    let result = rpg_parser::parse(SOURCE, SourceLanguage::TypeScript, "src/a.ts");
    let utils = result
        .imports
        .iter()
        .find(|i| i.module == "./utils")
        .unwrap();
    let locals: Vec<&str> = utils.symbols.iter().map(|s| s.local_name()).collect();
    assert_eq!(locals, vec!["greet", "bye"]);

    let fs = result.imports.iter().find(|i| i.module == "fs").unwrap();
    assert_eq!(fs.symbols[0].local_name(), "fs");
}

#[test]
fn extracts_call_sites_with_context() {
    let calls = rpg_parser::extract_call_sites(SOURCE, SourceLanguage::TypeScript, "src/a.ts");

    let welcome_call = calls
        .iter()
        .find(|c| c.callee == "greet" && c.caller_entity.as_deref() == Some("welcome"))
        .unwrap();
    assert_eq!(welcome_call.receiver_kind, ReceiverKind::None);

    let this_call = calls.iter().find(|c| c.callee == "log").unwrap();
    assert_eq!(this_call.receiver_kind, ReceiverKind::SelfRef);
    assert_eq!(this_call.caller_entity.as_deref(), Some("Greeter.say"));
}

#[test]
fn extracts_extends_and_implements() {
    let relations = rpg_parser::extract_inheritances(SOURCE, SourceLanguage::TypeScript, "src/a.ts");
    assert!(
        relations
            .iter()
            .any(|r| r.child == "Greeter" && r.parent == "BaseGreeter" && r.kind == InheritKind::Extends)
    );
    assert!(
        relations
            .iter()
            .any(|r| r.child == "Greeter" && r.parent == "Friendly" && r.kind == InheritKind::Implements)
    );
}

#[test]
fn interfaces_map_to_class_entities() {
    let source = "interface Shape { area(): number }\ntype Alias = Shape;\n";
    let result = rpg_parser::parse(source, SourceLanguage::TypeScript, "src/shapes.ts");
    let classes: Vec<&str> = result
        .entities
        .iter()
        .filter(|e| e.kind == CodeEntityKind::Class)
        .map(|e| e.name.as_str())
        .collect();
    assert!(classes.contains(&"Shape"));
    assert!(classes.contains(&"Alias"));
}
