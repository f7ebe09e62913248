use rpg_core::model::SourceLanguage;
use rpg_parser::{CodeEntityKind, InheritKind, ReceiverKind};

const GO_SOURCE: &str = r#"
package store

import (
    "fmt"
    enc "encoding/json"
)

type Store struct {
    items map[string]string
}

func NewStore() *Store {
    return &Store{}
}

func (s *Store) Put(key string, value string) {
    s.validate(key)
    fmt.Println(key, value)
}
"#;

#[test]
fn go_entities_and_receivers() {
    let result = rpg_parser::parse(GO_SOURCE, SourceLanguage::Go, "store/store.go");
    assert!(result.errors.is_empty());

    let find = |name: &str| result.entities.iter().find(|e| e.name == name).unwrap();
    assert_eq!(find("Store").kind, CodeEntityKind::Class);
    assert_eq!(find("NewStore").kind, CodeEntityKind::Function);
    assert_eq!(find("Put").kind, CodeEntityKind::Method);
    assert_eq!(find("Put").parent.as_deref(), Some("Store"));
}

#[test]
fn go_imports_with_aliases() {
    let result = rpg_parser::parse(GO_SOURCE, SourceLanguage::Go, "store/store.go");
    assert!(result.imports.iter().any(|i| i.module == "fmt"));
    let enc = result
        .imports
        .iter()
        .find(|i| i.module == "encoding/json")
        .unwrap();
    assert_eq!(enc.symbols[0].local_name(), "enc");
}

#[test]
fn go_call_sites() {
    let calls = rpg_parser::extract_call_sites(GO_SOURCE, SourceLanguage::Go, "store/store.go");
    let println = calls.iter().find(|c| c.callee == "Println").unwrap();
    assert_eq!(println.receiver.as_deref(), Some("fmt"));
    assert_eq!(println.receiver_kind, ReceiverKind::Variable);
}

const JAVA_SOURCE: &str = r#"
import java.util.List;
import java.util.ArrayList;

public class OrderService extends BaseService implements Auditable {
    private List<String> orders = new ArrayList<>();

    public OrderService() {
        this.reset();
    }

    public void addOrder(String id) {
        orders.add(id);
        validate(id);
    }
}

interface Auditable {
    void audit();
}
"#;

#[test]
fn java_entities() {
    let result = rpg_parser::parse(JAVA_SOURCE, SourceLanguage::Java, "src/OrderService.java");
    assert!(result.errors.is_empty());

    let find = |name: &str| result.entities.iter().find(|e| e.name == name).unwrap();
    assert_eq!(find("OrderService").kind, CodeEntityKind::Class);
    // Interfaces map to class entities
    assert_eq!(find("Auditable").kind, CodeEntityKind::Class);
    // Constructors are methods
    let ctor = result
        .entities
        .iter()
        .filter(|e| e.name == "OrderService" && e.kind == CodeEntityKind::Method)
        .count();
    assert_eq!(ctor, 1);
    assert_eq!(find("addOrder").qualified_name(), "OrderService.addOrder");
}

#[test]
fn java_imports() {
    let result = rpg_parser::parse(JAVA_SOURCE, SourceLanguage::Java, "src/OrderService.java");
    let list = result
        .imports
        .iter()
        .find(|i| i.symbols.first().is_some_and(|s| s.name == "List"))
        .unwrap();
    assert_eq!(list.module, "java.util");
}

#[test]
fn java_inheritance_and_interfaces() {
    let relations =
        rpg_parser::extract_inheritances(JAVA_SOURCE, SourceLanguage::Java, "src/OrderService.java");
    assert!(
        relations
            .iter()
            .any(|r| r.child == "OrderService" && r.parent == "BaseService" && r.kind == InheritKind::Extends)
    );
    assert!(
        relations
            .iter()
            .any(|r| r.child == "OrderService" && r.parent == "Auditable" && r.kind == InheritKind::Implements)
    );
}

#[test]
fn java_call_sites() {
    let calls =
        rpg_parser::extract_call_sites(JAVA_SOURCE, SourceLanguage::Java, "src/OrderService.java");
    let reset = calls.iter().find(|c| c.callee == "reset").unwrap();
    assert_eq!(reset.receiver_kind, ReceiverKind::SelfRef);
    assert!(calls.iter().any(|c| c.callee == "ArrayList"));
}
