//! Trait-level store suite, run against both backends.

use rpg_core::model::{
    DependencyType, Edge, EdgeKind, EntityType, GraphConfig, Node, SemanticFeature,
    SourceLanguage, StructuralMetadata,
};
use rpg_store::{
    Direction, EdgeFilter, EdgeSelector, GraphStore, MetadataPatch, NodeFilter, NodePatch,
    TraverseOptions,
};

fn backends() -> Vec<(&'static str, Box<dyn GraphStore>)> {
    vec![
        (
            "native",
            Box::new(rpg_store::native::NativeStore::in_memory()) as Box<dyn GraphStore>,
        ),
        (
            "sqlite",
            Box::new(rpg_store::sqlite::SqliteStore::in_memory().unwrap()) as Box<dyn GraphStore>,
        ),
    ]
}

fn low(id: &str, path: &str, desc: &str, keywords: &[&str]) -> Node {
    Node::low_level(
        id,
        SemanticFeature::new(desc, keywords.iter().map(|s| (*s).to_string()).collect()),
        StructuralMetadata::for_entity(
            EntityType::Function,
            path,
            id.rsplit(':').next().unwrap_or(id),
            SourceLanguage::TypeScript,
            1,
            5,
        ),
    )
}

fn high(id: &str, desc: &str) -> Node {
    Node::high_level(id, SemanticFeature::new(desc, vec![]))
}

#[test]
fn insert_then_get_then_remove() {
    for (name, mut store) in backends() {
        let node = low("src/a.ts:function:greet", "src/a.ts", "format greeting text", &["greet"]);
        store.add_node(node.clone()).unwrap();
        let fetched = store.get_node("src/a.ts:function:greet").unwrap().unwrap();
        assert_eq!(fetched.id(), node.id(), "backend {name}");

        assert!(store.remove_node("src/a.ts:function:greet").unwrap());
        assert!(store.get_node("src/a.ts:function:greet").unwrap().is_none());
        // Idempotent removal
        assert!(!store.remove_node("src/a.ts:function:greet").unwrap());
    }
}

#[test]
fn identical_readd_is_noop_different_body_rejected() {
    for (name, mut store) in backends() {
        let node = low("f.ts:function:a", "f.ts", "parse input tokens", &[]);
        store.add_node(node.clone()).unwrap();
        store.add_node(node).unwrap();
        assert_eq!(store.node_count().unwrap(), 1, "backend {name}");

        let other = low("f.ts:function:a", "f.ts", "emit output tokens", &[]);
        assert!(store.add_node(other).is_err(), "backend {name}");
    }
}

#[test]
fn removing_either_endpoint_deletes_the_edge() {
    for (name, mut store) in backends() {
        for (endpoint, _) in [("a", 0), ("b", 1)] {
            store
                .add_node(low(
                    &format!("{endpoint}.ts:file"),
                    &format!("{endpoint}.ts"),
                    "aggregate file behavior",
                    &[],
                ))
                .unwrap();
        }
        store
            .add_edge(Edge::dependency(
                "a.ts:file",
                "b.ts:file",
                DependencyType::Import,
            ))
            .unwrap();
        assert_eq!(store.edge_count().unwrap(), 1);

        store.remove_node("b.ts:file").unwrap();
        assert_eq!(store.edge_count().unwrap(), 0, "backend {name}");
    }
}

#[test]
fn duplicate_edge_collapses_to_one() {
    for (name, mut store) in backends() {
        store.add_node(low("a.ts:file", "a.ts", "aggregate file behavior", &[])).unwrap();
        store.add_node(low("b.ts:file", "b.ts", "aggregate file behavior", &[])).unwrap();
        let edge = Edge::dependency("a.ts:file", "b.ts:file", DependencyType::Import);
        assert!(store.add_edge(edge.clone()).unwrap());
        assert!(!store.add_edge(edge).unwrap());
        assert_eq!(store.edge_count().unwrap(), 1, "backend {name}");

        // A different dependency type between the same endpoints is a new edge.
        assert!(
            store
                .add_edge(Edge::dependency(
                    "a.ts:file",
                    "b.ts:file",
                    DependencyType::Call
                ))
                .unwrap()
        );
        assert_eq!(store.edge_count().unwrap(), 2, "backend {name}");
    }
}

#[test]
fn edge_endpoints_must_exist() {
    for (name, mut store) in backends() {
        store.add_node(low("a.ts:file", "a.ts", "aggregate file behavior", &[])).unwrap();
        let err = store.add_edge(Edge::dependency("a.ts:file", "ghost", DependencyType::Call));
        assert!(err.is_err(), "backend {name}");
    }
}

#[test]
fn update_node_deep_merges_feature_and_extra() {
    for (name, mut store) in backends() {
        store.add_node(high("domain:Auth", "validate credentials")).unwrap();
        let mut extra = std::collections::BTreeMap::new();
        extra.insert("owner".to_string(), serde_json::json!("auth-team"));
        store
            .update_node(
                "domain:Auth",
                &NodePatch {
                    feature: Some(SemanticFeature::new("", vec!["token".to_string()])),
                    metadata: Some(MetadataPatch {
                        entity_type: Some(EntityType::Module),
                        path: Some("src/auth".to_string()),
                        extra,
                        ..Default::default()
                    }),
                    source_code: None,
                },
            )
            .unwrap();

        let node = store.get_node("domain:Auth").unwrap().unwrap();
        // Empty description in the patch leaves the original in place.
        assert_eq!(node.feature().description, "validate credentials");
        assert_eq!(node.feature().keywords, vec!["token"]);
        let meta = node.metadata().unwrap();
        assert_eq!(meta.path.as_deref(), Some("src/auth"), "backend {name}");
        assert_eq!(meta.entity_type, EntityType::Module);
        assert_eq!(meta.extra.get("owner").unwrap(), "auth-team");

        // A second patch merges new extra keys without dropping old ones.
        let mut extra = std::collections::BTreeMap::new();
        extra.insert("tier".to_string(), serde_json::json!(1));
        store
            .update_node(
                "domain:Auth",
                &NodePatch::metadata(MetadataPatch {
                    extra,
                    ..Default::default()
                }),
            )
            .unwrap();
        let node = store.get_node("domain:Auth").unwrap().unwrap();
        let meta = node.metadata().unwrap();
        assert!(meta.extra.contains_key("owner") && meta.extra.contains_key("tier"));
    }
}

#[test]
fn children_parent_dependencies() {
    for (name, mut store) in backends() {
        store.add_node(high("domain:Core", "organize core features")).unwrap();
        store.add_node(low("a.ts:file", "a.ts", "aggregate file behavior", &[])).unwrap();
        store.add_node(low("b.ts:file", "b.ts", "aggregate file behavior", &[])).unwrap();
        store.add_edge(Edge::functional("domain:Core", "a.ts:file")).unwrap();
        store
            .add_edge(Edge::dependency("a.ts:file", "b.ts:file", DependencyType::Import))
            .unwrap();

        let children = store.get_children("domain:Core").unwrap();
        assert_eq!(children.len(), 1, "backend {name}");
        assert_eq!(children[0].id(), "a.ts:file");

        let parent = store.get_parent("a.ts:file").unwrap().unwrap();
        assert_eq!(parent.id(), "domain:Core");
        assert!(store.get_parent("domain:Core").unwrap().is_none());

        let deps = store.get_dependencies("a.ts:file").unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].id(), "b.ts:file");
        let dependents = store.get_dependents("b.ts:file").unwrap();
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].id(), "a.ts:file");
    }
}

#[test]
fn traverse_depth_zero_returns_only_start() {
    for (name, mut store) in backends() {
        store.add_node(high("root", "organize features")).unwrap();
        store.add_node(low("leaf.ts:file", "leaf.ts", "aggregate file behavior", &[])).unwrap();
        store.add_edge(Edge::functional("root", "leaf.ts:file")).unwrap();

        let result = store
            .traverse(&TraverseOptions {
                start_node: "root".into(),
                edge_type: EdgeSelector::Both,
                direction: Direction::Both,
                max_depth: 0,
                type_filter: None,
            })
            .unwrap();
        assert_eq!(result.nodes.len(), 1, "backend {name}");
        assert_eq!(result.nodes[0].id(), "root");
        assert_eq!(result.max_depth_reached, 0);
    }
}

#[test]
fn traverse_is_bounded_and_visits_once() {
    for (name, mut store) in backends() {
        for id in ["a", "b", "c"] {
            store.add_node(high(id, "organize features")).unwrap();
        }
        store.add_edge(Edge::functional("a", "b")).unwrap();
        store.add_edge(Edge::functional("b", "c")).unwrap();
        // A dependency edge closing a loop back to the start.
        store.add_edge(Edge::dependency("c", "a", DependencyType::Use)).unwrap();

        let result = store
            .traverse(&TraverseOptions {
                start_node: "a".into(),
                edge_type: EdgeSelector::Both,
                direction: Direction::Both,
                max_depth: 10,
                type_filter: None,
            })
            .unwrap();
        assert_eq!(result.nodes.len(), 3, "backend {name}");
        // The dependency loop back into "a" makes "c" a one-hop neighbor.
        assert_eq!(result.max_depth_reached, 1);

        let only_one_hop = store
            .traverse(&TraverseOptions {
                start_node: "a".into(),
                edge_type: EdgeSelector::Functional,
                direction: Direction::Out,
                max_depth: 1,
                type_filter: None,
            })
            .unwrap();
        assert_eq!(only_one_hop.nodes.len(), 2);
        assert_eq!(only_one_hop.max_depth_reached, 1);
    }
}

#[test]
fn feature_search_empty_query_is_empty() {
    for (name, mut store) in backends() {
        store.add_node(low("a.ts:function:greet", "a.ts", "format greeting text", &["greet"])).unwrap();
        assert!(store.search_by_feature("", &[]).unwrap().is_empty(), "backend {name}");
    }
}

#[test]
fn feature_search_finds_and_scopes() {
    for (name, mut store) in backends() {
        store.add_node(high("domain:Text", "organize text features")).unwrap();
        store.add_node(high("domain:Math", "organize math features")).unwrap();
        store
            .add_node(low("a.ts:function:greet", "a.ts", "format greeting text", &["greet"]))
            .unwrap();
        store
            .add_node(low("b.ts:function:add", "b.ts", "add two numbers", &["add"]))
            .unwrap();
        store.add_edge(Edge::functional("domain:Text", "a.ts:function:greet")).unwrap();
        store.add_edge(Edge::functional("domain:Math", "b.ts:function:add")).unwrap();

        let hits = store.search_by_feature("greeting", &[]).unwrap();
        assert!(
            hits.iter().any(|h| h.node.id() == "a.ts:function:greet"),
            "backend {name}"
        );

        // Scoped to the math subtree, the greeting node is filtered out.
        let hits = store
            .search_by_feature("greeting", &["domain:Math".to_string()])
            .unwrap();
        assert!(hits.is_empty(), "backend {name}");

        let hits = store
            .search_by_feature("add numbers", &["domain:Math".to_string()])
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node.id(), "b.ts:function:add");
    }
}

#[test]
fn path_search_matches_primary_and_extra_paths() {
    for (name, mut store) in backends() {
        let mut node = high("domain:Utils", "organize shared helpers");
        if let Node::HighLevel(hl) = &mut node {
            let mut meta = StructuralMetadata {
                entity_type: EntityType::Module,
                path: Some("src/utils".to_string()),
                ..Default::default()
            };
            meta.set_extra_paths(vec!["src/utils".to_string(), "tests/utils".to_string()]);
            hl.metadata = Some(meta);
        }
        store.add_node(node).unwrap();

        let hits = store.search_by_path("tests/utils*").unwrap();
        assert_eq!(hits.len(), 1, "backend {name}");
        assert_eq!(hits[0].id(), "domain:Utils");

        let hits = store.search_by_path("src/**").unwrap();
        assert_eq!(hits.len(), 1);
    }
}

#[test]
fn topological_order_puts_sources_first() {
    for (name, mut store) in backends() {
        for id in ["app.ts:file", "lib.ts:file", "util.ts:file"] {
            store
                .add_node(low(id, id.trim_end_matches(":file"), "aggregate file behavior", &[]))
                .unwrap();
        }
        store.add_edge(Edge::dependency("app.ts:file", "lib.ts:file", DependencyType::Import)).unwrap();
        store.add_edge(Edge::dependency("lib.ts:file", "util.ts:file", DependencyType::Import)).unwrap();

        let order = store.topological_order().unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("app.ts:file") < pos("lib.ts:file"), "backend {name}");
        assert!(pos("lib.ts:file") < pos("util.ts:file"));
    }
}

#[test]
fn export_import_round_trip() {
    for (name, mut store) in backends() {
        store
            .set_config(GraphConfig {
                name: "demo".into(),
                root_path: None,
                description: Some("round trip".into()),
            })
            .unwrap();
        store.add_node(high("domain:Core", "organize core features")).unwrap();
        store.add_node(low("a.ts:file", "a.ts", "aggregate file behavior", &["file"])).unwrap();
        store.add_edge(Edge::functional("domain:Core", "a.ts:file")).unwrap();

        let doc = store.export_document().unwrap();
        let mut other = rpg_store::native::NativeStore::in_memory();
        other.import_document(doc.clone()).unwrap();
        let round = other.export_document().unwrap();
        assert_eq!(round.nodes, doc.nodes, "backend {name}");
        assert_eq!(round.edges, doc.edges);
        assert_eq!(round.config, doc.config);
    }
}

#[test]
fn edge_filters() {
    for (name, mut store) in backends() {
        store.add_node(high("h", "organize features")).unwrap();
        store.add_node(low("a.ts:file", "a.ts", "aggregate file behavior", &[])).unwrap();
        store.add_node(low("b.ts:file", "b.ts", "aggregate file behavior", &[])).unwrap();
        store.add_edge(Edge::functional("h", "a.ts:file")).unwrap();
        store.add_edge(Edge::dependency("a.ts:file", "b.ts:file", DependencyType::Call)).unwrap();
        store.add_edge(Edge::dependency("a.ts:file", "b.ts:file", DependencyType::Import)).unwrap();

        let functional = store
            .get_edges(&EdgeFilter {
                functional: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(functional.len(), 1, "backend {name}");

        let calls = store
            .get_edges(&EdgeFilter {
                dependency_type: Some(DependencyType::Call),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(calls.len(), 1);

        assert!(
            store
                .remove_edge("a.ts:file", "b.ts:file", EdgeKind::Dependency(DependencyType::Call))
                .unwrap()
        );
        assert_eq!(store.edge_count().unwrap(), 2);
    }
}

#[test]
fn node_filters() {
    for (name, mut store) in backends() {
        store.add_node(high("h", "organize features")).unwrap();
        store.add_node(low("src/a.ts:file", "src/a.ts", "aggregate file behavior", &[])).unwrap();

        let highs = store
            .get_nodes(&NodeFilter {
                high_level: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(highs.len(), 1, "backend {name}");

        let under_src = store
            .get_nodes(&NodeFilter {
                path_prefix: Some("src/".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(under_src.len(), 1);
        assert_eq!(under_src[0].id(), "src/a.ts:file");
    }
}

#[test]
fn native_store_persists_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");
    {
        let mut store = rpg_store::native::NativeStore::open(&path).unwrap();
        store.add_node(high("domain:Core", "organize core features")).unwrap();
        store.flush().unwrap();
    }
    let store = rpg_store::native::NativeStore::open(&path).unwrap();
    assert!(store.get_node("domain:Core").unwrap().is_some());
}

#[test]
fn native_store_compressed_artifact_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");
    {
        let mut store = rpg_store::native::NativeStore::open(&path).unwrap();
        store.set_compress(true);
        store.add_node(high("domain:Core", "organize core features")).unwrap();
        store.flush().unwrap();
    }
    // Magic-byte detection picks up the compressed artifact transparently.
    let store = rpg_store::native::NativeStore::open(&path).unwrap();
    assert!(store.get_node("domain:Core").unwrap().is_some());
}
