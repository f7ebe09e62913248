//! FetchNode: node retrieval with source snippets and ancestry context.

use rpg_core::error::Result;
use rpg_core::model::Node;
use rpg_store::GraphStore;
use rpg_store::rpg::Rpg;

/// Ids to fetch: code entities and/or feature (high-level) nodes. The two
/// lists are looked up identically; the split mirrors how callers think.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub code_entities: Vec<String>,
    pub feature_entities: Vec<String>,
}

/// One fetched node with its context.
#[derive(Debug, Clone)]
pub struct FetchedNode {
    pub node: Node,
    pub source_code: Option<String>,
    /// `root / … / node` along functional parents.
    pub ancestry: String,
}

/// Fetch outcome: resolved nodes plus the ids that did not resolve.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    pub nodes: Vec<FetchedNode>,
    pub not_found: Vec<String>,
}

/// Precise node retrieval.
pub struct FetchNode;

impl FetchNode {
    pub fn get(rpg: &Rpg, request: &FetchRequest) -> Result<FetchResult> {
        let mut result = FetchResult::default();
        for id in request
            .code_entities
            .iter()
            .chain(request.feature_entities.iter())
        {
            match rpg.store().get_node(id)? {
                Some(node) => {
                    let ancestry = rpg.ancestry(id)?.join(" / ");
                    result.nodes.push(FetchedNode {
                        source_code: node.source_code().map(String::from),
                        node,
                        ancestry,
                    });
                }
                None => result.not_found.push(id.clone()),
            }
        }
        Ok(result)
    }
}
