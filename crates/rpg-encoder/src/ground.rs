//! Artifact grounding: bottom-up propagation of LCA directory paths onto
//! high-level nodes.

use rpg_core::error::Result;
use rpg_core::lca::{compute_lca, parent_dir};
use rpg_core::model::EntityType;
use rpg_store::rpg::Rpg;
use rpg_store::{GraphStore, MetadataPatch, NodePatch};
use std::collections::BTreeSet;

/// Ground every high-level node reachable from the hierarchy roots. Returns
/// the number of nodes that received a path.
pub fn ground(rpg: &mut Rpg) -> Result<usize> {
    let roots: Vec<String> = rpg
        .hierarchy_roots()?
        .iter()
        .map(|n| n.id().to_string())
        .collect();
    let mut grounded = 0usize;
    for root in roots {
        propagate(rpg, &root, &mut grounded)?;
    }
    Ok(grounded)
}

/// Post-order propagation: leaves contribute their directories, high-level
/// ancestors receive the LCA of everything below them. Returns the directory
/// set of the subtree.
fn propagate(rpg: &mut Rpg, node_id: &str, grounded: &mut usize) -> Result<BTreeSet<String>> {
    let Some(node) = rpg.store().get_node(node_id)? else {
        return Ok(BTreeSet::new());
    };

    if node.is_low_level() {
        let mut dirs = BTreeSet::new();
        // Missing paths are skipped silently.
        if let Some(path) = node.path() {
            let dir = parent_dir(path);
            if !dir.is_empty() {
                dirs.insert(dir);
            }
        }
        return Ok(dirs);
    }

    let children: Vec<String> = rpg
        .store()
        .get_children(node_id)?
        .iter()
        .map(|c| c.id().to_string())
        .collect();
    let mut dirs: BTreeSet<String> = BTreeSet::new();
    for child in children {
        dirs.extend(propagate(rpg, &child, grounded)?);
    }

    if !dirs.is_empty() {
        let dir_list: Vec<String> = dirs.iter().cloned().collect();
        let lca = compute_lca(&dir_list);
        if let Some(first) = lca.first() {
            let mut patch = MetadataPatch {
                entity_type: Some(EntityType::Module),
                // compute_lca returns sorted paths, so the first is the
                // lexicographically smallest.
                path: Some(first.clone()),
                ..Default::default()
            };
            if lca.len() > 1 {
                patch.extra.insert(
                    rpg_core::model::EXTRA_PATHS_KEY.to_string(),
                    serde_json::Value::Array(
                        lca.iter()
                            .map(|p| serde_json::Value::String(p.clone()))
                            .collect(),
                    ),
                );
            }
            rpg.store_mut()
                .update_node(node_id, &NodePatch::metadata(patch))?;
            *grounded += 1;
        }
    }

    Ok(dirs)
}
