//! ExploreRPG: bounded traversal over selected edge families.

use rpg_core::error::{Result, RpgError};
use rpg_core::model::{Edge, Node};
use rpg_store::rpg::Rpg;
use rpg_store::{Direction, EdgeSelector, GraphStore};
use std::collections::{HashSet, VecDeque};

/// Traversal strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Bfs,
    Dfs,
}

/// Exploration request.
#[derive(Debug, Clone)]
pub struct ExploreOptions {
    pub start_node: String,
    pub edge_type: EdgeSelector,
    pub direction: Direction,
    pub max_depth: usize,
    pub strategy: Strategy,
}

impl ExploreOptions {
    pub fn new(start_node: impl Into<String>) -> Self {
        Self {
            start_node: start_node.into(),
            edge_type: EdgeSelector::Both,
            direction: Direction::Out,
            max_depth: 2,
            strategy: Strategy::Bfs,
        }
    }
}

/// Ordered traversal output.
#[derive(Debug, Clone, Default)]
pub struct ExploreResult {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub max_depth_reached: usize,
}

/// Bounded multi-edge traversal. Each node is visited once; termination is
/// guaranteed by the visited set and the depth bound.
pub struct ExploreRpg;

impl ExploreRpg {
    pub fn traverse(rpg: &Rpg, options: &ExploreOptions) -> Result<ExploreResult> {
        let store = rpg.store();
        let Some(start) = store.get_node(&options.start_node)? else {
            return Err(RpgError::NotFound(format!("node {}", options.start_node)));
        };

        let mut result = ExploreResult {
            nodes: vec![start],
            ..Default::default()
        };
        let mut visited: HashSet<String> = HashSet::from([options.start_node.clone()]);
        let mut frontier: VecDeque<(String, usize)> =
            VecDeque::from([(options.start_node.clone(), 0)]);

        while let Some((current, depth)) = match options.strategy {
            Strategy::Bfs => frontier.pop_front(),
            Strategy::Dfs => frontier.pop_back(),
        } {
            if depth >= options.max_depth {
                continue;
            }

            let mut hops: Vec<(Edge, String)> = Vec::new();
            if matches!(options.direction, Direction::Out | Direction::Both) {
                for edge in store.get_out_edges(&current, options.edge_type)? {
                    let target = edge.target().to_string();
                    hops.push((edge, target));
                }
            }
            if matches!(options.direction, Direction::In | Direction::Both) {
                for edge in store.get_in_edges(&current, options.edge_type)? {
                    let source = edge.source().to_string();
                    hops.push((edge, source));
                }
            }

            for (edge, neighbor_id) in hops {
                if visited.contains(&neighbor_id) {
                    continue;
                }
                let Some(neighbor) = store.get_node(&neighbor_id)? else {
                    continue;
                };
                visited.insert(neighbor_id.clone());
                result.edges.push(edge);
                result.nodes.push(neighbor);
                result.max_depth_reached = result.max_depth_reached.max(depth + 1);
                frontier.push_back((neighbor_id, depth + 1));
            }
        }
        Ok(result)
    }
}
