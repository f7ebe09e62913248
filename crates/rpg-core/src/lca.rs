//! Trie-based LCA computation over POSIX directory paths.
//!
//! Used by artifact grounding: the LCA set of a node's leaf directories is
//! every trie node that is branching (more than one child) or terminal (final
//! segment of an inserted path), with each collected ancestor consolidating
//! away its descendants.

use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct TrieNode {
    children: BTreeMap<String, TrieNode>,
    is_terminal: bool,
}

impl TrieNode {
    fn insert(&mut self, segments: &[&str]) {
        if segments.is_empty() {
            self.is_terminal = true;
            return;
        }
        self.children
            .entry(segments[0].to_string())
            .or_default()
            .insert(&segments[1..]);
    }
}

/// Parent directory of a relative POSIX path. Empty for a root-level file.
pub fn parent_dir(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

/// Compute the LCA directory set for a set of directory paths.
///
/// Properties: idempotent, stable under permutation of the input, no output
/// path is a strict prefix of another, and similar-prefix segments are
/// distinguished (`src/graph` vs `src/graph-store`). Empty segments and empty
/// inputs contribute nothing.
pub fn compute_lca(dirs: &[String]) -> Vec<String> {
    let mut root = TrieNode::default();
    let mut any = false;
    for dir in dirs {
        let segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            continue;
        }
        any = true;
        root.insert(&segments);
    }
    if !any {
        return Vec::new();
    }

    let mut results = Vec::new();
    collect(&root, &mut Vec::new(), &mut results);
    results.sort();
    results
}

/// Post-order walk: descendants are collected first, then replaced when an
/// ancestor itself qualifies (subtree consolidation).
fn collect(node: &TrieNode, current: &mut Vec<String>, results: &mut Vec<String>) {
    for (segment, child) in &node.children {
        current.push(segment.clone());
        collect(child, current, results);
        current.pop();
    }

    if current.is_empty() {
        // The trie root is not a directory.
        return;
    }

    if node.is_terminal || node.children.len() > 1 {
        let path = current.join("/");
        let prefix = format!("{path}/");
        results.retain(|p| !p.starts_with(&prefix));
        results.push(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn single_directory() {
        assert_eq!(compute_lca(&dirs(&["src/data"])), vec!["src/data"]);
        assert_eq!(
            compute_lca(&dirs(&["src/data", "src/data"])),
            vec!["src/data"]
        );
    }

    #[test]
    fn branching_consolidates_to_parent() {
        assert_eq!(compute_lca(&dirs(&["a/b", "a/c", "a/d"])), vec!["a"]);
    }

    #[test]
    fn disjoint_roots_yield_multiple_lcas() {
        assert_eq!(
            compute_lca(&dirs(&["src/utils", "tests/utils"])),
            vec!["src/utils", "tests/utils"]
        );
    }

    #[test]
    fn stable_under_permutation() {
        let forward = compute_lca(&dirs(&["a/b", "a/c", "x/y"]));
        let backward = compute_lca(&dirs(&["x/y", "a/c", "a/b"]));
        assert_eq!(forward, backward);
    }

    #[test]
    fn no_output_is_prefix_of_another() {
        let out = compute_lca(&dirs(&["a", "a/b", "a/b/c", "z/q"]));
        for (i, p) in out.iter().enumerate() {
            for (j, q) in out.iter().enumerate() {
                if i != j {
                    assert!(!q.starts_with(&format!("{p}/")), "{q} extends {p}");
                }
            }
        }
    }

    #[test]
    fn ancestor_consolidates_descendants() {
        // "a" is itself a terminal directory, so it absorbs "a/b".
        assert_eq!(compute_lca(&dirs(&["a", "a/b"])), vec!["a"]);
    }

    #[test]
    fn similar_prefix_segments_are_distinct() {
        assert_eq!(
            compute_lca(&dirs(&["src/graph", "src/graph-store"])),
            vec!["src"]
        );
        // Segment-wise: "graph" is not a prefix of "graph-store", so both are
        // terminal leaves under a branching "src", not one nested in the other.
        assert_eq!(compute_lca(&dirs(&["src/graph"])), vec!["src/graph"]);
    }

    #[test]
    fn empty_input() {
        assert!(compute_lca(&[]).is_empty());
        assert!(compute_lca(&dirs(&["", ""])).is_empty());
    }

    #[test]
    fn idempotent() {
        let first = compute_lca(&dirs(&["a/b", "a/c", "x/y"]));
        let second = compute_lca(&first);
        assert_eq!(first, second);
    }

    #[test]
    fn parent_dir_of_paths() {
        assert_eq!(parent_dir("src/a.ts"), "src");
        assert_eq!(parent_dir("src/nested/b.py"), "src/nested");
        assert_eq!(parent_dir("main.rs"), "");
    }
}
