//! SearchNode: feature, snippet, and auto-mode staged-fallback search.

use rpg_core::error::Result;
use rpg_store::GraphStore;
use rpg_store::rpg::Rpg;
use std::collections::HashSet;

/// Search mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Full-text search over semantic features.
    Features,
    /// Glob search over grounded paths.
    Snippets,
    /// Features first; snippets only when features return nothing and a
    /// file pattern is available (staged fallback).
    Auto,
}

/// Search request.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub mode: Option<SearchMode>,
    /// One feature query per term.
    pub feature_terms: Vec<String>,
    /// Subtree roots restricting feature-search candidates.
    pub search_scopes: Vec<String>,
    pub file_pattern: Option<String>,
    /// Keep only nodes overlapping this 1-indexed inclusive line range.
    pub line_range: Option<(usize, usize)>,
    pub limit: Option<usize>,
}

fn in_line_range(node: &rpg_core::model::Node, range: Option<(usize, usize)>) -> bool {
    let Some((start, end)) = range else {
        return true;
    };
    let Some(meta) = node.metadata() else {
        return false;
    };
    let node_start = meta.start_line.unwrap_or(1);
    let node_end = meta.end_line.unwrap_or(usize::MAX);
    node_end >= start && node_start <= end
}

/// One search hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub node_id: String,
    pub description: String,
    pub path: Option<String>,
    pub score: f64,
}

/// Intent-based node discovery.
pub struct SearchNode;

impl SearchNode {
    /// Run a query. Results are deduplicated by id, preserving first-seen
    /// order.
    pub fn query(rpg: &Rpg, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let mode = options.mode.unwrap_or(SearchMode::Auto);
        let limit = options.limit.unwrap_or(20);

        let mut results: Vec<SearchResult> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        match mode {
            SearchMode::Features => {
                Self::feature_search(rpg, options, &mut results, &mut seen)?;
            }
            SearchMode::Snippets => {
                Self::snippet_search(rpg, options, &mut results, &mut seen)?;
            }
            SearchMode::Auto => {
                Self::feature_search(rpg, options, &mut results, &mut seen)?;
                // Staged fallback: snippets bootstrap anchors only when
                // feature search found nothing and a pattern exists.
                if results.is_empty() && options.file_pattern.is_some() {
                    Self::snippet_search(rpg, options, &mut results, &mut seen)?;
                }
            }
        }

        results.truncate(limit);
        Ok(results)
    }

    fn feature_search(
        rpg: &Rpg,
        options: &SearchOptions,
        results: &mut Vec<SearchResult>,
        seen: &mut HashSet<String>,
    ) -> Result<()> {
        for term in &options.feature_terms {
            for hit in rpg
                .store()
                .search_by_feature(term, &options.search_scopes)?
            {
                if !in_line_range(&hit.node, options.line_range) {
                    continue;
                }
                if seen.insert(hit.node.id().to_string()) {
                    results.push(SearchResult {
                        node_id: hit.node.id().to_string(),
                        description: hit.node.feature().description.clone(),
                        path: hit.node.path().map(String::from),
                        score: hit.score,
                    });
                }
            }
        }
        Ok(())
    }

    fn snippet_search(
        rpg: &Rpg,
        options: &SearchOptions,
        results: &mut Vec<SearchResult>,
        seen: &mut HashSet<String>,
    ) -> Result<()> {
        let Some(pattern) = &options.file_pattern else {
            return Ok(());
        };
        for node in rpg.store().search_by_path(pattern)? {
            if !in_line_range(&node, options.line_range) {
                continue;
            }
            if seen.insert(node.id().to_string()) {
                results.push(SearchResult {
                    node_id: node.id().to_string(),
                    description: node.feature().description.clone(),
                    path: node.path().map(String::from),
                    score: 1.0,
                });
            }
        }
        Ok(())
    }
}
