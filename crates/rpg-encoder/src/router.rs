//! The semantic router: top-down descent to the best functional parent.

use crate::embed::{Embedder, cosine_similarity, keyword_jaccard};
use crate::llm::{LlmClient, ask_solution_json};
use rpg_core::error::Result;
use rpg_core::model::{Node, SemanticFeature};
use rpg_store::rpg::Rpg;
use std::time::Duration;

const ROUTING_SYSTEM: &str = include_str!("prompts/semantic_routing.md");

/// Routes features through the high-level hierarchy.
pub struct SemanticRouter<'a> {
    llm: Option<&'a dyn LlmClient>,
    embedder: Option<&'a dyn Embedder>,
    deadline: Duration,
}

impl<'a> SemanticRouter<'a> {
    pub fn new(
        llm: Option<&'a dyn LlmClient>,
        embedder: Option<&'a dyn Embedder>,
        deadline: Duration,
    ) -> Self {
        Self {
            llm,
            embedder,
            deadline,
        }
    }

    /// Descend from `root`: at each level consider only high-level children;
    /// ask which child (if any) is the most compatible parent; "none" stops
    /// at the current node. Falls back to cosine similarity over feature
    /// embeddings, then keyword overlap, when no LLM is configured.
    pub async fn find_best_parent(
        &self,
        rpg: &Rpg,
        feature: &SemanticFeature,
        root: &str,
    ) -> Result<String> {
        let mut current = root.to_string();
        loop {
            let children: Vec<Node> = rpg
                .store()
                .get_children(&current)?
                .into_iter()
                .filter(Node::is_high_level)
                .collect();
            if children.is_empty() {
                return Ok(current);
            }

            let choice = match self.llm {
                Some(llm) => self.ask_llm(llm, feature, &children).await?,
                None => self.heuristic_choice(feature, &children),
            };

            match choice {
                Some(child_id) if children.iter().any(|c| c.id() == child_id) => {
                    current = child_id;
                }
                _ => return Ok(current),
            }
        }
    }

    /// Pick the best starting root, then descend. Returns `None` when the
    /// graph has no high-level roots.
    pub async fn route_from_roots(
        &self,
        rpg: &Rpg,
        feature: &SemanticFeature,
    ) -> Result<Option<String>> {
        let roots = rpg.hierarchy_roots()?;
        let root = match roots.len() {
            0 => return Ok(None),
            1 => roots[0].id().to_string(),
            _ => match self.llm {
                Some(llm) => self
                    .ask_llm(llm, feature, &roots)
                    .await?
                    .unwrap_or_else(|| roots[0].id().to_string()),
                None => self
                    .heuristic_choice(feature, &roots)
                    .unwrap_or_else(|| roots[0].id().to_string()),
            },
        };
        Ok(Some(self.find_best_parent(rpg, feature, &root).await?))
    }

    async fn ask_llm(
        &self,
        llm: &dyn LlmClient,
        feature: &SemanticFeature,
        children: &[Node],
    ) -> Result<Option<String>> {
        let mut prompt = format!(
            "Entity behavior: {}\nKeywords: {}\n\nCandidate children:\n",
            feature.description,
            feature.keywords.join(", ")
        );
        for child in children {
            prompt.push_str(&format!(
                "- {} — {}\n",
                child.id(),
                child.feature().description
            ));
        }
        prompt.push_str("\nAnswer with the chosen child id or \"none\".");

        let answer: String =
            ask_solution_json(llm, ROUTING_SYSTEM, &prompt, self.deadline).await?;
        if answer.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        Ok(Some(answer))
    }

    fn heuristic_choice(&self, feature: &SemanticFeature, children: &[Node]) -> Option<String> {
        if let Some(embedder) = self.embedder {
            let mut texts = vec![feature.index_text()];
            texts.extend(children.iter().map(|c| c.feature().index_text()));
            if let Ok(vectors) = embedder.embed(&texts)
                && vectors.len() == children.len() + 1
            {
                let query = &vectors[0];
                let best = children
                    .iter()
                    .zip(&vectors[1..])
                    .map(|(child, vec)| (child.id(), cosine_similarity(query, vec)))
                    .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
                if let Some((id, score)) = best
                    && score > 0.1
                {
                    return Some(id.to_string());
                }
                return None;
            }
        }

        // Last resort: keyword overlap against child features.
        let best = children
            .iter()
            .map(|child| {
                (
                    child.id(),
                    keyword_jaccard(&feature.keywords, &child.feature().keywords),
                )
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        match best {
            Some((id, score)) if score > 0.0 => Some(id.to_string()),
            _ => None,
        }
    }
}
