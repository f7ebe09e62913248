//! Semantic extraction: one feature per entity, batched LLM calls with a
//! heuristic fallback, file-level aggregation from direct children.

use crate::batch::{estimate_tokens, plan_batches};
use crate::cache::{SemanticCache, content_hash};
use crate::llm::LlmClient;
use crate::normalize::normalize_feature;
use futures_util::StreamExt;
use rpg_core::config::SemanticConfig;
use rpg_core::error::Result;
use rpg_core::model::SemanticFeature;
use rpg_parser::{CodeEntity, CodeEntityKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// The extraction system prompt, enforcing the feature-naming rules.
const SEMANTIC_PARSING_SYSTEM: &str = include_str!("prompts/semantic_parsing.md");

/// One extraction request: the entity and the file that declares it.
#[derive(Debug, Clone)]
pub struct ExtractItem {
    pub file_path: String,
    pub entity: CodeEntity,
}

/// Extracts semantic features, LLM-backed or heuristic.
pub struct SemanticExtractor {
    llm: Option<Arc<dyn LlmClient>>,
    cache: Arc<SemanticCache>,
    config: SemanticConfig,
}

impl SemanticExtractor {
    pub fn new(
        llm: Option<Arc<dyn LlmClient>>,
        cache: Arc<SemanticCache>,
        config: SemanticConfig,
    ) -> Self {
        Self { llm, cache, config }
    }

    /// Heuristic-only extractor with no cache.
    pub fn heuristic_only() -> Self {
        Self {
            llm: None,
            cache: Arc::new(SemanticCache::ephemeral()),
            config: SemanticConfig {
                use_llm: false,
                ..SemanticConfig::default()
            },
        }
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    /// Extract the feature for a single entity.
    pub async fn extract(&self, file_path: &str, entity: &CodeEntity) -> Result<SemanticFeature> {
        let features = self
            .extract_batch(&[ExtractItem {
                file_path: file_path.to_string(),
                entity: entity.clone(),
            }])
            .await?;
        Ok(features.into_iter().next().unwrap_or_default())
    }

    /// Extract features for a batch of entities, preserving input order.
    pub async fn extract_batch(&self, items: &[ExtractItem]) -> Result<Vec<SemanticFeature>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<Option<SemanticFeature>> = vec![None; items.len()];
        let mut misses: Vec<usize> = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            let hash = content_hash(&item.entity.source_text);
            match self
                .cache
                .get(&item.file_path, &item.entity.qualified_name(), &hash)
            {
                Some(feature) => results[idx] = Some(feature),
                None => misses.push(idx),
            }
        }

        let use_llm = self.config.use_llm && self.llm.is_some();
        if use_llm && !misses.is_empty() {
            let llm = self.llm.clone().expect("checked is_some");
            let costs: Vec<usize> = misses
                .iter()
                .map(|&i| estimate_tokens(items[i].entity.source_text.len()))
                .collect();
            let batches = plan_batches(
                &costs,
                self.config.min_batch_tokens,
                self.config.max_batch_tokens,
            );

            // One suspension per batch, bounded in-flight fan-out.
            let deadline = self.deadline();
            let batch_results: Vec<(usize, HashMap<String, SemanticFeature>)> =
                futures_util::stream::iter(batches.iter().enumerate().map(|(batch_no, batch)| {
                    let batch_items: Vec<&ExtractItem> =
                        batch.iter().map(|&k| &items[misses[k]]).collect();
                    let prompt = build_batch_prompt(&batch_items);
                    let llm = llm.clone();
                    async move {
                        let parsed = lift_batch(llm.as_ref(), &prompt, deadline).await;
                        (batch_no, parsed)
                    }
                }))
                .buffer_unordered(self.config.max_in_flight.max(1))
                .collect()
                .await;

            let mut by_batch: HashMap<usize, HashMap<String, SemanticFeature>> = HashMap::new();
            for (batch_no, parsed) in batch_results {
                by_batch.insert(batch_no, parsed);
            }

            for (batch_no, batch) in batches.iter().enumerate() {
                let parsed = by_batch.remove(&batch_no).unwrap_or_default();
                for &k in batch {
                    let idx = misses[k];
                    let item = &items[idx];
                    if let Some(feature) = parsed.get(&item.entity.name) {
                        results[idx] = Some(feature.clone());
                    }
                }
            }
        }

        // Anything the LLM missed (or heuristic mode entirely) falls back to
        // the name-derived feature for that entity only.
        for (idx, slot) in results.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(heuristic_feature(&items[idx].entity));
            }
        }

        let features: Vec<SemanticFeature> = results
            .into_iter()
            .map(|f| normalize_feature(f.unwrap_or_default()))
            .collect();

        for (item, feature) in items.iter().zip(&features) {
            let hash = content_hash(&item.entity.source_text);
            self.cache.set(
                &item.file_path,
                &item.entity.qualified_name(),
                &hash,
                feature.clone(),
            );
        }

        Ok(features)
    }

    pub fn cache(&self) -> &SemanticCache {
        &self.cache
    }
}

fn build_batch_prompt(items: &[&ExtractItem]) -> String {
    let mut prompt = String::from("### Code to Analyze\n\n");
    for item in items {
        prompt.push_str(&format!(
            "#### {} ({:?}) in {}\n```\n{}\n```\n\n",
            item.entity.name, item.entity.kind, item.file_path, item.entity.source_text
        ));
    }
    prompt
}

/// Run one batch through the LLM; retry once with a corrective suffix when
/// nothing parses. Transport or double-parse failure yields an empty map and
/// the caller's heuristic fallback takes over.
async fn lift_batch(
    llm: &dyn LlmClient,
    prompt: &str,
    deadline: Duration,
) -> HashMap<String, SemanticFeature> {
    let first = llm.complete(SEMANTIC_PARSING_SYSTEM, prompt, deadline).await;
    if let Ok(response) = &first {
        let parsed = parse_line_features(response);
        if !parsed.is_empty() {
            return parsed;
        }
    }

    let corrective = format!(
        "{prompt}\n\nYour previous output was not in the required line format. \
         Output one `name | description | keywords` line per entity, nothing else."
    );
    match llm.complete(SEMANTIC_PARSING_SYSTEM, &corrective, deadline).await {
        Ok(response) => parse_line_features(&response),
        Err(err) => {
            tracing::warn!("batch extraction failed, using heuristic fallback: {err}");
            HashMap::new()
        }
    }
}

/// Parse the pipe-delimited line format:
/// `entity_name | description | kw1, kw2 | extra responsibility...`
///
/// Partial corruption loses individual lines, never the whole response.
pub fn parse_line_features(text: &str) -> HashMap<String, SemanticFeature> {
    let mut features = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("```") {
            continue;
        }
        let mut parts = line.split('|').map(str::trim);
        let Some(name) = parts.next().filter(|n| !n.is_empty()) else {
            continue;
        };
        let Some(description) = parts.next().filter(|d| !d.is_empty()) else {
            continue;
        };
        let keywords: Vec<String> = parts
            .next()
            .unwrap_or_default()
            .split(',')
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        let subs: Vec<String> = parts
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        features.insert(
            name.to_string(),
            SemanticFeature {
                description: description.to_string(),
                keywords,
                sub_features: if subs.is_empty() { None } else { Some(subs) },
            },
        );
    }
    features
}

/// Verb rewrites applied to known name prefixes in heuristic mode.
const VERB_MAP: &[(&str, &str)] = &[
    ("get", "retrieve"),
    ("set", "assign"),
    ("is", "check"),
    ("has", "check"),
    ("init", "initialize"),
    ("calc", "compute"),
    ("compute", "compute"),
    ("make", "create"),
    ("create", "create"),
    ("new", "create"),
    ("load", "load"),
    ("parse", "parse"),
    ("read", "read"),
    ("write", "write"),
    ("build", "build"),
    ("find", "find"),
    ("fetch", "fetch"),
    ("send", "send"),
    ("add", "add"),
    ("remove", "remove"),
    ("delete", "delete"),
    ("update", "update"),
    ("render", "render"),
    ("validate", "validate"),
    ("handle", "handle"),
    ("run", "run"),
    ("test", "verify"),
    ("format", "format"),
    ("convert", "convert"),
    ("to", "convert"),
];

/// Split a camelCase or snake_case identifier into lowercase words.
pub fn split_identifier(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    for chunk in name.split(['_', '-', '.']) {
        let mut current = String::new();
        for c in chunk.chars() {
            if c.is_uppercase() && !current.is_empty() {
                words.push(current.to_lowercase());
                current = String::new();
            }
            current.push(c);
        }
        if !current.is_empty() {
            words.push(current.to_lowercase());
        }
    }
    words.retain(|w| !w.is_empty());
    words
}

/// Name-derived verb+object feature for heuristic mode and LLM fallback.
pub fn heuristic_feature(entity: &CodeEntity) -> SemanticFeature {
    let words = split_identifier(&entity.name);
    let mut keywords = words.clone();
    if let Some(parent) = &entity.parent {
        for w in split_identifier(parent) {
            if !keywords.contains(&w) {
                keywords.push(w);
            }
        }
    }

    let description = match words.split_first() {
        Some((first, rest)) => {
            let mapped = VERB_MAP
                .iter()
                .find(|(prefix, _)| prefix == first)
                .map(|(_, verb)| *verb);
            let (verb, object_words): (&str, Vec<String>) = match mapped {
                Some(verb) => (verb, rest.to_vec()),
                None => match entity.kind {
                    CodeEntityKind::Class => ("manage", words.clone()),
                    _ => ("handle", words.clone()),
                },
            };
            let object = if object_words.is_empty() {
                entity
                    .parent
                    .as_deref()
                    .map(|p| split_identifier(p).join(" "))
                    .unwrap_or_else(|| "state".to_string())
            } else {
                object_words.join(" ")
            };
            format!("{verb} {object}")
        }
        None => "provide placeholder implementation".to_string(),
    };

    SemanticFeature {
        description,
        keywords,
        sub_features: None,
    }
}

/// Synthesize a file-level feature from the features of the file's direct
/// children. The merged keyword set is deduplicated; an empty child list
/// falls back to a name-derived default.
pub fn aggregate_file_features(
    children: &[SemanticFeature],
    file_name: &str,
    _file_path: &str,
) -> SemanticFeature {
    if children.is_empty() {
        let stem = file_name.rsplit_once('.').map_or(file_name, |(s, _)| s);
        let words = split_identifier(stem).join(" ");
        return normalize_feature(SemanticFeature::new(
            format!("declare {words} module"),
            split_identifier(stem),
        ));
    }

    let mut keywords: Vec<String> = Vec::new();
    for child in children {
        for kw in &child.keywords {
            if !keywords.contains(kw) {
                keywords.push(kw.clone());
            }
        }
    }

    // The dominant leading verb over child descriptions, plus their most
    // frequent object words, becomes the synthesized description.
    let mut verb_counts: HashMap<&str, usize> = HashMap::new();
    let mut object_counts: Vec<(String, usize)> = Vec::new();
    for child in children {
        let mut parts = child.description.split_whitespace();
        if let Some(verb) = parts.next() {
            *verb_counts.entry(verb).or_insert(0) += 1;
        }
        for word in parts {
            match object_counts.iter_mut().find(|(w, _)| w == word) {
                Some((_, count)) => *count += 1,
                None => object_counts.push((word.to_string(), 1)),
            }
        }
    }
    let verb = verb_counts
        .into_iter()
        .max_by_key(|&(_, count)| count)
        .map_or("provide", |(verb, _)| verb);
    object_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let objects: Vec<&str> = object_counts
        .iter()
        .take(3)
        .map(|(word, _)| word.as_str())
        .collect();

    let description = if objects.is_empty() {
        format!("{verb} module behavior")
    } else {
        format!("{verb} {}", objects.join(" "))
    };

    normalize_feature(SemanticFeature {
        description,
        keywords,
        sub_features: None,
    })
}
