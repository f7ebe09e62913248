//! The evolution engine: apply a commit delta to an existing graph as three
//! atomic operation classes, scheduled Delete → Modify → Insert, with
//! semantic drift detection and top-down routing for re-inserted entities.

use crate::cache::SemanticCache;
use crate::embed::{Embedder, cosine_similarity, keyword_jaccard};
use crate::extract::{SemanticExtractor, aggregate_file_features};
use crate::inject::{self, FileAnalysis};
use crate::llm::{CountingLlm, LlmClient};
use crate::router::SemanticRouter;
use crate::vcs::{FileStatus, Vcs};
use rpg_core::config::{EvolutionConfig, InjectorConfig, SemanticConfig};
use rpg_core::error::{Result, RpgError};
use rpg_core::model::{EntityType, SemanticFeature, SourceLanguage, StructuralMetadata};
use rpg_store::rpg::{LowLevelNodeArgs, Rpg};
use rpg_store::{EdgeSelector, GraphStore, MetadataPatch, NodePatch};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters reported by one evolution run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EvolutionResult {
    pub inserted: usize,
    pub deleted: usize,
    pub modified: usize,
    pub rerouted: usize,
    pub pruned_nodes: usize,
    pub llm_calls: usize,
    pub duration_ms: u128,
}

/// A scheduled node deletion. File nodes sort after their entities so a
/// deleted file empties before its own node goes.
#[derive(Debug)]
struct Deletion {
    file: String,
    start_line: usize,
    node_id: String,
}

/// A scheduled entity modification.
#[derive(Debug)]
struct Modification {
    file: String,
    language: SourceLanguage,
    node_id: String,
    entity: rpg_parser::CodeEntity,
    entity_type: EntityType,
}

/// A scheduled entity insertion.
#[derive(Debug)]
struct Insertion {
    file: String,
    language: SourceLanguage,
    entity: rpg_parser::CodeEntity,
    entity_type: EntityType,
}

fn entity_node_id(file: &str, entity_type: EntityType, qualified: &str) -> String {
    format!("{file}:{}:{qualified}", entity_type.name())
}

fn file_node_id(file: &str) -> String {
    format!("{file}:file")
}

/// Applies commit deltas to a graph.
pub struct EvolutionEngine {
    vcs: Box<dyn Vcs>,
    llm: Option<Arc<CountingLlm>>,
    embedder: Option<Arc<dyn Embedder>>,
    semantic: SemanticConfig,
    injector: InjectorConfig,
    cache: Arc<SemanticCache>,
}

impl EvolutionEngine {
    pub fn new(vcs: Box<dyn Vcs>) -> Self {
        Self {
            vcs,
            llm: None,
            embedder: None,
            semantic: SemanticConfig::default(),
            injector: InjectorConfig::default(),
            cache: Arc::new(SemanticCache::ephemeral()),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(Arc::new(CountingLlm::new(llm)));
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_cache(mut self, cache: Arc<SemanticCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_semantic_config(mut self, semantic: SemanticConfig) -> Self {
        self.semantic = semantic;
        self
    }

    pub fn with_injector_config(mut self, injector: InjectorConfig) -> Self {
        self.injector = injector;
        self
    }

    /// Apply the diff for `config.commit_range` to the graph.
    pub async fn evolve(
        &self,
        rpg: &mut Rpg,
        root: &Path,
        config: &EvolutionConfig,
    ) -> Result<EvolutionResult> {
        config.validate()?;
        let started = Instant::now();
        let llm_calls_before = self.llm.as_ref().map_or(0, |l| l.calls());

        let deltas = self.vcs.changed_files(root, &config.commit_range)?;
        let mut result = EvolutionResult::default();

        let use_llm = config.use_llm && self.llm.is_some();
        let llm_for_run: Option<Arc<dyn LlmClient>> = if use_llm {
            self.llm.clone().map(|l| l as Arc<dyn LlmClient>)
        } else {
            None
        };
        let extractor = SemanticExtractor::new(
            llm_for_run.clone(),
            Arc::clone(&self.cache),
            SemanticConfig {
                use_llm,
                ..self.semantic.clone()
            },
        );
        let deadline = Duration::from_secs(self.semantic.request_timeout_secs);

        // Partition the diff into the three operation classes.
        let mut deletions: Vec<Deletion> = Vec::new();
        let mut modifications: Vec<Modification> = Vec::new();
        let mut insertions: Vec<Insertion> = Vec::new();
        let mut touched: Vec<(String, SourceLanguage, String)> = Vec::new();

        for delta in &deltas {
            let Some(language) = SourceLanguage::from_path(&delta.file) else {
                continue;
            };
            self.cache.invalidate_file(&delta.file);

            let old_entities = parse_entities(delta.old_content.as_deref(), language, &delta.file);
            let new_entities = parse_entities(delta.new_content.as_deref(), language, &delta.file);

            let old_by_name: HashMap<String, &ParsedEntity> = old_entities
                .iter()
                .map(|e| (e.entity.qualified_name(), e))
                .collect();
            let new_by_name: HashMap<String, &ParsedEntity> = new_entities
                .iter()
                .map(|e| (e.entity.qualified_name(), e))
                .collect();

            for old in &old_entities {
                if !new_by_name.contains_key(&old.entity.qualified_name()) {
                    deletions.push(Deletion {
                        file: delta.file.clone(),
                        start_line: old.entity.start_line,
                        node_id: entity_node_id(
                            &delta.file,
                            old.entity_type,
                            &old.entity.qualified_name(),
                        ),
                    });
                }
            }
            if delta.status == FileStatus::Deleted {
                deletions.push(Deletion {
                    file: delta.file.clone(),
                    start_line: usize::MAX,
                    node_id: file_node_id(&delta.file),
                });
            }

            for new in &new_entities {
                let qualified = new.entity.qualified_name();
                if old_by_name.contains_key(&qualified) {
                    modifications.push(Modification {
                        file: delta.file.clone(),
                        language,
                        node_id: entity_node_id(&delta.file, new.entity_type, &qualified),
                        entity: new.entity.clone(),
                        entity_type: new.entity_type,
                    });
                } else {
                    insertions.push(Insertion {
                        file: delta.file.clone(),
                        language,
                        entity: new.entity.clone(),
                        entity_type: new.entity_type,
                    });
                }
            }

            if let Some(new_content) = &delta.new_content {
                touched.push((delta.file.clone(), language, new_content.clone()));
            }
        }

        // Stable within-class order: (file path, start line).
        deletions.sort_by(|a, b| (&a.file, a.start_line).cmp(&(&b.file, b.start_line)));
        modifications
            .sort_by(|a, b| (&a.file, a.entity.start_line).cmp(&(&b.file, b.entity.start_line)));
        insertions
            .sort_by(|a, b| (&a.file, a.entity.start_line).cmp(&(&b.file, b.entity.start_line)));

        // Class 1: deletions, with empty-ancestor pruning.
        for deletion in &deletions {
            if delete_node(rpg, &deletion.node_id, &mut result.pruned_nodes)? {
                result.deleted += 1;
            }
        }

        // Class 2: modifications, with drift detection.
        let router = SemanticRouter::new(
            llm_for_run.as_deref(),
            self.embedder.as_deref(),
            deadline,
        );
        for modification in &modifications {
            let Some(node) = rpg.store().get_node(&modification.node_id)? else {
                // Never encoded; treat as an insertion below its file.
                insertions.push(Insertion {
                    file: modification.file.clone(),
                    language: modification.language,
                    entity: modification.entity.clone(),
                    entity_type: modification.entity_type,
                });
                continue;
            };
            let new_feature = extractor
                .extract(&modification.file, &modification.entity)
                .await?;
            let old_feature = node.feature().clone();

            let distance = match self.semantic_distance(&old_feature, &new_feature) {
                Ok(distance) => distance,
                Err(RpgError::DriftUnavailable(msg)) => {
                    tracing::warn!("{msg}; applying in-place update");
                    rpg.store_mut().update_node(
                        &modification.node_id,
                        &update_patch(&modification.entity, new_feature.clone()),
                    )?;
                    result.modified += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            if distance > config.drift_threshold {
                delete_node(rpg, &modification.node_id, &mut result.pruned_nodes)?;
                self.insert_entity(
                    rpg,
                    &router,
                    &Insertion {
                        file: modification.file.clone(),
                        language: modification.language,
                        entity: modification.entity.clone(),
                        entity_type: modification.entity_type,
                    },
                    new_feature,
                )
                .await?;
                result.rerouted += 1;
            } else {
                rpg.store_mut().update_node(
                    &modification.node_id,
                    &update_patch(&modification.entity, new_feature),
                )?;
                result.modified += 1;
            }
        }

        // Class 3: insertions, routed top-down. Modifications of entities
        // the graph never held were re-classed above, so sort again.
        insertions
            .sort_by(|a, b| (&a.file, a.entity.start_line).cmp(&(&b.file, b.entity.start_line)));
        for insertion in &insertions {
            let feature = extractor.extract(&insertion.file, &insertion.entity).await?;
            self.insert_entity(rpg, &router, insertion, feature).await?;
            result.inserted += 1;
        }

        // Recompute dependency edges for every touched file.
        if !touched.is_empty() {
            let analyses: Vec<FileAnalysis> = touched
                .iter()
                .map(|(file, language, source)| {
                    let parse = rpg_parser::parse(source, *language, file);
                    inject::analyze_file(file, source, *language, &parse)
                })
                .collect();
            for (file, _, _) in &touched {
                let node_id = file_node_id(file);
                for edge in rpg
                    .store()
                    .get_out_edges(&node_id, EdgeSelector::Dependency)?
                {
                    rpg.store_mut()
                        .remove_edge(edge.source(), edge.target(), edge.kind())?;
                }
            }
            inject::inject(rpg, &analyses, &self.injector)?;
        }

        self.cache.save()?;

        if let Some(output_path) = &config.output_path {
            let json = rpg_core::schema::to_json(&rpg.store().export_document()?)?;
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(output_path, json)?;
        }

        result.llm_calls = self.llm.as_ref().map_or(0, |l| l.calls()) - llm_calls_before;
        result.duration_ms = started.elapsed().as_millis();
        Ok(result)
    }

    /// Semantic distance between two features: embedding cosine when a
    /// backend is configured, keyword Jaccard otherwise.
    fn semantic_distance(&self, old: &SemanticFeature, new: &SemanticFeature) -> Result<f64> {
        if let Some(embedder) = &self.embedder {
            let vectors = embedder.embed(&[old.index_text(), new.index_text()])?;
            if let [a, b] = vectors.as_slice() {
                return Ok(1.0 - f64::from(cosine_similarity(a, b)));
            }
        }
        if old.keywords.is_empty() && new.keywords.is_empty() {
            return Err(RpgError::DriftUnavailable(
                "no embeddings and no keyword sets for drift computation".to_string(),
            ));
        }
        Ok(1.0 - keyword_jaccard(&old.keywords, &new.keywords))
    }

    /// Insert one entity node: ensure its file node exists, route the
    /// feature through the hierarchy, attach, and leave dependency edges to
    /// the file-scoped injection pass.
    async fn insert_entity(
        &self,
        rpg: &mut Rpg,
        router: &SemanticRouter<'_>,
        insertion: &Insertion,
        feature: SemanticFeature,
    ) -> Result<()> {
        let file_id = file_node_id(&insertion.file);
        if rpg.store().get_node(&file_id)?.is_none() {
            let file_name = insertion.file.rsplit('/').next().unwrap_or(&insertion.file);
            let file_feature = aggregate_file_features(
                std::slice::from_ref(&feature),
                file_name,
                &insertion.file,
            );
            rpg.add_low_level_node(LowLevelNodeArgs {
                id: file_id.clone(),
                feature: file_feature.clone(),
                metadata: StructuralMetadata::for_entity(
                    EntityType::File,
                    insertion.file.clone(),
                    file_name,
                    insertion.language,
                    1,
                    insertion.entity.end_line,
                ),
                source_code: None,
            })?;
            if let Some(parent) = router.route_from_roots(rpg, &file_feature).await? {
                rpg.add_functional_edge(&parent, &file_id)?;
            }
        }

        let node_id = entity_node_id(
            &insertion.file,
            insertion.entity_type,
            &insertion.entity.qualified_name(),
        );
        if rpg.store().get_node(&node_id)?.is_some() {
            // Idempotent re-application of the same diff.
            return Ok(());
        }
        rpg.add_low_level_node(LowLevelNodeArgs {
            id: node_id.clone(),
            feature: feature.clone(),
            metadata: StructuralMetadata::for_entity(
                insertion.entity_type,
                insertion.file.clone(),
                insertion.entity.qualified_name(),
                insertion.language,
                insertion.entity.start_line,
                insertion.entity.end_line,
            ),
            source_code: None,
        })?;

        let parent = router.route_from_roots(rpg, &feature).await?;
        match parent {
            Some(parent_id) => {
                rpg.add_functional_edge(&parent_id, &node_id)?;
            }
            None => {
                // No hierarchy to route through: the file is the parent.
                rpg.add_functional_edge(&file_id, &node_id)?;
            }
        }
        Ok(())
    }
}

struct ParsedEntity {
    entity: rpg_parser::CodeEntity,
    entity_type: EntityType,
}

fn parse_entities(
    content: Option<&str>,
    language: SourceLanguage,
    file: &str,
) -> Vec<ParsedEntity> {
    let Some(content) = content else {
        return Vec::new();
    };
    rpg_parser::parse(content, language, file)
        .entities
        .into_iter()
        .filter_map(|entity| {
            entity.kind.entity_type().map(|entity_type| ParsedEntity {
                entity,
                entity_type,
            })
        })
        .collect()
}

fn update_patch(entity: &rpg_parser::CodeEntity, feature: SemanticFeature) -> NodePatch {
    NodePatch {
        feature: Some(feature),
        metadata: Some(MetadataPatch {
            start_line: Some(entity.start_line),
            end_line: Some(entity.end_line),
            ..Default::default()
        }),
        source_code: None,
    }
}

/// Remove a node, cascading its edges, then walk up the functional parent
/// chain pruning high-level ancestors whose child count dropped to zero.
/// Idempotent: an absent node is skipped.
fn delete_node(rpg: &mut Rpg, node_id: &str, pruned: &mut usize) -> Result<bool> {
    if rpg.store().get_node(node_id)?.is_none() {
        return Ok(false);
    }
    let mut ancestor = rpg
        .store()
        .get_parent(node_id)?
        .map(|n| n.id().to_string());
    rpg.store_mut().remove_node(node_id)?;

    while let Some(current) = ancestor {
        let Some(node) = rpg.store().get_node(&current)? else {
            break;
        };
        if !node.is_high_level() || !rpg.store().get_children(&current)?.is_empty() {
            break;
        }
        ancestor = rpg
            .store()
            .get_parent(&current)?
            .map(|n| n.id().to_string());
        rpg.store_mut().remove_node(&current)?;
        *pruned += 1;
    }
    Ok(true)
}
