//! The encoder: walk a repository, lift it into low-level nodes, reorganize,
//! ground, and inject dependencies.

use crate::cache::SemanticCache;
use crate::embed::Embedder;
use crate::extract::{ExtractItem, SemanticExtractor, aggregate_file_features};
use crate::ground;
use crate::inject::{self, FileAnalysis};
use crate::llm::LlmClient;
use crate::reorganize;
use rpg_core::config::{CACHE_DIR, EncoderConfig, InjectorConfig, WORKSPACE_DIR};
use rpg_core::error::{Result, RpgError};
use rpg_core::model::{
    EntityType, GraphConfig, SemanticFeature, SourceLanguage, StructuralMetadata,
};
use rpg_store::rpg::{LowLevelNodeArgs, Rpg};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a full encode.
pub struct EncodeResult {
    pub rpg: Rpg,
    pub files_processed: usize,
    pub entities_extracted: usize,
    pub duration: Duration,
}

/// One parsed file, ready for lifting.
struct ParsedFile {
    rel_path: String,
    language: SourceLanguage,
    line_count: usize,
    parse: rpg_parser::ParseResult,
    source: String,
}

/// Orchestrates the encoding phases over a repository path.
pub struct Encoder {
    root: PathBuf,
    config: EncoderConfig,
    injector: InjectorConfig,
    llm: Option<Arc<dyn LlmClient>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl Encoder {
    pub fn new(root: impl Into<PathBuf>, config: EncoderConfig) -> Self {
        Self {
            root: root.into(),
            config,
            injector: InjectorConfig::default(),
            llm: None,
            embedder: None,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_injector_config(mut self, injector: InjectorConfig) -> Self {
        self.injector = injector;
        self
    }

    /// Phase 0: discovery. Walks from the root, applies include/exclude
    /// globs and the depth cap. A non-existent root yields an empty list.
    pub fn discover(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let include = build_globset(&self.config.include)?;
        let exclude = build_globset(&self.config.exclude)?;

        let walker = ignore::WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .max_depth(Some(self.config.max_depth))
            .build();

        let mut files = Vec::new();
        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if SourceLanguage::from_path(&rel).is_none() {
                continue;
            }
            if let Some(include) = &include
                && !include.is_match(rel.as_str())
            {
                continue;
            }
            if let Some(exclude) = &exclude
                && exclude.is_match(rel.as_str())
            {
                continue;
            }
            files.push(rel);
        }
        files.sort();
        Ok(files)
    }

    /// Run the full pipeline: discovery, semantic lifting, structural
    /// reorganization, artifact grounding, dependency injection.
    pub async fn encode(&self) -> Result<EncodeResult> {
        let started = Instant::now();

        // Reorganization has no heuristic fallback, so the missing backend is
        // fatal before any work starts.
        let Some(llm) = self.llm.clone() else {
            return Err(RpgError::Config(
                "structural reorganization requires an LLM backend; configure a provider"
                    .to_string(),
            ));
        };

        let files = self.discover()?;
        tracing::info!(files = files.len(), "discovered source files");

        // Phase 1a: parse, in parallel (CPU-bound, no suspension).
        let parsed: Vec<ParsedFile> = files
            .par_iter()
            .filter_map(|rel| {
                let language = SourceLanguage::from_path(rel)?;
                let source = std::fs::read_to_string(self.root.join(rel)).ok()?;
                let parse = rpg_parser::parse(&source, language, rel);
                for err in &parse.errors {
                    tracing::warn!("parse: {err}");
                }
                Some(ParsedFile {
                    rel_path: rel.clone(),
                    language,
                    line_count: source.lines().count().max(1),
                    parse,
                    source,
                })
            })
            .collect();

        // Phase 1b: semantic lifting over every liftable entity.
        let cache = self.open_cache()?;
        let extractor = SemanticExtractor::new(
            self.llm.clone(),
            Arc::clone(&cache),
            self.config.semantic.clone(),
        );

        let mut items: Vec<ExtractItem> = Vec::new();
        for file in &parsed {
            for entity in &file.parse.entities {
                if entity.kind.entity_type().is_some() {
                    items.push(ExtractItem {
                        file_path: file.rel_path.clone(),
                        entity: entity.clone(),
                    });
                }
            }
        }
        let features = extractor.extract_batch(&items).await?;

        // Phase 1c: persist low-level nodes and file→entity edges. All of
        // Phase 1 lands in the store before reorganization runs.
        let mut rpg = Rpg::in_memory();
        let repo_name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repository".to_string());
        rpg.set_config(GraphConfig {
            name: repo_name,
            root_path: Some(self.root.to_string_lossy().to_string()),
            description: None,
        })?;

        let mut entities_extracted = 0usize;
        let mut feature_iter = items.iter().zip(features.iter());
        let mut analyses: Vec<FileAnalysis> = Vec::new();

        for file in &parsed {
            let mut entity_ids: Vec<String> = Vec::new();
            let mut direct_child_features: Vec<SemanticFeature> = Vec::new();

            for entity in &file.parse.entities {
                let Some(entity_type) = entity.kind.entity_type() else {
                    continue;
                };
                let (item, feature) = feature_iter
                    .next()
                    .ok_or_else(|| RpgError::Store("feature stream out of sync".to_string()))?;
                debug_assert_eq!(item.entity.name, entity.name);

                if entity.parent.is_none() {
                    direct_child_features.push(feature.clone());
                }

                let id = format!(
                    "{}:{}:{}",
                    file.rel_path,
                    entity_type.name(),
                    entity.qualified_name()
                );
                // Same-name redeclarations (overloads, multi-impl methods)
                // collapse onto the first occurrence.
                if rpg.store().get_node(&id)?.is_some() {
                    continue;
                }
                entity_ids.push(id.clone());

                let metadata = StructuralMetadata::for_entity(
                    entity_type,
                    file.rel_path.clone(),
                    entity.qualified_name(),
                    file.language,
                    entity.start_line,
                    entity.end_line,
                );
                rpg.add_low_level_node(LowLevelNodeArgs {
                    id,
                    feature: feature.clone(),
                    metadata,
                    source_code: self
                        .config
                        .include_source
                        .then(|| entity.source_text.clone()),
                })?;
                entities_extracted += 1;
            }

            let file_name = file.rel_path.rsplit('/').next().unwrap_or(&file.rel_path);
            let file_feature =
                aggregate_file_features(&direct_child_features, file_name, &file.rel_path);
            let file_id = format!("{}:file", file.rel_path);
            rpg.add_low_level_node(LowLevelNodeArgs {
                id: file_id.clone(),
                feature: file_feature,
                metadata: StructuralMetadata::for_entity(
                    EntityType::File,
                    file.rel_path.clone(),
                    file_name,
                    file.language,
                    1,
                    file.line_count,
                ),
                source_code: None,
            })?;
            for entity_id in &entity_ids {
                rpg.add_functional_edge(&file_id, entity_id)?;
            }

            analyses.push(inject::analyze_file(
                &file.rel_path,
                &file.source,
                file.language,
                &file.parse,
            ));
        }

        // Phase 2: structural reorganization.
        let deadline = Duration::from_secs(self.config.semantic.request_timeout_secs);
        reorganize::reorganize(&mut rpg, llm.as_ref(), deadline).await?;

        // Phase 3: artifact grounding.
        ground::ground(&mut rpg)?;

        // Phase 4: dependency injection.
        inject::inject(&mut rpg, &analyses, &self.injector)?;

        cache.save()?;

        Ok(EncodeResult {
            rpg,
            files_processed: parsed.len(),
            entities_extracted,
            duration: started.elapsed(),
        })
    }

    fn open_cache(&self) -> Result<Arc<SemanticCache>> {
        if !self.config.cache.enabled {
            return Ok(Arc::new(SemanticCache::disabled()));
        }
        let dir = self
            .config
            .cache
            .dir
            .clone()
            .unwrap_or_else(|| self.root.join(WORKSPACE_DIR).join(CACHE_DIR));
        if !self.root.exists() {
            return Ok(Arc::new(SemanticCache::ephemeral()));
        }
        Ok(Arc::new(SemanticCache::open(&dir)?))
    }

    pub fn embedder(&self) -> Option<&Arc<dyn Embedder>> {
        self.embedder.as_ref()
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<globset::GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        let glob = globset::Glob::new(pattern)
            .map_err(|e| RpgError::Config(format!("invalid glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| RpgError::Config(format!("glob set: {e}")))
}

/// Walk a path that may not exist yet; used by callers that want discovery
/// without constructing a full encoder.
pub fn discover_files(root: &Path, config: &EncoderConfig) -> Result<Vec<String>> {
    Encoder::new(root, config.clone()).discover()
}
