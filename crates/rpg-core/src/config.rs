//! Configuration for encoding, evolution, and dependency injection.
//!
//! Load order: `.rpg/config.toml` → environment variables → defaults.

use crate::error::{Result, RpgError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the repository root holding persisted engine state.
pub const WORKSPACE_DIR: &str = ".rpg";
/// The serialized graph artifact inside [`WORKSPACE_DIR`].
pub const GRAPH_FILE: &str = "graph.json";
/// The semantic feature cache directory inside [`WORKSPACE_DIR`].
pub const CACHE_DIR: &str = "cache";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RpgConfig {
    pub encoder: EncoderConfig,
    pub evolution: EvolutionConfig,
    pub injector: InjectorConfig,
}

/// Encoding pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Store entity source bodies on low-level nodes.
    pub include_source: bool,
    /// Include globs; empty means every supported source file.
    pub include: Vec<String>,
    /// Exclude globs applied after includes.
    pub exclude: Vec<String>,
    /// Maximum directory depth walked from the root.
    pub max_depth: usize,
    pub semantic: SemanticConfig,
    pub cache: CacheConfig,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            include_source: false,
            include: Vec::new(),
            exclude: Vec::new(),
            max_depth: 10,
            semantic: SemanticConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Semantic extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// Use the LLM backend for feature extraction; heuristic mode otherwise.
    pub use_llm: bool,
    /// Minimum token budget for a batch; a smaller final batch is merged into
    /// its predecessor when the merge stays within `max_batch_tokens`.
    pub min_batch_tokens: usize,
    /// Maximum token budget for a batch. A single entity exceeding it is
    /// placed alone.
    pub max_batch_tokens: usize,
    pub provider: ProviderKind,
    /// Maximum in-flight LLM/embedding calls.
    pub max_in_flight: usize,
    /// Deadline applied to every LLM call, in seconds.
    pub request_timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            use_llm: true,
            min_batch_tokens: 10_000,
            max_batch_tokens: 50_000,
            provider: ProviderKind::Anthropic,
            max_in_flight: 4,
            request_timeout_secs: 120,
            max_tokens: 4096,
        }
    }
}

/// LLM provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    OpenAiCompatible,
}

/// Semantic cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory; defaults to `.rpg/cache` under the repository root.
    pub dir: Option<PathBuf>,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            enabled: true,
        }
    }
}

/// Evolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Version-control range syntax, e.g. `HEAD~1..HEAD`.
    pub commit_range: String,
    /// Semantic drift above this threshold triggers delete + re-insert.
    pub drift_threshold: f64,
    pub use_llm: bool,
    /// Optional path the evolved graph artifact is written to.
    pub output_path: Option<PathBuf>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            commit_range: String::new(),
            drift_threshold: 0.3,
            use_llm: true,
            output_path: None,
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.drift_threshold) {
            return Err(RpgError::Config(format!(
                "drift_threshold must be in [0, 1], got {}",
                self.drift_threshold
            )));
        }
        Ok(())
    }
}

/// Dependency injection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
    /// Method names too common to resolve by repository-wide unqualified
    /// match. Exposed as configuration; the default set covers the usual
    /// accessor and lifecycle names.
    pub common_names: Vec<String>,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            common_names: [
                "get", "set", "init", "new", "run", "main", "create", "update", "delete", "read",
                "write", "parse", "build", "handle", "process",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl RpgConfig {
    /// Load config from `.rpg/config.toml` in the repository root, with env
    /// var overrides. Falls back to defaults if no config file exists.
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(WORKSPACE_DIR).join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| RpgError::Config(e.to_string()))?
        } else {
            Self::default()
        };

        env_override("RPG_MAX_DEPTH", &mut config.encoder.max_depth);
        env_override(
            "RPG_MIN_BATCH_TOKENS",
            &mut config.encoder.semantic.min_batch_tokens,
        );
        env_override(
            "RPG_MAX_BATCH_TOKENS",
            &mut config.encoder.semantic.max_batch_tokens,
        );
        env_override(
            "RPG_DRIFT_THRESHOLD",
            &mut config.evolution.drift_threshold,
        );

        if config.encoder.max_depth < 1 {
            return Err(RpgError::Config("max_depth must be at least 1".to_string()));
        }
        config.evolution.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = RpgConfig::default();
        assert_eq!(config.encoder.max_depth, 10);
        assert_eq!(config.encoder.semantic.min_batch_tokens, 10_000);
        assert_eq!(config.encoder.semantic.max_batch_tokens, 50_000);
        assert_eq!(config.evolution.drift_threshold, 0.3);
        assert!(config.injector.common_names.contains(&"get".to_string()));
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
[encoder]
max_depth = 4

[encoder.semantic]
min_batch_tokens = 5000
max_batch_tokens = 20000

[evolution]
drift_threshold = 0.5
"#;
        let config: RpgConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.encoder.max_depth, 4);
        assert_eq!(config.encoder.semantic.min_batch_tokens, 5000);
        assert_eq!(config.evolution.drift_threshold, 0.5);
        // Defaults for unspecified fields
        assert!(config.evolution.use_llm);
        assert!(config.encoder.cache.enabled);
    }

    #[test]
    fn load_nonexistent_root_uses_defaults() {
        let config = RpgConfig::load(Path::new("/nonexistent/path")).unwrap();
        assert_eq!(config.encoder.max_depth, 10);
    }

    #[test]
    fn invalid_threshold_rejected() {
        let config = EvolutionConfig {
            drift_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
