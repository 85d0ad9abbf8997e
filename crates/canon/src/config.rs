use crate::error::{CanonError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "CONCORD_CONFIG";

const SUPPORTED_SCHEMA: u32 = 1;

/// Relative weights of the ensemble scorers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleWeights {
    pub context: f32,
    pub embedding: f32,
    pub path: f32,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            context: 0.5,
            embedding: 0.35,
            path: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisambiguationConfig {
    /// Per-adapter deadline for one lookup
    pub adapter_timeout: Duration,
    /// Top-two score gap below which the reasoning model is consulted
    pub margin_threshold: f32,
    /// Candidate definitions shown to the reasoning model
    pub reasoning_top_n: usize,
    pub weights: EnsembleWeights,
}

impl Default for DisambiguationConfig {
    fn default() -> Self {
        Self {
            adapter_timeout: Duration::from_millis(2000),
            margin_threshold: 0.10,
            reasoning_top_n: 3,
            weights: EnsembleWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    /// Snapshot file; `None` keeps the registry in memory only
    pub path: Option<PathBuf>,
    pub flush_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: None,
            flush_interval: Duration::from_millis(500),
        }
    }
}

/// Optional on-disk dumps replacing the embedded seeds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LexiconPaths {
    pub lexical: Option<PathBuf>,
    pub concept_network: Option<PathBuf>,
    pub knowledge_graph: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingConfig {
    /// Shortest shared prefix accepted by the morphological check
    pub min_prefix: usize,
    /// Fractional widening of approximate numeric values
    pub approximate_tolerance: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_prefix: 5,
            approximate_tolerance: 0.10,
        }
    }
}

/// Validated Concord configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConcordConfig {
    pub disambiguation: DisambiguationConfig,
    pub registry: RegistryConfig,
    pub lexicon: LexiconPaths,
    pub matching: MatchingConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    schema_version: Option<u32>,
    #[serde(default)]
    disambiguation: Option<RawDisambiguation>,
    #[serde(default)]
    registry: Option<RawRegistry>,
    #[serde(default)]
    lexicon: Option<RawLexicon>,
    #[serde(default)]
    matching: Option<RawMatching>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDisambiguation {
    adapter_timeout_ms: Option<u64>,
    margin_threshold: Option<f32>,
    reasoning_top_n: Option<usize>,
    weights: Option<RawWeights>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWeights {
    context: Option<f32>,
    embedding: Option<f32>,
    path: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRegistry {
    path: Option<PathBuf>,
    flush_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLexicon {
    lexical: Option<PathBuf>,
    concept_network: Option<PathBuf>,
    knowledge_graph: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMatching {
    min_prefix: Option<usize>,
    approximate_tolerance: Option<f64>,
}

impl ConcordConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let raw: RawConfig =
            toml::from_str(raw).map_err(|err| CanonError::Config(err.to_string()))?;
        Self::from_raw(raw)
    }

    /// Reads and validates the file at `path`. Relative lexicon and registry
    /// paths are resolved against the file's directory.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
            CanonError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Explicit path first, then `CONCORD_CONFIG`.
    #[must_use]
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit.map(Path::to_path_buf).or_else(|| {
            std::env::var_os(CONFIG_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
    }

    /// Loads the located file, or defaults when none is configured.
    pub async fn discover(explicit: Option<&Path>) -> Result<Self> {
        match Self::locate(explicit) {
            Some(path) => Self::load(path).await,
            None => Ok(Self::default()),
        }
    }

    fn rebase(&mut self, base: &Path) {
        let fix = |p: &mut Option<PathBuf>| {
            if let Some(path) = p.as_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        };
        fix(&mut self.registry.path);
        fix(&mut self.lexicon.lexical);
        fix(&mut self.lexicon.concept_network);
        fix(&mut self.lexicon.knowledge_graph);
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        if let Some(version) = raw.schema_version {
            if version != SUPPORTED_SCHEMA {
                return Err(CanonError::Config(format!(
                    "schema_version {version} is not supported (expected {SUPPORTED_SCHEMA})"
                )));
            }
        }

        let mut cfg = Self::default();

        if let Some(d) = raw.disambiguation {
            if let Some(ms) = d.adapter_timeout_ms {
                cfg.disambiguation.adapter_timeout = Duration::from_millis(ms);
            }
            if let Some(margin) = d.margin_threshold {
                cfg.disambiguation.margin_threshold = margin;
            }
            if let Some(top_n) = d.reasoning_top_n {
                cfg.disambiguation.reasoning_top_n = top_n;
            }
            if let Some(w) = d.weights {
                let defaults = cfg.disambiguation.weights;
                cfg.disambiguation.weights = EnsembleWeights {
                    context: w.context.unwrap_or(defaults.context),
                    embedding: w.embedding.unwrap_or(defaults.embedding),
                    path: w.path.unwrap_or(defaults.path),
                };
            }
        }

        if let Some(r) = raw.registry {
            cfg.registry.path = r.path;
            if let Some(ms) = r.flush_interval_ms {
                cfg.registry.flush_interval = Duration::from_millis(ms);
            }
        }

        if let Some(l) = raw.lexicon {
            cfg.lexicon = LexiconPaths {
                lexical: l.lexical,
                concept_network: l.concept_network,
                knowledge_graph: l.knowledge_graph,
            };
        }

        if let Some(m) = raw.matching {
            if let Some(min_prefix) = m.min_prefix {
                cfg.matching.min_prefix = min_prefix;
            }
            if let Some(tolerance) = m.approximate_tolerance {
                cfg.matching.approximate_tolerance = tolerance;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.disambiguation;
        if d.adapter_timeout.is_zero() {
            return Err(CanonError::Config(
                "disambiguation.adapter_timeout_ms must be positive".to_string(),
            ));
        }
        validate_unit("disambiguation.margin_threshold", f64::from(d.margin_threshold))?;
        if d.reasoning_top_n == 0 {
            return Err(CanonError::Config(
                "disambiguation.reasoning_top_n must be at least 1".to_string(),
            ));
        }
        let w = d.weights;
        for (name, value) in [
            ("context", w.context),
            ("embedding", w.embedding),
            ("path", w.path),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CanonError::Config(format!(
                    "disambiguation.weights.{name} must be a non-negative number"
                )));
            }
        }
        if w.context + w.embedding + w.path <= 0.0 {
            return Err(CanonError::Config(
                "disambiguation.weights must not all be zero".to_string(),
            ));
        }
        if self.registry.flush_interval.is_zero() {
            return Err(CanonError::Config(
                "registry.flush_interval_ms must be positive".to_string(),
            ));
        }
        if self.matching.min_prefix == 0 {
            return Err(CanonError::Config(
                "matching.min_prefix must be at least 1".to_string(),
            ));
        }
        validate_unit(
            "matching.approximate_tolerance",
            self.matching.approximate_tolerance,
        )?;
        Ok(())
    }
}

fn validate_unit(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CanonError::Config(format!("{name} must be within [0, 1]")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = ConcordConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, ConcordConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = ConcordConfig::from_toml_str(
            r#"
            schema_version = 1
            [disambiguation]
            adapter_timeout_ms = 750
            [disambiguation.weights]
            path = 0.0
            [matching]
            approximate_tolerance = 0.2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.disambiguation.adapter_timeout, Duration::from_millis(750));
        assert_eq!(cfg.disambiguation.weights.context, 0.5);
        assert_eq!(cfg.disambiguation.weights.path, 0.0);
        assert_eq!(cfg.matching.min_prefix, 5);
        assert!((cfg.matching.approximate_tolerance - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_bad_values() {
        for doc in [
            "schema_version = 2",
            "[disambiguation]\nadapter_timeout_ms = 0",
            "[disambiguation]\nmargin_threshold = 1.5",
            "[disambiguation.weights]\ncontext = -1.0",
            "[disambiguation.weights]\ncontext = 0.0\nembedding = 0.0\npath = 0.0",
            "[matching]\nmin_prefix = 0",
            "[unknown]\nkey = 1",
        ] {
            let err = ConcordConfig::from_toml_str(doc).unwrap_err();
            assert!(matches!(err, CanonError::Config(_)), "{doc}: {err}");
        }
    }

    #[tokio::test]
    async fn relative_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("concord.toml");
        tokio::fs::write(
            &file,
            "[registry]\npath = \"state/registry.json\"\n[lexicon]\nlexical = \"/abs/lexicon.json\"\n",
        )
        .await
        .unwrap();

        let cfg = ConcordConfig::load(&file).await.unwrap();
        assert_eq!(
            cfg.registry.path,
            Some(dir.path().join("state/registry.json"))
        );
        assert_eq!(cfg.lexicon.lexical, Some(PathBuf::from("/abs/lexicon.json")));
    }

    #[test]
    fn explicit_path_wins_over_environment() {
        let explicit = PathBuf::from("/tmp/explicit.toml");
        assert_eq!(
            ConcordConfig::locate(Some(&explicit)),
            Some(explicit.clone())
        );
    }
}
