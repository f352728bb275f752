//! Process configuration, loaded once at startup from TOML.
//!
//! Invalid tunables fail fast here, before any session runs. A missing config
//! file falls back to defaults so `curio ask` works out of the box with the
//! offline hash embedder and the echo backend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::explore::ExploreParams;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub index: IndexSection,
    #[serde(default)]
    pub server: ServerSection,
}

/// Model identifiers, all `provider:model` specs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Question generator.
    #[serde(default = "default_generator")]
    pub generator: String,
    /// NLI classifier for contradiction detection.
    #[serde(default = "default_nli")]
    pub nli: String,
    /// Embedder; must match the one the index was built with.
    #[serde(default = "default_embedder")]
    pub embedder: String,
}

/// The five exploration tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Minimum novelty for a candidate to enter the trail.
    #[serde(default = "default_novelty_threshold")]
    pub novelty_threshold: f32,
    /// Hard ceiling on rounds per session.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Candidates requested per round.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Wall-clock budget per session.
    #[serde(default = "default_time_limit_seconds")]
    pub time_limit_seconds: f64,
    /// Minimum confidence for a non-neutral pair to be recorded.
    #[serde(default = "default_contradiction_threshold")]
    pub contradiction_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSection {
    /// Path to the bincode index payload built by `curio build-index`.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bounded concurrency gate in front of the model backends.
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,
}

fn default_generator() -> String {
    "ollama:llama3.2".into()
}

fn default_nli() -> String {
    "ollama:llama3.2".into()
}

fn default_embedder() -> String {
    "hash:256".into()
}

fn default_novelty_threshold() -> f32 {
    0.35
}

fn default_max_rounds() -> u32 {
    3
}

fn default_batch_size() -> usize {
    6
}

fn default_time_limit_seconds() -> f64 {
    25.0
}

fn default_contradiction_threshold() -> f32 {
    0.65
}

fn default_index_path() -> PathBuf {
    PathBuf::from(".curio/index.bin")
}

fn default_bind() -> String {
    "127.0.0.1:8000".into()
}

fn default_max_concurrent_sessions() -> usize {
    4
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            generator: default_generator(),
            nli: default_nli(),
            embedder: default_embedder(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            novelty_threshold: default_novelty_threshold(),
            max_rounds: default_max_rounds(),
            batch_size: default_batch_size(),
            time_limit_seconds: default_time_limit_seconds(),
            contradiction_threshold: default_contradiction_threshold(),
        }
    }
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_concurrent_sessions: default_max_concurrent_sessions(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models: ModelsConfig::default(),
            engine: EngineSection::default(),
            index: IndexSection::default(),
            server: ServerSection::default(),
        }
    }
}

impl Config {
    /// Load and validate configuration. A missing file yields defaults;
    /// anything else invalid is fatal.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Fail-fast validation of every tunable.
    pub fn validate(&self) -> ConfigResult<()> {
        // Checked before params(): a non-finite value would panic inside
        // Duration::from_secs_f64.
        let secs = self.engine.time_limit_seconds;
        if !secs.is_finite() || secs < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.time_limit_seconds".into(),
                message: format!("must be a finite value >= 0, got {secs}"),
            });
        }

        self.params().validate()?;

        if self.models.generator.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "models.generator".into(),
                message: "must be a non-empty `provider:model` spec".into(),
            });
        }
        if self.models.nli.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "models.nli".into(),
                message: "must be a non-empty `provider:model` spec".into(),
            });
        }
        if self.models.embedder.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "models.embedder".into(),
                message: "must be a non-empty embedder spec".into(),
            });
        }
        if self.server.max_concurrent_sessions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_concurrent_sessions".into(),
                message: "must be >= 1".into(),
            });
        }

        Ok(())
    }

    /// Exploration parameters derived from the `[engine]` section.
    pub fn params(&self) -> ExploreParams {
        ExploreParams {
            novelty_threshold: self.engine.novelty_threshold,
            max_rounds: self.engine.max_rounds,
            batch_size: self.engine.batch_size,
            time_limit: Duration::from_secs_f64(self.engine.time_limit_seconds),
            contradiction_threshold: self.engine.contradiction_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            max_rounds = 5

            [models]
            generator = "echo:test"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.max_rounds, 5);
        assert_eq!(config.engine.batch_size, 6);
        assert_eq!(config.models.generator, "echo:test");
        assert_eq!(config.models.embedder, "hash:256");
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let mut config = Config::default();
        config.engine.novelty_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_rounds_rejected() {
        let mut config = Config::default();
        config.engine.max_rounds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_model_spec_rejected() {
        let mut config = Config::default();
        config.models.nli = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.engine.max_rounds, 3);
    }

    #[test]
    fn load_rejects_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("curio.toml");
        std::fs::write(&path, "[engine]\nnovelty_threshold = -0.1\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn negative_time_limit_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("curio.toml");
        std::fs::write(&path, "[engine]\ntime_limit_seconds = -5.0\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. }
            if field == "engine.time_limit_seconds"));
    }

    #[test]
    fn non_finite_time_limit_rejected_without_panic() {
        for raw in ["inf", "nan"] {
            let dir = tempfile::TempDir::new().unwrap();
            let path = dir.path().join("curio.toml");
            std::fs::write(&path, format!("[engine]\ntime_limit_seconds = {raw}\n")).unwrap();
            assert!(Config::load(&path).is_err(), "{raw} passed validation");
        }
    }
}
