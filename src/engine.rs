//! Engine facade: wires configuration into the exploration collaborators.
//!
//! The `CuriosityEngine` owns the process-wide, read-only state — model
//! routers, embedder and embedding index — and runs one bounded exploration
//! per call. Sessions share nothing mutable, so the engine can serve
//! concurrent requests behind an `Arc` without locking on the hot path.

use std::sync::Arc;

use crate::config::Config;
use crate::dissonance::NliDetector;
use crate::error::{CurioResult, IndexError};
use crate::explore::{CancelToken, Explorer, ExploreParams, QuestionSource};
use crate::index::embed::{self, Embedder};
use crate::index::{EmbeddingIndex, builder};
use crate::novelty::NoveltyScorer;
use crate::prompt;
use crate::router::{Generate, ModelRouter};
use crate::session::{ExplorationSession, Trail};

/// Snippets retrieved as generation context each round.
const CONTEXT_K: usize = 6;

/// The curiosity engine: shared read-only state plus per-session orchestration.
pub struct CuriosityEngine {
    generator: ModelRouter,
    nli: NliDetector<ModelRouter>,
    embedder: Box<dyn Embedder>,
    index: Arc<EmbeddingIndex>,
    defaults: ExploreParams,
    generator_spec: String,
    nli_spec: String,
}

impl CuriosityEngine {
    /// Build an engine from validated configuration.
    ///
    /// The index payload is loaded here, once; a missing index file yields an
    /// empty index (every candidate scores maximum novelty) rather than an
    /// error, matching the offline-first CLI workflow. An index built with a
    /// different embedder than the configured one is rejected.
    pub fn new(config: &Config) -> CurioResult<Self> {
        config.validate()?;

        let generator = ModelRouter::from_spec(&config.models.generator)?;
        let nli_router = ModelRouter::from_spec(&config.models.nli)?;
        let embedder = embed::from_spec(&config.models.embedder)?;

        let index = if config.index.path.exists() {
            let payload = builder::load_payload(&config.index.path)?;
            if payload.embedder != embedder.id() {
                return Err(IndexError::Decode {
                    message: format!(
                        "index was built with embedder \"{}\" but \"{}\" is configured",
                        payload.embedder,
                        embedder.id()
                    ),
                }
                .into());
            }
            Arc::new(EmbeddingIndex::from_payload(payload)?)
        } else {
            tracing::warn!(
                path = %config.index.path.display(),
                "no embedding index found; every candidate will score maximum novelty"
            );
            Arc::new(EmbeddingIndex::empty())
        };

        Ok(Self {
            generator_spec: generator.describe(),
            nli_spec: nli_router.describe(),
            generator,
            nli: NliDetector::new(nli_router),
            embedder,
            index,
            defaults: config.params(),
        })
    }

    /// Exploration tunables from the loaded configuration.
    pub fn defaults(&self) -> ExploreParams {
        self.defaults.clone()
    }

    /// Run one bounded exploration session.
    pub fn explore(
        &self,
        topic: &str,
        params: ExploreParams,
        cancel: &CancelToken,
    ) -> ExplorationSession {
        let scorer = NoveltyScorer::new(self.embedder.as_ref(), &self.index);
        Explorer::new(self, scorer, &self.nli, params).run(topic, cancel)
    }

    /// Summary of the engine's shared state.
    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            generator: self.generator_spec.clone(),
            nli: self.nli_spec.clone(),
            embedder: self.embedder.id(),
            snippets: self.index.len(),
            index_dim: self.index.dim(),
        }
    }
}

impl QuestionSource for CuriosityEngine {
    /// Build the round prompt (seed topic, current focus, accepted trail,
    /// retrieved context) and parse the model's numbered reply.
    fn candidates(
        &self,
        seed: &str,
        trail: &Trail,
        n: usize,
    ) -> crate::error::RouterResult<Vec<String>> {
        let focus = trail
            .latest_focus()
            .map(|q| q.text.clone())
            .unwrap_or_else(|| seed.to_string());

        // Context retrieval is best-effort: a focus the embedder rejects just
        // means generation proceeds without snippets.
        let context_owned: Vec<String> = match self.embedder.embed(&focus) {
            Ok(vector) => self
                .index
                .context(&vector, CONTEXT_K)
                .into_iter()
                .map(|s| s.to_string())
                .collect(),
            Err(e) => {
                tracing::debug!(error = %e, "focus could not be embedded, no context");
                Vec::new()
            }
        };
        let context: Vec<&str> = context_owned.iter().map(|s| s.as_str()).collect();
        let trail_texts: Vec<&str> = trail.iter().map(|q| q.text.as_str()).collect();

        let prompt = prompt::generation_prompt(seed, &focus, &trail_texts, &context, n);
        let raw = self.generator.generate(&prompt, Some(prompt::SYSTEM_PROMPT))?;

        let mut questions = prompt::parse_question_list(&raw);
        questions.truncate(n);
        Ok(questions)
    }
}

impl std::fmt::Debug for CuriosityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CuriosityEngine")
            .field("generator", &self.generator_spec)
            .field("nli", &self.nli_spec)
            .field("embedder", &self.embedder.id())
            .field("snippets", &self.index.len())
            .finish()
    }
}

/// Summary information about the engine's shared state.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub generator: String,
    pub nli: String,
    pub embedder: String,
    pub snippets: usize,
    pub index_dim: usize,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "curio engine info")?;
        writeln!(f, "  generator: {}", self.generator)?;
        writeln!(f, "  nli:       {}", self.nli)?;
        writeln!(f, "  embedder:  {}", self.embedder)?;
        writeln!(f, "  snippets:  {}", self.snippets)?;
        writeln!(f, "  index dim: {}", self.index_dim)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;

    fn echo_config() -> Config {
        let mut config = Config::default();
        config.models.generator = "echo:test".into();
        config.models.nli = "echo:test".into();
        config.models.embedder = "hash:64".into();
        config.index.path = std::path::PathBuf::from("/nonexistent/index.bin");
        config
    }

    #[test]
    fn engine_builds_from_default_like_config() {
        let engine = CuriosityEngine::new(&echo_config()).unwrap();
        let info = engine.info();
        assert_eq!(info.generator, "echo");
        assert_eq!(info.embedder, "hash:64");
        assert_eq!(info.snippets, 0);
    }

    #[test]
    fn echo_backend_yields_candidates() {
        let engine = CuriosityEngine::new(&echo_config()).unwrap();
        // The echo backend returns the prompt; its lines parse as candidates.
        let candidates = engine.candidates("glaciers", &Trail::new(), 4).unwrap();
        assert!(!candidates.is_empty());
        assert!(candidates.len() <= 4);
    }

    #[test]
    fn full_echo_session_terminates() {
        let engine = CuriosityEngine::new(&echo_config()).unwrap();
        let params = engine.defaults();
        let session = engine.explore("glaciers", params, &CancelToken::new());
        assert!(session.status.is_terminal());
        assert!(session.round_count <= engine.defaults().max_rounds);
    }

    #[test]
    fn mismatched_index_embedder_rejected() {
        use crate::index::builder::{IndexPayload, save_payload};

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.bin");
        save_payload(
            &IndexPayload {
                embedder: "hash:32".into(),
                dim: 32,
                texts: vec!["a snippet long enough to keep".into()],
                vectors: vec![vec![0.5; 32]],
            },
            &path,
        )
        .unwrap();

        let mut config = echo_config();
        config.index.path = path;
        assert!(CuriosityEngine::new(&config).is_err());
    }
}
