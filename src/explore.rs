//! The bounded exploration loop.
//!
//! One call to [`Explorer::run`] drives a whole session:
//! INIT → GENERATING → SCORING → CONTRADICTION_CHECK → TERMINATION_CHECK,
//! repeated until a termination condition fires. Rounds are strictly
//! sequential because each round's generation prompt depends on the trail the
//! previous rounds accepted; only the pairwise contradiction checks inside a
//! round fan out in parallel.
//!
//! Termination precedence is fixed regardless of which condition became true
//! first in real time: round ceiling, then wall-clock budget, then novelty
//! exhaustion. Cancellation is honored only at round boundaries so the trail
//! never contains a partially scored round.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rayon::prelude::*;

use crate::dissonance::RelationClassifier;
use crate::error::{ConfigError, ConfigResult, RouterResult};
use crate::novelty::NoveltyScorer;
use crate::session::{
    DissonanceRecord, ExplorationSession, Question, Relation, SessionStatus, Trail,
};

/// Capability interface for producing candidate questions.
///
/// Implemented by the engine (prompt + router + retrieval context) and by
/// deterministic sources in tests.
pub trait QuestionSource: Send + Sync {
    /// Request up to `n` candidates for `seed`, informed by the accepted
    /// trail so far. An empty batch or an error is round-terminal.
    fn candidates(&self, seed: &str, trail: &Trail, n: usize) -> RouterResult<Vec<String>>;
}

/// The five exploration tunables, resolved from config plus any per-request
/// overrides.
#[derive(Debug, Clone)]
pub struct ExploreParams {
    /// Minimum novelty for acceptance into the trail.
    pub novelty_threshold: f32,
    /// Hard ceiling on executed rounds; never exceeded.
    pub max_rounds: u32,
    /// Candidates requested per round.
    pub batch_size: usize,
    /// Wall-clock budget for the whole session.
    pub time_limit: Duration,
    /// Minimum confidence for a non-neutral pair to be recorded.
    pub contradiction_threshold: f32,
}

/// Optional per-request overrides; unset fields fall back to config.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ParamOverrides {
    pub max_rounds: Option<u32>,
    pub novelty_threshold: Option<f32>,
    pub batch_size: Option<usize>,
    pub time_limit_seconds: Option<f64>,
    pub contradiction_threshold: Option<f32>,
}

impl ExploreParams {
    /// Apply overrides, then re-validate so a bad override is rejected before
    /// the session starts.
    pub fn with_overrides(mut self, overrides: &ParamOverrides) -> ConfigResult<Self> {
        if let Some(max_rounds) = overrides.max_rounds {
            self.max_rounds = max_rounds;
        }
        if let Some(novelty_threshold) = overrides.novelty_threshold {
            self.novelty_threshold = novelty_threshold;
        }
        if let Some(batch_size) = overrides.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(secs) = overrides.time_limit_seconds {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "time_limit_seconds".into(),
                    message: format!("must be a finite value >= 0, got {secs}"),
                });
            }
            self.time_limit = Duration::from_secs_f64(secs);
        }
        if let Some(contradiction_threshold) = overrides.contradiction_threshold {
            self.contradiction_threshold = contradiction_threshold;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate all tunables; called at config load and after overrides.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.novelty_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "novelty_threshold".into(),
                message: format!("must be in [0,1], got {}", self.novelty_threshold),
            });
        }
        if !(0.0..=1.0).contains(&self.contradiction_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "contradiction_threshold".into(),
                message: format!("must be in [0,1], got {}", self.contradiction_threshold),
            });
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_rounds".into(),
                message: "must be >= 1".into(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size".into(),
                message: "must be >= 1".into(),
            });
        }
        Ok(())
    }
}

/// Shared cancellation flag, checked at round boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One bounded exploration run over borrowed collaborators.
pub struct Explorer<'a> {
    source: &'a dyn QuestionSource,
    scorer: NoveltyScorer<'a>,
    classifier: &'a dyn RelationClassifier,
    params: ExploreParams,
}

impl<'a> Explorer<'a> {
    pub fn new(
        source: &'a dyn QuestionSource,
        scorer: NoveltyScorer<'a>,
        classifier: &'a dyn RelationClassifier,
        params: ExploreParams,
    ) -> Self {
        Self {
            source,
            scorer,
            classifier,
            params,
        }
    }

    /// Run the loop to completion and return the finished session.
    ///
    /// This never fails: candidate- and pair-local errors are absorbed, and a
    /// round-terminal generation failure ends the session with the trail
    /// gathered so far.
    pub fn run(mut self, seed: &str, cancel: &CancelToken) -> ExplorationSession {
        let mut session = ExplorationSession::new(seed);

        loop {
            if cancel.is_cancelled() {
                session.status = SessionStatus::Cancelled;
                break;
            }

            let round = session.round_count;

            // ── GENERATING ──────────────────────────────────────────────
            let batch = match self.source.candidates(seed, &session.trail, self.params.batch_size)
            {
                Ok(batch) if !batch.is_empty() => batch,
                Ok(_) => {
                    tracing::warn!(round, "generator returned an empty batch");
                    session.status = SessionStatus::CompletedExhausted;
                    break;
                }
                Err(e) => {
                    tracing::warn!(round, error = %e, "generation failed");
                    session.status = SessionStatus::CompletedExhausted;
                    break;
                }
            };

            // ── SCORING ─────────────────────────────────────────────────
            let mut fresh: Vec<(Question, Vec<f32>)> = Vec::new();
            for text in batch.into_iter().take(self.params.batch_size) {
                let (novelty, embedding) = match self.scorer.score(&text) {
                    Ok(scored) => scored,
                    Err(e) => {
                        // Candidate-local: treated as novelty 0, rejected.
                        tracing::debug!(round, error = %e, candidate = %text, "embedding failed, candidate rejected");
                        continue;
                    }
                };
                if novelty >= self.params.novelty_threshold {
                    fresh.push((
                        Question {
                            text,
                            round,
                            novelty_score: novelty,
                            accepted: true,
                        },
                        embedding,
                    ));
                } else {
                    tracing::debug!(round, novelty, candidate = %text, "below novelty threshold");
                }
            }
            let accepted_this_round = fresh.len();

            // ── CONTRADICTION_CHECK ─────────────────────────────────────
            // New questions against history only, never against batch peers.
            // Pairs are independent: fan out, fan in, append in order.
            let history_len = session.trail.len();
            let verdicts = self.check_pairs(&fresh, &session.trail);

            let mut embeddings = Vec::with_capacity(fresh.len());
            for (question, embedding) in fresh {
                session.trail.push(question);
                embeddings.push(embedding);
            }
            self.scorer.commit(embeddings);

            for (fresh_idx, hist_idx, relation, confidence) in verdicts {
                if relation != Relation::Neutral
                    && confidence >= self.params.contradiction_threshold
                {
                    session.dissonance_log.push(DissonanceRecord {
                        question_a_index: history_len + fresh_idx,
                        question_b_index: hist_idx,
                        relation,
                        confidence,
                    });
                }
            }

            // ── TERMINATION_CHECK ───────────────────────────────────────
            session.round_count += 1;
            tracing::info!(
                round,
                accepted = accepted_this_round,
                trail = session.trail.len(),
                dissonance = session.dissonance_log.len(),
                "round complete"
            );

            if session.round_count >= self.params.max_rounds {
                session.status = SessionStatus::CompletedMaxRounds;
                break;
            }
            if session.start_time.elapsed() > self.params.time_limit {
                session.status = SessionStatus::CompletedTimeout;
                break;
            }
            if accepted_this_round == 0 {
                session.status = SessionStatus::CompletedThreshold;
                break;
            }
        }

        tracing::info!(
            status = ?session.status,
            rounds = session.round_count,
            trail = session.trail.len(),
            "exploration finished"
        );
        session
    }

    /// Classify every (new question, history question) pair in parallel.
    ///
    /// Returns verdicts in deterministic (new, history) order; pairs whose
    /// classification failed are dropped (treated as neutral).
    fn check_pairs(
        &self,
        fresh: &[(Question, Vec<f32>)],
        trail: &Trail,
    ) -> Vec<(usize, usize, Relation, f32)> {
        let history: Vec<&Question> = trail.iter().collect();
        let mut pairs = Vec::with_capacity(fresh.len() * history.len());
        for fresh_idx in 0..fresh.len() {
            for hist_idx in 0..history.len() {
                pairs.push((fresh_idx, hist_idx));
            }
        }

        pairs
            .par_iter()
            .map(|&(fresh_idx, hist_idx)| {
                let a = &fresh[fresh_idx].0.text;
                let b = &history[hist_idx].text;
                match self.classifier.classify(a, b) {
                    Ok((relation, confidence)) => Some((fresh_idx, hist_idx, relation, confidence)),
                    Err(e) => {
                        // Pair-local: skipped, logged, exploration continues.
                        tracing::warn!(error = %e, "classification failed, pair skipped");
                        None
                    }
                }
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ExploreParams {
        ExploreParams {
            novelty_threshold: 0.35,
            max_rounds: 3,
            batch_size: 6,
            time_limit: Duration::from_secs(25),
            contradiction_threshold: 0.65,
        }
    }

    #[test]
    fn overrides_apply_and_validate() {
        let overridden = params()
            .with_overrides(&ParamOverrides {
                max_rounds: Some(7),
                time_limit_seconds: Some(2.5),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(overridden.max_rounds, 7);
        assert_eq!(overridden.time_limit, Duration::from_secs_f64(2.5));
        assert_eq!(overridden.batch_size, 6);
    }

    #[test]
    fn invalid_override_rejected() {
        let result = params().with_overrides(&ParamOverrides {
            novelty_threshold: Some(2.0),
            ..Default::default()
        });
        assert!(result.is_err());

        let result = params().with_overrides(&ParamOverrides {
            time_limit_seconds: Some(-1.0),
            ..Default::default()
        });
        assert!(result.is_err());

        let result = params().with_overrides(&ParamOverrides {
            max_rounds: Some(0),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn cancel_token_flips_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        let clone = token.clone();
        assert!(clone.is_cancelled());
    }
}
