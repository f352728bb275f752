//! Novelty scoring: how far a candidate question sits from everything known.
//!
//! The score is `1 - clamp(top1_similarity, 0, 1)` where the top-1 similarity
//! is taken over the shared read-only index *and* a session-local overlay of
//! already accepted questions. The overlay is what makes repeats of earlier
//! trail entries stop scoring as novel; the shared index is never mutated.
//! An empty corpus can never veto a question: with nothing to compare against
//! the score is 1.0.

use crate::error::IndexResult;
use crate::index::EmbeddingIndex;
use crate::index::embed::Embedder;

/// Per-session novelty scorer.
///
/// Holds read-only references to the shared embedder and index plus the
/// session's own overlay of accepted-question embeddings.
pub struct NoveltyScorer<'a> {
    embedder: &'a dyn Embedder,
    index: &'a EmbeddingIndex,
    overlay: Vec<Vec<f32>>,
}

impl<'a> NoveltyScorer<'a> {
    pub fn new(embedder: &'a dyn Embedder, index: &'a EmbeddingIndex) -> Self {
        Self {
            embedder,
            index,
            overlay: Vec::new(),
        }
    }

    /// Score a candidate, returning its novelty and its embedding.
    ///
    /// The embedding is handed back so the caller can commit accepted
    /// candidates to the overlay without re-embedding them. Fails only on
    /// embedding/search errors; the caller treats a failed candidate as
    /// rejected rather than aborting the session.
    pub fn score(&self, text: &str) -> IndexResult<(f32, Vec<f32>)> {
        let embedding = self.embedder.embed(text)?;

        let mut best_sim = f32::NEG_INFINITY;
        if let Some(hit) = self.index.search(&embedding, 1)?.first() {
            best_sim = hit.similarity;
        }
        for accepted in &self.overlay {
            let sim = cosine(&embedding, accepted);
            if sim > best_sim {
                best_sim = sim;
            }
        }

        // Nothing to compare against: maximally novel.
        if best_sim == f32::NEG_INFINITY {
            return Ok((1.0, embedding));
        }

        let novelty = 1.0 - best_sim.clamp(0.0, 1.0);
        Ok((novelty, embedding))
    }

    /// Fold a round's accepted embeddings into the overlay.
    ///
    /// Called once per round after the whole batch is scored, so candidates
    /// within one batch never veto each other.
    pub fn commit(&mut self, embeddings: Vec<Vec<f32>>) {
        self.overlay.extend(embeddings);
    }

    /// Number of accepted embeddings tracked so far.
    pub fn overlay_len(&self) -> usize {
        self.overlay.len()
    }
}

/// Cosine similarity between two vectors. Mismatched or zero-norm inputs
/// score 0 (unrelated) rather than failing.
pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::IndexPayload;
    use crate::index::embed::HashEmbedder;

    #[test]
    fn empty_index_scores_maximum_novelty() {
        let embedder = HashEmbedder::new(64);
        let index = EmbeddingIndex::empty();
        let scorer = NoveltyScorer::new(&embedder, &index);

        let (novelty, _) = scorer.score("Why does ice float on water?").unwrap();
        assert_eq!(novelty, 1.0);
    }

    #[test]
    fn known_snippet_scores_near_zero() {
        let embedder = HashEmbedder::new(64);
        let text = "Glaciers store most of the planet's fresh water.";
        let payload = IndexPayload {
            embedder: embedder.id(),
            dim: 64,
            texts: vec![text.to_string()],
            vectors: vec![embedder.embed(text).unwrap()],
        };
        let index = EmbeddingIndex::from_payload(payload).unwrap();
        let scorer = NoveltyScorer::new(&embedder, &index);

        let (novelty, _) = scorer.score(text).unwrap();
        assert!(novelty < 0.01, "novelty was {novelty}");
    }

    #[test]
    fn overlay_vetoes_repeats_of_accepted_questions() {
        let embedder = HashEmbedder::new(64);
        let index = EmbeddingIndex::empty();
        let mut scorer = NoveltyScorer::new(&embedder, &index);

        let question = "Why do glaciers calve into the sea?";
        let (novelty, embedding) = scorer.score(question).unwrap();
        assert_eq!(novelty, 1.0);

        scorer.commit(vec![embedding]);
        let (repeat_novelty, _) = scorer.score(question).unwrap();
        assert!(repeat_novelty < 0.01, "novelty was {repeat_novelty}");
    }

    #[test]
    fn embedding_failure_propagates() {
        let embedder = HashEmbedder::new(64);
        let index = EmbeddingIndex::empty();
        let scorer = NoveltyScorer::new(&embedder, &index);
        assert!(scorer.score("???").is_err());
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
