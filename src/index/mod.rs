//! Embedding index: read-only ANN search over a snippet corpus.
//!
//! The index is built offline by `curio build-index` ([`builder`]), persisted
//! as a bincode payload (texts + vectors + embedder id), and loaded once at
//! startup. During exploration it is strictly read-only, so concurrent
//! sessions can query it without coordination.

pub mod builder;
pub mod embed;

use std::sync::RwLock;

use anndists::dist::DistCosine;
use hnsw_rs::hnsw::Hnsw;

use crate::error::{IndexError, IndexResult};

use builder::IndexPayload;

/// One nearest-neighbor hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Position of the snippet in the corpus.
    pub snippet_id: usize,
    /// Cosine similarity in [-1,1] (typically [0,1] for normalized vectors).
    pub similarity: f32,
}

/// Read-only snippet corpus with an HNSW cosine index over its embeddings.
pub struct EmbeddingIndex {
    snippets: Vec<String>,
    dim: usize,
    embedder_id: String,
    hnsw: RwLock<Hnsw<'static, f32, DistCosine>>,
}

// Safety: Hnsw uses internal synchronization via atomics/locks.
// The RwLock wrapper provides the outer synchronization needed.
unsafe impl Send for EmbeddingIndex {}
unsafe impl Sync for EmbeddingIndex {}

impl EmbeddingIndex {
    /// An index with no snippets. Searches return nothing, so every candidate
    /// scores maximum novelty.
    pub fn empty() -> Self {
        Self {
            snippets: Vec::new(),
            dim: 0,
            embedder_id: String::new(),
            hnsw: RwLock::new(new_hnsw(16)),
        }
    }

    /// Build the in-memory index from a persisted payload.
    pub fn from_payload(payload: IndexPayload) -> IndexResult<Self> {
        let IndexPayload {
            embedder,
            dim,
            texts,
            vectors,
        } = payload;

        if texts.len() != vectors.len() {
            return Err(IndexError::Decode {
                message: format!(
                    "payload has {} texts but {} vectors",
                    texts.len(),
                    vectors.len()
                ),
            });
        }

        let hnsw = new_hnsw(texts.len().max(16));
        for (id, vector) in vectors.iter().enumerate() {
            if vector.len() != dim {
                return Err(IndexError::DimensionMismatch {
                    expected: dim,
                    actual: vector.len(),
                });
            }
            hnsw.insert((vector.as_slice(), id));
        }

        tracing::info!(snippets = texts.len(), dim, embedder = %embedder, "embedding index loaded");

        Ok(Self {
            snippets: texts,
            dim,
            embedder_id: embedder,
            hnsw: RwLock::new(hnsw),
        })
    }

    /// Number of stored snippets.
    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Embedding dimension; 0 for an empty index.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Spec string of the embedder the index was built with.
    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    /// Snippet text by id.
    pub fn snippet(&self, id: usize) -> Option<&str> {
        self.snippets.get(id).map(|s| s.as_str())
    }

    /// Top-`k` nearest snippets by cosine similarity, best first.
    ///
    /// Similarity ties are broken by ascending snippet id so results are
    /// deterministic. An empty index returns no hits.
    pub fn search(&self, query: &[f32], k: usize) -> IndexResult<Vec<SearchHit>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }

        let ef_search = (k * 2).max(32);
        let hnsw = self.hnsw.read().map_err(|_| IndexError::Decode {
            message: "HNSW lock poisoned".into(),
        })?;
        let neighbours = hnsw.search(query, k.min(self.len()), ef_search);

        // DistCosine yields 1 - cos; convert back to similarity.
        let mut hits: Vec<SearchHit> = neighbours
            .into_iter()
            .map(|n| SearchHit {
                snippet_id: n.d_id,
                similarity: 1.0 - n.distance,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.snippet_id.cmp(&b.snippet_id))
        });
        Ok(hits)
    }

    /// Texts of the top-`k` snippets for a query vector, used as generation
    /// context. Search failures degrade to no context.
    pub fn context(&self, query: &[f32], k: usize) -> Vec<&str> {
        match self.search(query, k) {
            Ok(hits) => hits
                .iter()
                .filter_map(|hit| self.snippet(hit.snippet_id))
                .collect(),
            Err(e) => {
                tracing::debug!(error = %e, "context retrieval failed");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingIndex")
            .field("snippets", &self.snippets.len())
            .field("dim", &self.dim)
            .field("embedder_id", &self.embedder_id)
            .finish()
    }
}

fn new_hnsw(max_elements: usize) -> Hnsw<'static, f32, DistCosine> {
    let max_layer = (max_elements as f64).log2().ceil() as usize;
    let max_layer = max_layer.clamp(4, 16);
    Hnsw::new(max_layer, max_elements, 16, 200, DistCosine {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::embed::{Embedder, HashEmbedder};

    fn test_index(texts: &[&str]) -> EmbeddingIndex {
        let embedder = HashEmbedder::new(64);
        let vectors: Vec<Vec<f32>> = texts.iter().map(|t| embedder.embed(t).unwrap()).collect();
        EmbeddingIndex::from_payload(IndexPayload {
            embedder: embedder.id(),
            dim: 64,
            texts: texts.iter().map(|t| t.to_string()).collect(),
            vectors,
        })
        .unwrap()
    }

    #[test]
    fn empty_index_returns_no_hits() {
        let index = EmbeddingIndex::empty();
        let hits = index.search(&[0.1, 0.2], 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn search_finds_exact_match_first() {
        let index = test_index(&[
            "glaciers store most of the planet's fresh water",
            "volcanic eruptions cool the climate for years",
            "the deep ocean remains largely unexplored",
        ]);
        let embedder = HashEmbedder::new(64);
        let query = embedder
            .embed("volcanic eruptions cool the climate for years")
            .unwrap();

        let hits = index.search(&query, 2).unwrap();
        assert_eq!(hits[0].snippet_id, 1);
        assert!((hits[0].similarity - 1.0).abs() < 1e-3);
    }

    #[test]
    fn dimension_mismatch_rejected() {
        let index = test_index(&["one snippet of reasonable length here"]);
        let err = index.search(&[0.0; 32], 1).unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    }

    #[test]
    fn mismatched_payload_rejected() {
        let result = EmbeddingIndex::from_payload(IndexPayload {
            embedder: "hash:64".into(),
            dim: 64,
            texts: vec!["a".into(), "b".into()],
            vectors: vec![vec![0.0; 64]],
        });
        assert!(result.is_err());
    }

    #[test]
    fn context_returns_snippet_texts() {
        let index = test_index(&[
            "glaciers store most of the planet's fresh water",
            "volcanic eruptions cool the climate for years",
        ]);
        let embedder = HashEmbedder::new(64);
        let query = embedder.embed("glaciers and fresh water").unwrap();
        let context = index.context(&query, 1);
        assert_eq!(context.len(), 1);
    }
}
