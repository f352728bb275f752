//! Embedder capability: text in, vector out.
//!
//! Two implementations, selected by spec string at startup:
//! - `hash:<dim>` — deterministic bag-of-tokens embedding. Each token seeds an
//!   RNG that contributes a fixed pseudo-random direction; the sum is
//!   L2-normalized. No network, stable across runs, good enough for novelty
//!   comparisons and exact-repeat detection.
//! - `ollama:<model>` — Ollama's `/api/embeddings` endpoint.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use crate::error::{IndexError, IndexResult};

/// Capability interface for embedding text.
pub trait Embedder: Send + Sync {
    /// Embed `text` into a vector. Fails on text the embedder cannot handle
    /// (e.g. no tokens); callers treat such candidates as rejected.
    fn embed(&self, text: &str) -> IndexResult<Vec<f32>>;

    /// Spec string identifying this embedder; stored in index payloads so a
    /// mismatched index can be detected at load time.
    fn id(&self) -> String;
}

/// Select an embedder from a spec string.
pub fn from_spec(spec: &str) -> IndexResult<Box<dyn Embedder>> {
    let (provider, rest) = spec.split_once(':').unwrap_or((spec, ""));
    match provider.trim().to_ascii_lowercase().as_str() {
        "hash" => {
            let dim = if rest.trim().is_empty() {
                HashEmbedder::DEFAULT_DIM
            } else {
                rest.trim()
                    .parse::<usize>()
                    .map_err(|_| IndexError::UnknownEmbedder {
                        spec: spec.to_string(),
                    })?
            };
            if dim == 0 {
                return Err(IndexError::UnknownEmbedder {
                    spec: spec.to_string(),
                });
            }
            Ok(Box::new(HashEmbedder::new(dim)))
        }
        "ollama" if !rest.trim().is_empty() => {
            Ok(Box::new(OllamaEmbedder::new(rest.trim().to_string())))
        }
        _ => Err(IndexError::UnknownEmbedder {
            spec: spec.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Hash embedder
// ---------------------------------------------------------------------------

/// Deterministic, offline token-hash embedder.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub const DEFAULT_DIM: usize = 256;

    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> IndexResult<Vec<f32>> {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.is_empty() {
            return Err(IndexError::Embedding {
                message: format!("no tokens in text {text:?}"),
            });
        }

        let mut acc = vec![0.0f32; self.dim];
        for token in tokens {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let mut rng = StdRng::seed_from_u64(hasher.finish());
            for slot in acc.iter_mut() {
                *slot += rng.gen_range(-1.0f32..1.0f32);
            }
        }

        let norm = acc.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(IndexError::Embedding {
                message: "zero-norm embedding".into(),
            });
        }
        for slot in acc.iter_mut() {
            *slot /= norm;
        }
        Ok(acc)
    }

    fn id(&self) -> String {
        format!("hash:{}", self.dim)
    }
}

// ---------------------------------------------------------------------------
// Ollama embedder
// ---------------------------------------------------------------------------

/// Embedder backed by Ollama's `/api/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    timeout_secs: u64,
}

impl OllamaEmbedder {
    pub fn new(model: String) -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model,
            timeout_secs: 60,
        }
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, text: &str) -> IndexResult<Vec<f32>> {
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build();
        let url = format!("{}/api/embeddings", self.base_url);
        let body = json!({ "model": self.model, "prompt": text });

        let resp = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map_err(|e: ureq::Error| IndexError::Embedding {
                message: e.to_string(),
            })?;

        let resp_str = resp.into_string().map_err(|e| IndexError::Embedding {
            message: e.to_string(),
        })?;
        let parsed: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| IndexError::Embedding {
                message: e.to_string(),
            })?;

        let vector: Vec<f32> = parsed["embedding"]
            .as_array()
            .ok_or_else(|| IndexError::Embedding {
                message: "missing 'embedding' field".into(),
            })?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        if vector.is_empty() {
            return Err(IndexError::Embedding {
                message: "empty embedding returned".into(),
            });
        }
        Ok(vector)
    }

    fn id(&self) -> String {
        format!("ollama:{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embedding_is_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("Why does ice float on water?").unwrap();
        let b = embedder.embed("Why does ice float on water?").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_embedding_is_normalized() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed("glaciers calve into the sea").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn different_texts_differ() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("why is the sky blue").unwrap();
        let b = embedder.embed("how do volcanoes erupt").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tokenless_text_fails() {
        let embedder = HashEmbedder::new(64);
        assert!(embedder.embed("???!!!").is_err());
        assert!(embedder.embed("").is_err());
    }

    #[test]
    fn from_spec_selects_hash_with_dim() {
        let embedder = from_spec("hash:128").unwrap();
        assert_eq!(embedder.id(), "hash:128");
    }

    #[test]
    fn from_spec_rejects_unknown() {
        assert!(from_spec("faiss:flat").is_err());
        assert!(from_spec("hash:zero").is_err());
        assert!(from_spec("hash:0").is_err());
    }
}
