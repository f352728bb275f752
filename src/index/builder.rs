//! Offline index construction and persistence.
//!
//! `curio build-index` reads a corpus (a text file or a directory of `.txt`
//! files), keeps lines long enough to carry meaning, embeds them, and writes
//! a bincode payload. The serving process loads the payload read-only.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

use super::embed::Embedder;

/// Lines at or below this length are noise, not snippets.
const MIN_SNIPPET_LEN: usize = 20;

/// Persisted index payload: everything needed to rebuild the ANN index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPayload {
    /// Spec string of the embedder used at build time.
    pub embedder: String,
    /// Embedding dimension.
    pub dim: usize,
    /// Snippet texts; position is the snippet id.
    pub texts: Vec<String>,
    /// One embedding per snippet, same order as `texts`.
    pub vectors: Vec<Vec<f32>>,
}

/// Collect snippets from a corpus file or a directory of `.txt` files.
pub fn collect_snippets(corpus: &Path) -> IndexResult<Vec<String>> {
    let mut files = Vec::new();
    if corpus.is_dir() {
        let entries = std::fs::read_dir(corpus).map_err(|source| IndexError::Io {
            path: corpus.display().to_string(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| IndexError::Io {
                path: corpus.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "txt") {
                files.push(path);
            }
        }
        files.sort();
    } else {
        files.push(corpus.to_path_buf());
    }

    let mut snippets = Vec::new();
    for file in &files {
        let content = std::fs::read_to_string(file).map_err(|source| IndexError::Io {
            path: file.display().to_string(),
            source,
        })?;
        for line in content.lines() {
            let line = line.trim();
            if line.len() > MIN_SNIPPET_LEN {
                snippets.push(line.to_string());
            }
        }
    }

    if snippets.is_empty() {
        return Err(IndexError::EmptyCorpus);
    }
    Ok(snippets)
}

/// Embed snippets into a payload. Snippets the embedder rejects are skipped.
pub fn build_payload(embedder: &dyn Embedder, texts: Vec<String>) -> IndexResult<IndexPayload> {
    let mut kept_texts = Vec::with_capacity(texts.len());
    let mut vectors = Vec::with_capacity(texts.len());

    for text in texts {
        match embedder.embed(&text) {
            Ok(vector) => {
                kept_texts.push(text);
                vectors.push(vector);
            }
            Err(e) => {
                tracing::warn!(error = %e, snippet = %text, "skipping snippet that failed to embed");
            }
        }
    }

    let dim = match vectors.first() {
        Some(v) => v.len(),
        None => return Err(IndexError::EmptyCorpus),
    };

    Ok(IndexPayload {
        embedder: embedder.id(),
        dim,
        texts: kept_texts,
        vectors,
    })
}

/// Write a payload to disk, creating parent directories as needed.
pub fn save_payload(payload: &IndexPayload, path: &Path) -> IndexResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| IndexError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
    }

    let encoded = bincode::serialize(payload).map_err(|e| IndexError::Decode {
        message: format!("failed to serialize payload: {e}"),
    })?;
    std::fs::write(path, encoded).map_err(|source| IndexError::Io {
        path: path.display().to_string(),
        source,
    })?;

    tracing::info!(path = %path.display(), snippets = payload.texts.len(), "index written");
    Ok(())
}

/// Read a payload from disk.
pub fn load_payload(path: &Path) -> IndexResult<IndexPayload> {
    let bytes = std::fs::read(path).map_err(|source| IndexError::Io {
        path: path.display().to_string(),
        source,
    })?;
    bincode::deserialize(&bytes).map_err(|e| IndexError::Decode {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::embed::HashEmbedder;

    #[test]
    fn collect_filters_short_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("corpus.txt");
        std::fs::write(
            &file,
            "short\nGlaciers store most of the planet's fresh water.\n  \n",
        )
        .unwrap();

        let snippets = collect_snippets(&file).unwrap();
        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].starts_with("Glaciers"));
    }

    #[test]
    fn collect_reads_txt_files_in_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("a.txt"),
            "Volcanic eruptions can cool the climate for years.\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("b.md"), "Ignored markdown file content here.\n").unwrap();

        let snippets = collect_snippets(dir.path()).unwrap();
        assert_eq!(snippets.len(), 1);
    }

    #[test]
    fn empty_corpus_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("corpus.txt");
        std::fs::write(&file, "tiny\n").unwrap();
        assert!(matches!(
            collect_snippets(&file),
            Err(IndexError::EmptyCorpus)
        ));
    }

    #[test]
    fn payload_roundtrip() {
        let embedder = HashEmbedder::new(32);
        let payload = build_payload(
            &embedder,
            vec![
                "Glaciers store most of the planet's fresh water.".into(),
                "Volcanic eruptions can cool the climate for years.".into(),
            ],
        )
        .unwrap();
        assert_eq!(payload.dim, 32);
        assert_eq!(payload.texts.len(), 2);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sub").join("index.bin");
        save_payload(&payload, &path).unwrap();
        let loaded = load_payload(&path).unwrap();
        assert_eq!(loaded.texts, payload.texts);
        assert_eq!(loaded.vectors, payload.vectors);
        assert_eq!(loaded.embedder, "hash:32");
    }

    #[test]
    fn unembeddable_snippets_are_skipped() {
        let embedder = HashEmbedder::new(32);
        let payload = build_payload(
            &embedder,
            vec![
                "!!!???...".into(),
                "The deep ocean remains largely unexplored.".into(),
            ],
        )
        .unwrap();
        assert_eq!(payload.texts.len(), 1);
    }
}
