//! # curio
//!
//! A curiosity engine: bounded exploration of a seed topic into a trail of
//! novelty-scored questions, annotated with contradictions found between them.
//!
//! ## Architecture
//!
//! - **Exploration loop** (`explore`): generate → score → contradiction-check
//!   → terminate, bounded by rounds, wall clock and novelty exhaustion
//! - **Novelty scoring** (`novelty`): distance of a candidate from the
//!   snippet corpus and the session's own accepted questions
//! - **Contradiction detection** (`dissonance`): NLI verdicts over question
//!   pairs, best-effort
//! - **Model routing** (`router`): one contract over Ollama/OpenAI/Anthropic
//!   backends, selected by `provider:model` spec
//! - **Embedding index** (`index`): offline-built, read-only ANN search
//!
//! ## Library usage
//!
//! ```no_run
//! use curio::config::Config;
//! use curio::engine::CuriosityEngine;
//! use curio::explore::CancelToken;
//!
//! let config = Config::default();
//! let engine = CuriosityEngine::new(&config).unwrap();
//! let session = engine.explore("deep sea vents", engine.defaults(), &CancelToken::new());
//! println!("{} questions, {:?}", session.trail.len(), session.status);
//! ```

pub mod config;
pub mod dissonance;
pub mod engine;
pub mod error;
pub mod explore;
pub mod index;
pub mod novelty;
pub mod prompt;
pub mod router;
pub mod session;
