//! Rich diagnostic error types for the curio engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know exactly what went wrong
//! and how to fix it.
//!
//! Propagation policy:
//! - Candidate-local failures (embedding) reject one candidate, never a session.
//! - Pair-local failures (NLI classification) skip one pair, never a session.
//! - Round-terminal failures (generation) end the session gracefully with the
//!   trail gathered so far.
//! - Configuration failures are fatal before any session starts.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the curio engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum CurioError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

pub type CurioResult<T> = std::result::Result<T, CurioError>;

// ---------------------------------------------------------------------------
// Router errors
// ---------------------------------------------------------------------------

/// Errors from the language model router and its backends.
#[derive(Debug, Error, Diagnostic)]
pub enum RouterError {
    #[error("unknown model provider in spec \"{spec}\"")]
    #[diagnostic(
        code(curio::router::unknown_provider),
        help(
            "Model specs have the form `provider:model`, e.g. `ollama:llama3.2`, \
             `openai:gpt-4o-mini`, `anthropic:claude-3-haiku` or `echo:any`."
        )
    )]
    UnknownProvider { spec: String },

    #[error("missing API key for provider \"{provider}\"")]
    #[diagnostic(
        code(curio::router::missing_api_key),
        help("Set the {env_var} environment variable before starting the process.")
    )]
    MissingApiKey { provider: String, env_var: String },

    #[error("model request failed: {message}")]
    #[diagnostic(
        code(curio::router::request_failed),
        help("Check that the backend is reachable and the model name is correct.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse model response: {message}")]
    #[diagnostic(
        code(curio::router::parse_error),
        help("The model returned an unexpected response format.")
    )]
    ParseError { message: String },
}

pub type RouterResult<T> = std::result::Result<T, RouterError>;

// ---------------------------------------------------------------------------
// Index errors
// ---------------------------------------------------------------------------

/// Errors from the embedding index: embedding, search, build and persistence.
#[derive(Debug, Error, Diagnostic)]
pub enum IndexError {
    #[error("failed to embed text: {message}")]
    #[diagnostic(
        code(curio::index::embedding),
        help(
            "The embedder could not produce a vector for this text. \
             Candidates that cannot be embedded are rejected, not retried."
        )
    )]
    Embedding { message: String },

    #[error("embedding dimension mismatch: index has {expected}, query has {actual}")]
    #[diagnostic(
        code(curio::index::dim_mismatch),
        help(
            "The query was embedded with a different model than the index. \
             Rebuild the index with `curio build-index` using the configured embedder."
        )
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unknown embedder spec \"{spec}\"")]
    #[diagnostic(
        code(curio::index::unknown_embedder),
        help("Supported embedders: `hash:<dim>` (offline, deterministic) and `ollama:<model>`.")
    )]
    UnknownEmbedder { spec: String },

    #[error("I/O error on {path}: {source}")]
    #[diagnostic(
        code(curio::index::io),
        help("Check that the path exists, permissions are correct, and the disk is not full.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode index payload: {message}")]
    #[diagnostic(
        code(curio::index::decode),
        help("The index file is corrupt or was written by an incompatible version. Rebuild it.")
    )]
    Decode { message: String },

    #[error("corpus produced no snippets")]
    #[diagnostic(
        code(curio::index::empty_corpus),
        help(
            "No lines longer than the minimum snippet length were found. \
             Point --corpus at a text file or a directory of .txt files."
        )
    )]
    EmptyCorpus,
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation. Always fatal at startup.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(curio::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {path}")]
    #[diagnostic(
        code(curio::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration value for `{field}`: {message}")]
    #[diagnostic(
        code(curio::config::invalid_value),
        help(
            "Tunables must satisfy: novelty_threshold and contradiction_threshold in [0,1], \
             max_rounds >= 1, batch_size >= 1, time_limit_seconds >= 0."
        )
    )]
    InvalidValue { field: String, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
