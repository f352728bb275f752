//! curio CLI: bounded curiosity exploration over a text corpus.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use curio::config::Config;
use curio::engine::CuriosityEngine;
use curio::explore::{CancelToken, ParamOverrides};
use curio::index::builder;
use curio::index::embed;
use curio::session::SessionReport;

#[derive(Parser)]
#[command(name = "curio", version, about = "Curiosity engine: question exploration with novelty scoring")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "curio.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore a seed topic and print the resulting session as JSON.
    Ask {
        /// Seed topic to explore.
        topic: String,

        /// Override the hard round ceiling.
        #[arg(long)]
        max_rounds: Option<u32>,

        /// Override the novelty acceptance threshold (0..1).
        #[arg(long)]
        novelty_threshold: Option<f32>,

        /// Override the candidates requested per round.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override the wall-clock budget in seconds.
        #[arg(long)]
        time_limit: Option<f64>,

        /// Override the contradiction recording threshold (0..1).
        #[arg(long)]
        contradiction_threshold: Option<f32>,
    },

    /// Build the embedding index from a text corpus.
    BuildIndex {
        /// Corpus: a text file or a directory of .txt files.
        #[arg(long)]
        corpus: PathBuf,

        /// Output path; defaults to the configured index path.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show engine info: models, embedder and index statistics.
    Info,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Ask {
            topic,
            max_rounds,
            novelty_threshold,
            batch_size,
            time_limit,
            contradiction_threshold,
        } => {
            if topic.trim().is_empty() {
                miette::bail!("topic must be a non-empty string");
            }

            let engine = CuriosityEngine::new(&config)?;
            let params = engine.defaults().with_overrides(&ParamOverrides {
                max_rounds,
                novelty_threshold,
                batch_size,
                time_limit_seconds: time_limit,
                contradiction_threshold,
            })?;

            let session = engine.explore(topic.trim(), params, &CancelToken::new());
            let report = SessionReport::from(session);
            let json = serde_json::to_string_pretty(&report).into_diagnostic()?;
            println!("{json}");
        }

        Commands::BuildIndex { corpus, out } => {
            let embedder = embed::from_spec(&config.models.embedder)?;
            let snippets = builder::collect_snippets(&corpus)?;
            println!("Collected {} snippets. Embedding...", snippets.len());

            let payload = builder::build_payload(embedder.as_ref(), snippets)?;
            let out = out.unwrap_or_else(|| config.index.path.clone());
            builder::save_payload(&payload, &out)?;
            println!(
                "Index written to {} ({} snippets, dim {})",
                out.display(),
                payload.texts.len(),
                payload.dim
            );
        }

        Commands::Info => {
            let engine = CuriosityEngine::new(&config)?;
            println!("{}", engine.info());
        }
    }

    Ok(())
}
