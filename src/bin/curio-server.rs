//! curio HTTP server.
//!
//! Exposes the exploration engine over REST:
//!
//! - `POST /ask` — run one bounded exploration for a seed topic, with
//!   optional per-request tunable overrides
//! - `GET  /health` — server status
//!
//! Sessions run on blocking worker threads behind a semaphore so a burst of
//! requests cannot overwhelm the model backend. Client disconnects cancel the
//! running session at its next round boundary.
//!
//! Build and run: `cargo run --features server --bin curio-server`

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tower_http::cors::CorsLayer;

use curio::config::Config;
use curio::engine::CuriosityEngine;
use curio::explore::{CancelToken, ParamOverrides};
use curio::session::SessionReport;

#[derive(Parser)]
#[command(name = "curio-server", version, about = "Curiosity engine HTTP server")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "curio.toml")]
    config: PathBuf,

    /// Bind address; overrides the config value.
    #[arg(long)]
    bind: Option<String>,
}

// ── Server state ──────────────────────────────────────────────────────────

struct ServerState {
    engine: Arc<CuriosityEngine>,
    /// Bounded concurrency gate in front of the model backend.
    gate: Semaphore,
}

// ── Request/response types ────────────────────────────────────────────────

#[derive(Deserialize)]
struct AskRequest {
    topic: String,
    #[serde(flatten)]
    overrides: ParamOverrides,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    snippets: usize,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        snippets: state.engine.info().snippets,
    })
}

async fn ask(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<SessionReport>, (StatusCode, String)> {
    let topic = request.topic.trim().to_string();
    if topic.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "topic must be a non-empty string".to_string(),
        ));
    }

    let params = state
        .engine
        .defaults()
        .with_overrides(&request.overrides)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{e}")))?;

    let _permit = state.gate.acquire().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("concurrency gate closed: {e}"),
        )
    })?;

    let cancel = CancelToken::new();
    // Cancels the session at its next round boundary if this handler future
    // is dropped (client disconnect); a no-op once the session has finished.
    let _guard = CancelOnDrop(cancel.clone());

    let engine = Arc::clone(&state.engine);
    let session = tokio::task::spawn_blocking(move || engine.explore(&topic, params, &cancel))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("session task failed: {e}"),
            )
        })?;

    Ok(Json(SessionReport::from(session)))
}

struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

// ── Entry point ───────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());
    let max_sessions = config.server.max_concurrent_sessions;

    let engine = Arc::new(CuriosityEngine::new(&config)?);
    tracing::info!(%bind, max_sessions, "starting curio server");
    tracing::info!("{}", engine.info());

    let state = Arc::new(ServerState {
        engine,
        gate: Semaphore::new(max_sessions),
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/ask", post(ask))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind).await.into_diagnostic()?;
    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}
