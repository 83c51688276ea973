//! Bloomstep · Adaptive Assessment Backend
//!
//! - Axum HTTP + WebSocket API (one assessment session per WS connection)
//! - Groq (OpenAI-compatible) generation via environment variables
//!
//! Important env variables:
//!   PORT               : u16 (default 3000)
//!   GROQ_API_KEY       : enables challenge generation if present
//!   GROQ_BASE_URL      : default "https://api.groq.com/openai/v1"
//!   GROQ_MODEL         : default "llama-3.1-8b-instant"
//!   ENGINE_CONFIG_PATH : path to TOML config (prompts + engine settings)
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod config;
mod policy;
mod lifecycle;
mod groq;
mod session;
mod protocol;
mod state;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (config + optional Groq client).
  let state = Arc::new(AppState::new());

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "bloomstep_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
