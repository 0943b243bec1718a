//! REST and websocket API for Roundtable.
//!
//! Provides HTTP endpoints for:
//! - Agent profiles and scenarios
//! - Starting, listing and inspecting meetings
//! - Initiator control of a running meeting
//! - Transcript export
//! - Live observation over a websocket

pub mod error;
pub mod routes;

use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::info;

use crate::config::ServerConfig;
use routes::AppState;

pub use routes::meetings::CONTROL_TOKEN_HEADER;

pub struct ApiServer {
    host: String,
    port: u16,
    state: AppState,
}

impl ApiServer {
    pub fn new(state: AppState, config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            state,
        }
    }

    pub async fn start(self) -> Result<()> {
        let address = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind API server to {address}"))?;

        info!("API server listening on http://{}", address);
        info!("Endpoints:");
        info!("  GET  /                        - Service info");
        info!("  GET  /version                 - Get version info");
        info!("  GET  /agents                  - List agent profiles and scenarios");
        info!("  POST /meetings                - Start a meeting");
        info!("  GET  /meetings                - List meetings");
        info!("  GET  /meetings/:id            - Meeting snapshot");
        info!("  GET  /meetings/:id/transcript - Paged transcript");
        info!("  GET  /meetings/:id/export     - Export as markdown or json");
        info!("  POST /meetings/:id/pause      - Pause (x-control-token)");
        info!("  POST /meetings/:id/resume     - Resume (x-control-token)");
        info!("  POST /meetings/:id/stop       - Stop (x-control-token)");
        info!("  POST /meetings/:id/skip       - Skip current turn (x-control-token)");
        info!("  POST /meetings/:id/conclude   - Wrap up early (x-control-token)");
        info!("  POST /meetings/:id/heartbeat  - Mark the initiator present (x-control-token)");
        info!("  GET  /meetings/:id/ws         - Observe live");

        serve(listener, self.state).await
    }
}

/// Serve the API on an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    axum::serve(listener, router(state))
        .await
        .context("API server stopped unexpectedly")
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/version", get(version))
        .nest("/agents", routes::agents::router(state.clone()))
        .nest("/meetings", routes::meetings::router(state))
        .layer(ServiceBuilder::new())
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "roundtable",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "roundtable"
    }))
}
