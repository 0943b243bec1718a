//! Agent profile routes.

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};

use super::AppState;

pub fn router(state: AppState) -> Router {
    Router::new().route("/", get(list_agents)).with_state(state)
}

/// GET /agents - Configured participants and the scenarios they can meet in.
async fn list_agents(State(registry): State<AppState>) -> Json<Value> {
    let settings = registry.settings();
    Json(json!({
        "agents": registry.profiles().all(),
        "moderator": settings.moderator_for(None).profile(),
        "scenarios": settings.scenarios,
    }))
}
