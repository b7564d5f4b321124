//! JSON views of the pipeline state.

use axum::{extract::State, routing::get, Json, Router};
use tracing::debug;

use super::AppState;
use crate::pipeline::DashboardView;
use crate::Reading;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/dashboard", get(dashboard))
        .route("/api/current", get(current))
        .route("/api/history", get(history))
}

async fn dashboard(State(state): State<AppState>) -> Json<DashboardView> {
    debug!("GET /api/dashboard");
    Json(state.snapshot())
}

/// Current reading, `null` while the sensor is unavailable.
async fn current(State(state): State<AppState>) -> Json<Option<Reading>> {
    Json(state.view.borrow().current.clone())
}

async fn history(State(state): State<AppState>) -> Json<Vec<Reading>> {
    Json(state.view.borrow().history.clone())
}
