// src/api.rs
//! HTTP surface: health, manual timer triggers, timer states, store stats.

use std::sync::Arc;

use serde_json::json;
use shuttle_axum::axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::scheduler::{CycleScheduler, TimerName, TriggerOutcome};
use crate::store::SeenStore;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<CycleScheduler>,
    pub store: Arc<SeenStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/admin/run/{timer}", post(run_timer))
        .route("/admin/timers", get(list_timers))
        .route("/stats", get(stats))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// 200 completed, 409 skipped (already running), 500 failed, 404 unknown timer.
async fn run_timer(State(state): State<AppState>, Path(timer): Path<String>) -> Response {
    let name = match timer.parse::<TimerName>() {
        Ok(n) => n,
        Err(e) => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response()
        }
    };
    match state.scheduler.trigger(name).await {
        Ok(TriggerOutcome::Completed(report)) => (
            StatusCode::OK,
            Json(json!({ "timer": name, "outcome": "completed", "report": report })),
        )
            .into_response(),
        Ok(TriggerOutcome::Skipped) => (
            StatusCode::CONFLICT,
            Json(json!({ "timer": name, "outcome": "skipped", "reason": "already running" })),
        )
            .into_response(),
        Ok(TriggerOutcome::Failed(error)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "timer": name, "outcome": "failed", "error": error })),
        )
            .into_response(),
        Err(e) => (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}

async fn list_timers(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.timers())
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.stats())
}
