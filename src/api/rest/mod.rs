pub mod drivers;
pub mod geofences;
pub mod jobs;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Serialize;
use serde_json::json;
use tower_http::services::ServeDir;

use crate::engine::scoring::behavior_score;
use crate::models::telemetry::TripCounters;
use crate::state::FleetState;

pub fn router(state: Arc<FleetState>) -> Router {
    Router::new()
        .merge(jobs::router())
        .merge(drivers::router())
        .merge(geofences::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/telemetry/score", post(score_trip))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .fallback_service(ServeDir::new("static"))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    jobs: usize,
    drivers: usize,
    geofences: usize,
}

async fn health(State(state): State<Arc<FleetState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        jobs: state.jobs.len(),
        drivers: state.drivers.len(),
        geofences: state.geofences.len(),
    })
}

async fn metrics(State(state): State<Arc<FleetState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}

async fn score_trip(Json(counters): Json<TripCounters>) -> Json<serde_json::Value> {
    Json(json!({ "score": behavior_score(&counters) }))
}
