pub mod directory;
pub mod extract;
pub mod geofences;
pub mod jobs;
pub mod locations;
pub mod tracking;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(directory::router())
        .merge(locations::router())
        .merge(geofences::router())
        .merge(jobs::router())
        .merge(tracking::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    technicians: usize,
    technicians_online: usize,
    geofences: usize,
    geofence_events: usize,
    tracking_links: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let counts = state
        .locations
        .presence_counts(&state.locations.all_current(), Utc::now());

    Json(HealthResponse {
        status: "ok",
        technicians: state.directory.technicians().len(),
        technicians_online: counts.online,
        geofences: state.geofences.len(),
        geofence_events: state.geofences.event_count(),
        tracking_links: state.links.len(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let counts = state
        .locations
        .presence_counts(&state.locations.all_current(), Utc::now());
    state.metrics.technicians_online.set(counts.online as i64);

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
