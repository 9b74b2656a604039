use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::api::rest::extract::JsonBody;
use crate::engine::ingest::{record_batch, record_update};
use crate::error::AppError;
use crate::models::location::{
    AllLocationsResponse, BatchLocationRequest, BatchLocationResponse, HistoryQuery,
    LocationHistoryResponse, LocationUpdate, LocationUpdateResponse, LocationView,
    TechnicianLocation,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/technicians/:id/location", post(update_location))
        .route("/technicians/:id/location/batch", post(update_location_batch))
        .route("/technicians/:id/history", get(location_history))
        .route("/locations", get(all_locations))
        .route("/locations/:technician_id", get(current_location))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<LocationUpdate>,
) -> Result<Json<LocationUpdateResponse>, AppError> {
    Ok(Json(record_update(&state, id, payload, Utc::now()).await?))
}

async fn update_location_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<BatchLocationRequest>,
) -> Result<Json<BatchLocationResponse>, AppError> {
    Ok(Json(
        record_batch(&state, id, payload.locations, Utc::now()).await?,
    ))
}

async fn current_location(
    State(state): State<Arc<AppState>>,
    Path(technician_id): Path<Uuid>,
) -> Result<Json<LocationView>, AppError> {
    let technician = state.directory.technician(technician_id)?;
    let location = state.locations.current(technician_id).ok_or_else(|| {
        AppError::NotFound(format!("no location reported for technician {technician_id}"))
    })?;

    Ok(Json(view(&state, location, technician.name, Utc::now())))
}

async fn all_locations(State(state): State<Arc<AppState>>) -> Json<AllLocationsResponse> {
    let now = Utc::now();
    let locations = state.locations.all_current();
    let counts = state.locations.presence_counts(&locations, now);

    let mut technicians: Vec<LocationView> = locations
        .into_iter()
        .map(|location| {
            let name = state
                .directory
                .technician(location.technician_id)
                .map(|technician| technician.name)
                .unwrap_or_default();
            view(&state, location, name, now)
        })
        .collect();
    technicians.sort_by(|a, b| a.technician_name.cmp(&b.technician_name));

    Json(AllLocationsResponse {
        technicians,
        total_online: counts.online,
        total_offline: counts.offline,
        total_stale: counts.stale,
        last_refresh: now,
    })
}

async fn location_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<LocationHistoryResponse>, AppError> {
    state.directory.technician(id)?;

    let date = query
        .date
        .unwrap_or_else(|| state.locations.local_date(Utc::now()));

    Ok(Json(state.locations.history_for_day(id, date, query.job_id)))
}

fn view(
    state: &AppState,
    location: TechnicianLocation,
    technician_name: String,
    now: DateTime<Utc>,
) -> LocationView {
    LocationView {
        is_stale: state.locations.is_stale(&location, now),
        minutes_since_update: (now - location.received_at).num_minutes().max(0),
        location,
        technician_name,
    }
}
