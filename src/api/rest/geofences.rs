use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::extract::JsonBody;
use crate::error::AppError;
use crate::models::geofence::{
    CreateGeofenceRequest, Geofence, GeofenceEvent, GeofenceEventsQuery, ListGeofencesQuery,
    UpdateGeofenceRequest,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/geofences", post(create_geofence).get(list_geofences))
        .route(
            "/geofences/:id",
            get(get_geofence)
                .patch(update_geofence)
                .delete(delete_geofence),
        )
        .route("/geofence-events", get(list_events))
        .route("/customers/:id/geofence", post(create_customer_site))
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerSiteRequest {
    pub radius_meters: Option<f64>,
}

async fn create_geofence(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<CreateGeofenceRequest>,
) -> Result<Json<Geofence>, AppError> {
    Ok(Json(state.geofences.create(payload, Utc::now())?))
}

async fn list_geofences(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListGeofencesQuery>,
) -> Json<Vec<Geofence>> {
    Json(state.geofences.list(&query))
}

async fn get_geofence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Geofence>, AppError> {
    Ok(Json(state.geofences.get(id)?))
}

async fn update_geofence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateGeofenceRequest>,
) -> Result<Json<Geofence>, AppError> {
    Ok(Json(state.geofences.update(id, payload, Utc::now())?))
}

async fn delete_geofence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.geofences.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GeofenceEventsQuery>,
) -> Json<Vec<GeofenceEvent>> {
    Json(state.geofences.events(&query))
}

async fn create_customer_site(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<CustomerSiteRequest>,
) -> Result<Json<Geofence>, AppError> {
    let customer = state.directory.customer(id)?;
    Ok(Json(state.geofences.create_customer_site(
        &customer,
        payload.radius_meters,
        Utc::now(),
    )?))
}
