use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::api::rest::extract::JsonBody;
use crate::engine::lifecycle::apply_status_change;
use crate::error::AppError;
use crate::models::directory::{
    CreateCustomerRequest, CreateJobRequest, CreateTechnicianRequest, Customer, Job,
    JobStatusChange, Technician, UpdateJobStatusRequest,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/technicians", post(create_technician).get(list_technicians))
        .route("/customers", post(create_customer))
        .route("/jobs", post(create_job))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/status", patch(update_job_status))
}

async fn create_technician(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<CreateTechnicianRequest>,
) -> Result<Json<Technician>, AppError> {
    payload.validate()?;
    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name cannot be empty".to_string()));
    }

    let technician = state.directory.add_technician(payload)?;
    tracing::info!(technician_id = %technician.id, "technician created");
    Ok(Json(technician))
}

async fn list_technicians(State(state): State<Arc<AppState>>) -> Json<Vec<Technician>> {
    Json(state.directory.technicians())
}

async fn create_customer(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<CreateCustomerRequest>,
) -> Result<Json<Customer>, AppError> {
    payload.validate()?;
    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name cannot be empty".to_string()));
    }

    let customer = state.directory.add_customer(payload)?;
    tracing::info!(customer_id = %customer.id, "customer created");
    Ok(Json(customer))
}

async fn create_job(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<CreateJobRequest>,
) -> Result<Json<Job>, AppError> {
    payload.validate()?;

    let job = state.directory.add_job(payload)?;
    tracing::info!(job_id = %job.id, technician_id = ?job.technician_id, "job created");
    Ok(Json(job))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.directory.job(id)?))
}

async fn update_job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateJobStatusRequest>,
) -> Result<Json<JobStatusChange>, AppError> {
    Ok(Json(apply_status_change(&state, id, payload.status, Utc::now())?))
}
