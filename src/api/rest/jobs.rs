use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use uuid::Uuid;

use crate::api::rest::extract::JsonBody;
use crate::engine::dispatch::recommend;
use crate::engine::eta::{estimate_for_job, notify_customer};
use crate::engine::tracking_link::tracking_url;
use crate::error::AppError;
use crate::models::dispatch::{DispatchRecommendation, RecommendQuery};
use crate::models::eta::{EtaNotificationResponse, EtaQuery, EtaResponse};
use crate::models::tracking::{IssueTrackingLinkRequest, TrackingLinkResponse};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs/:id/eta", get(job_eta))
        .route("/jobs/:id/eta/notify", post(notify_eta))
        .route("/jobs/:id/recommendations", get(recommendations))
        .route(
            "/jobs/:id/tracking-links",
            post(issue_tracking_link).get(list_tracking_links),
        )
}

async fn job_eta(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<EtaQuery>,
) -> Result<Json<EtaResponse>, AppError> {
    let (calculation, cached) = estimate_for_job(&state, id, query.recalculate, Utc::now())?;
    let technician_name = state
        .directory
        .technician(calculation.technician_id)
        .map(|technician| technician.name)
        .unwrap_or_default();

    Ok(Json(EtaResponse {
        calculation,
        technician_name,
        cached,
    }))
}

async fn notify_eta(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<EtaNotificationResponse>, AppError> {
    Ok(Json(notify_customer(&state, id, Utc::now()).await?))
}

async fn recommendations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<RecommendQuery>,
) -> Result<Json<DispatchRecommendation>, AppError> {
    Ok(Json(recommend(&state, id, query.max_results, Utc::now())?))
}

async fn issue_tracking_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<IssueTrackingLinkRequest>,
) -> Result<Json<TrackingLinkResponse>, AppError> {
    let job = state.directory.job(id)?;
    if !job.status.is_open() {
        return Err(AppError::InvalidInput(format!(
            "job {id} is closed; no tracking link can be issued"
        )));
    }

    let link = state.links.issue(&job, payload, Utc::now())?;
    Ok(Json(TrackingLinkResponse {
        tracking_url: tracking_url(&state.config.public_base_url, &link.token),
        link,
    }))
}

async fn list_tracking_links(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TrackingLinkResponse>>, AppError> {
    state.directory.job(id)?;

    let links = state
        .links
        .links_for_job(id)
        .into_iter()
        .map(|link| TrackingLinkResponse {
            tracking_url: tracking_url(&state.config.public_base_url, &link.token),
            link,
        })
        .collect();

    Ok(Json(links))
}
