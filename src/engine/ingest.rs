use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::engine::eta::estimate_for_job;
use crate::engine::geofence::Evaluation;
use crate::error::AppError;
use crate::models::location::{
    BatchItemResult, BatchLocationResponse, LocationUpdate, LocationUpdateResponse,
};
use crate::state::{AppState, TrackingEvent};

/// Stores one position report and runs everything downstream of it:
/// geofence evaluation, ETA refresh for the carried job, and the live feed.
/// Only an invalid report or an unknown technician fails the call.
pub async fn record_update(
    state: &AppState,
    technician_id: Uuid,
    update: LocationUpdate,
    now: DateTime<Utc>,
) -> Result<LocationUpdateResponse, AppError> {
    let outcome = apply(state, technician_id, update, now).await;

    let label = match &outcome {
        Ok(_) => "accepted",
        Err(AppError::NotFound(_)) => "unknown_technician",
        Err(_) => "rejected",
    };
    state
        .metrics
        .location_updates_total
        .with_label_values(&[label])
        .inc();

    outcome
}

async fn apply(
    state: &AppState,
    technician_id: Uuid,
    update: LocationUpdate,
    now: DateTime<Utc>,
) -> Result<LocationUpdateResponse, AppError> {
    update.validate()?;
    state.directory.technician(technician_id)?;

    let location = state.locations.record(technician_id, &update, now);
    debug!(
        technician_id = %technician_id,
        lat = location.latitude,
        lng = location.longitude,
        "location recorded"
    );

    let _ = state
        .events_tx
        .send(TrackingEvent::LocationUpdated(location.clone()));

    let job_customer_id = update
        .job_id
        .and_then(|job_id| state.directory.job(job_id).ok())
        .map(|job| job.customer_id);

    let events = state
        .geofences
        .evaluate(
            &state.actions,
            Evaluation {
                technician_id,
                job_id: update.job_id,
                job_customer_id,
                position: update.position(),
                now,
            },
        )
        .await;

    for event in &events {
        state
            .metrics
            .geofence_events_total
            .with_label_values(&[event.event_type.as_str()])
            .inc();
        state
            .metrics
            .geofence_actions_total
            .with_label_values(&[event.action_result.as_str()])
            .inc();
        let _ = state
            .events_tx
            .send(TrackingEvent::GeofenceTransition(event.clone()));
    }

    if let Some(job_id) = update.job_id {
        if let Err(err) = estimate_for_job(state, job_id, true, now) {
            warn!(
                technician_id = %technician_id,
                job_id = %job_id,
                error = %err,
                "eta refresh after location update failed"
            );
        }
    }

    Ok(LocationUpdateResponse {
        location,
        geofence_events: events,
    })
}

/// Applies offline-synced reports oldest first. Each report stands alone:
/// one that fails to parse or apply is reported and the rest still apply.
/// Results come back in submission order.
pub async fn record_batch(
    state: &AppState,
    technician_id: Uuid,
    entries: Vec<serde_json::Value>,
    now: DateTime<Utc>,
) -> Result<BatchLocationResponse, AppError> {
    state.directory.technician(technician_id)?;

    let total = entries.len();
    let mut results = Vec::with_capacity(total);
    let mut updates = Vec::with_capacity(total);

    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<LocationUpdate>(entry) {
            Ok(update) => updates.push((index, update)),
            Err(err) => {
                state
                    .metrics
                    .location_updates_total
                    .with_label_values(&["rejected"])
                    .inc();
                results.push(BatchItemResult {
                    index,
                    captured_at: None,
                    ok: false,
                    error: Some(AppError::InvalidInput(err.to_string()).to_string()),
                });
            }
        }
    }

    updates.sort_by_key(|(_, update)| update.captured_at);

    for (index, update) in updates {
        let captured_at = Some(update.captured_at);
        match record_update(state, technician_id, update, now).await {
            Ok(_) => results.push(BatchItemResult {
                index,
                captured_at,
                ok: true,
                error: None,
            }),
            Err(err) => results.push(BatchItemResult {
                index,
                captured_at,
                ok: false,
                error: Some(err.to_string()),
            }),
        }
    }

    results.sort_by_key(|result| result.index);

    let processed = results.iter().filter(|result| result.ok).count();
    let failed = total - processed;

    info!(
        technician_id = %technician_id,
        total,
        processed,
        failed,
        "location batch applied"
    );

    Ok(BatchLocationResponse {
        processed,
        failed,
        total,
        results,
    })
}
