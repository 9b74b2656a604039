use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::engine::scoring::{availability, Candidate, ScoringWeights};
use crate::error::AppError;
use crate::geo::{haversine_miles, GeoPoint};
use crate::models::directory::Technician;
use crate::models::dispatch::{DispatchRecommendation, DispatchScore, LocationSource};
use crate::state::AppState;

pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const MAX_RESULTS_LIMIT: usize = 25;

/// Rough drive time at 30 mph.
const MINUTES_PER_MILE: f64 = 2.0;

/// Ranks every active technician for the job. Ties keep technician-id order.
pub fn recommend(
    state: &AppState,
    job_id: Uuid,
    max_results: Option<usize>,
    now: DateTime<Utc>,
) -> Result<DispatchRecommendation, AppError> {
    let start = Instant::now();

    let job = state.directory.job(job_id)?;
    let max_results = max_results
        .unwrap_or(DEFAULT_MAX_RESULTS)
        .clamp(1, MAX_RESULTS_LIMIT);

    let job_location = job.service_location.or_else(|| {
        state
            .directory
            .customer(job.customer_id)
            .ok()
            .and_then(|customer| customer.location)
    });
    let workload_date = job
        .scheduled_date
        .unwrap_or_else(|| state.locations.local_date(now));

    let technicians = state.directory.active_technicians();
    let weights = ScoringWeights::default();
    let gps_max_age = Duration::minutes(state.config.dispatch_gps_max_age_mins);

    let mut ranked: Vec<DispatchScore> = technicians
        .iter()
        .map(|technician| {
            let position = best_known_position(state, technician, gps_max_age, now);
            let distance_miles = match (position, job_location) {
                (Some((from, _)), Some(to)) => Some(haversine_miles(&from, &to)),
                _ => None,
            };

            let skill_matched = technician.skills.is_empty()
                || technician.skills.iter().any(|skill| skill == &job.job_type);
            let workload = state.directory.workload(technician.id, workload_date);

            let (score, factors) = weights.score(&Candidate {
                distance_miles,
                skill_matched,
                workload,
                priority: job.priority,
            });

            DispatchScore {
                technician_id: technician.id,
                technician_name: technician.name.clone(),
                distance_miles: distance_miles.map(|d| (d * 10.0).round() / 10.0),
                estimated_travel_minutes: distance_miles
                    .map(|d| (d * MINUTES_PER_MILE * 10.0).round() / 10.0),
                location_source: distance_miles.and(position.map(|(_, source)| source)),
                skills_matched: technician
                    .skills
                    .iter()
                    .filter(|skill| **skill == job.job_type)
                    .cloned()
                    .collect(),
                skills_missing: if skill_matched {
                    Vec::new()
                } else {
                    vec![job.job_type.clone()]
                },
                availability: availability(&workload),
                workload,
                score,
                factors,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(max_results);

    let elapsed = start.elapsed().as_secs_f64();
    state.metrics.dispatch_latency_seconds.observe(elapsed);

    info!(
        job_id = %job_id,
        candidates = technicians.len(),
        returned = ranked.len(),
        top_score = ?ranked.first().map(|r| r.score),
        "dispatch recommendation computed"
    );

    Ok(DispatchRecommendation {
        job_id,
        job_type: job.job_type,
        priority: job.priority,
        job_location,
        recommended_technicians: ranked,
        total_active_technicians: technicians.len(),
    })
}

/// Fresh live GPS first, then the technician's home address.
fn best_known_position(
    state: &AppState,
    technician: &Technician,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Option<(GeoPoint, LocationSource)> {
    state
        .locations
        .current(technician.id)
        .filter(|location| now - location.received_at <= max_age)
        .map(|location| (location.position(), LocationSource::Gps))
        .or_else(|| technician.home.map(|home| (home, LocationSource::Home)))
}
