use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::actions::{Notification, NotificationKind, Recipient};
use crate::engine::tracking_link::tracking_url;
use crate::error::AppError;
use crate::geo::{haversine_miles, GeoPoint};
use crate::models::directory::{Customer, Job};
use crate::models::eta::{EtaCalculation, EtaNotificationResponse};
use crate::models::location::TechnicianLocation;
use crate::state::AppState;

const CITY_SPEED_MPH: f64 = 25.0;
const RURAL_SPEED_MPH: f64 = 45.0;
const HIGHWAY_SPEED_MPH: f64 = 55.0;
const MIN_PLAUSIBLE_SPEED_MPH: f64 = 5.0;
const MAX_PLAUSIBLE_SPEED_MPH: f64 = 80.0;

pub const INTERNAL_SOURCE: &str = "internal";
pub const INTERNAL_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, Copy)]
pub struct TravelRequest {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub reported_speed_mph: Option<f64>,
    pub departure: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TravelEstimate {
    pub distance_miles: f64,
    pub base_duration_minutes: i64,
    pub traffic_multiplier: f64,
    pub adjusted_duration_minutes: i64,
    pub confidence: f64,
    pub source: String,
}

/// Source of travel-time estimates. An external routing service can sit
/// behind this and report its own confidence.
pub trait TravelEstimator: Send + Sync {
    fn estimate(&self, request: &TravelRequest) -> TravelEstimate;
}

/// Static time-of-day multiplier. Bands are local clock hours, inclusive.
#[derive(Debug, Clone, Copy)]
pub struct TrafficProfile {
    offset: FixedOffset,
}

impl TrafficProfile {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn multiplier_at(&self, at: DateTime<Utc>) -> f64 {
        let hour = at.with_timezone(&self.offset).hour();
        match hour {
            7..=9 => 1.4,
            16..=19 => 1.4,
            10..=15 => 1.1,
            _ => 1.0,
        }
    }
}

pub struct HeuristicEstimator {
    traffic: TrafficProfile,
}

impl HeuristicEstimator {
    pub fn new(traffic: TrafficProfile) -> Self {
        Self { traffic }
    }
}

impl TravelEstimator for HeuristicEstimator {
    fn estimate(&self, request: &TravelRequest) -> TravelEstimate {
        let distance_miles = haversine_miles(&request.origin, &request.destination);
        let speed = cruising_speed(distance_miles, request.reported_speed_mph);
        let minutes = distance_miles / speed * 60.0;
        let traffic_multiplier = self.traffic.multiplier_at(request.departure);

        TravelEstimate {
            distance_miles,
            base_duration_minutes: (minutes.round() as i64).max(1),
            traffic_multiplier,
            adjusted_duration_minutes: ((minutes * traffic_multiplier).round() as i64).max(1),
            confidence: INTERNAL_CONFIDENCE,
            source: INTERNAL_SOURCE.to_string(),
        }
    }
}

/// Reported speed when it is plausible, otherwise a tier by trip length.
fn cruising_speed(distance_miles: f64, reported_mph: Option<f64>) -> f64 {
    match reported_mph {
        Some(mph) if mph > MIN_PLAUSIBLE_SPEED_MPH && mph < MAX_PLAUSIBLE_SPEED_MPH => mph,
        _ if distance_miles < 5.0 => CITY_SPEED_MPH,
        _ if distance_miles < 20.0 => RURAL_SPEED_MPH,
        _ => HIGHWAY_SPEED_MPH,
    }
}

/// One live calculation per job, overwritten on each recompute.
pub struct EtaEngine {
    calculations: DashMap<Uuid, EtaCalculation>,
    estimator: Arc<dyn TravelEstimator>,
    cache_ttl: Duration,
    fallback_destination: GeoPoint,
}

impl EtaEngine {
    pub fn new(
        estimator: Arc<dyn TravelEstimator>,
        cache_ttl: Duration,
        fallback_destination: GeoPoint,
    ) -> Self {
        Self {
            calculations: DashMap::new(),
            estimator,
            cache_ttl,
            fallback_destination,
        }
    }

    /// The stored calculation for the job if it is younger than the cache
    /// window and still belongs to `technician_id`.
    pub fn fresh(&self, job_id: Uuid, technician_id: Uuid, now: DateTime<Utc>) -> Option<EtaCalculation> {
        self.calculations
            .get(&job_id)
            .filter(|calc| calc.technician_id == technician_id && now - calc.calculated_at < self.cache_ttl)
            .map(|calc| calc.value().clone())
    }

    /// Service address first, then the customer's geocoded address, then
    /// the configured fallback.
    pub fn destination_for(&self, job: &Job, customer: Option<&Customer>) -> (GeoPoint, bool) {
        job.service_location
            .or_else(|| customer.and_then(|customer| customer.location))
            .map(|point| (point, true))
            .unwrap_or((self.fallback_destination, false))
    }

    pub fn compute(
        &self,
        job: &Job,
        customer: Option<&Customer>,
        location: &TechnicianLocation,
        now: DateTime<Utc>,
    ) -> EtaCalculation {
        let (destination, destination_known) = self.destination_for(job, customer);
        let estimate = self.estimator.estimate(&TravelRequest {
            origin: location.position(),
            destination,
            reported_speed_mph: location.speed,
            departure: now,
        });

        let calculation = EtaCalculation {
            job_id: job.id,
            technician_id: location.technician_id,
            origin: location.position(),
            destination,
            destination_known,
            distance_miles: (estimate.distance_miles * 100.0).round() / 100.0,
            base_duration_minutes: estimate.base_duration_minutes,
            traffic_multiplier: estimate.traffic_multiplier,
            adjusted_duration_minutes: estimate.adjusted_duration_minutes,
            estimated_arrival: now + Duration::minutes(estimate.adjusted_duration_minutes),
            confidence: estimate.confidence,
            calculation_source: estimate.source,
            calculated_at: now,
        };

        self.calculations.insert(job.id, calculation.clone());
        calculation
    }
}

/// Returns the job's ETA and whether it was served from cache.
pub fn estimate_for_job(
    state: &AppState,
    job_id: Uuid,
    force: bool,
    now: DateTime<Utc>,
) -> Result<(EtaCalculation, bool), AppError> {
    let job = state.directory.job(job_id)?;
    let technician_id = job.technician_id.ok_or_else(|| {
        AppError::InvalidInput(format!("job {job_id} has no assigned technician"))
    })?;

    if !force {
        if let Some(calculation) = state.eta.fresh(job_id, technician_id, now) {
            state
                .metrics
                .eta_calculations_total
                .with_label_values(&["cached"])
                .inc();
            return Ok((calculation, true));
        }
    }

    let location = state.locations.current(technician_id).ok_or_else(|| {
        AppError::NotFound(format!("no location reported for technician {technician_id}"))
    })?;
    let customer = state.directory.customer(job.customer_id).ok();

    let calculation = state.eta.compute(&job, customer.as_ref(), &location, now);
    state
        .metrics
        .eta_calculations_total
        .with_label_values(&["computed"])
        .inc();

    info!(
        job_id = %job_id,
        technician_id = %technician_id,
        distance_miles = calculation.distance_miles,
        adjusted_minutes = calculation.adjusted_duration_minutes,
        destination_known = calculation.destination_known,
        "eta calculated"
    );

    Ok((calculation, false))
}

/// Sends the customer an "on the way" message with the current ETA and, if
/// one is live, the tracking link.
pub async fn notify_customer(
    state: &AppState,
    job_id: Uuid,
    now: DateTime<Utc>,
) -> Result<EtaNotificationResponse, AppError> {
    let (calculation, _) = estimate_for_job(state, job_id, false, now)?;
    let job = state.directory.job(job_id)?;
    let technician = state.directory.technician(calculation.technician_id)?;

    let tracking_url = state
        .links
        .live_link_for_job(job_id, now)
        .map(|link| tracking_url(&state.config.public_base_url, &link.token));

    let eta_minutes = calculation
        .destination_known
        .then_some(calculation.adjusted_duration_minutes);

    let mut message = match eta_minutes {
        Some(minutes) => format!(
            "{} is on the way and should arrive in about {minutes} minutes.",
            technician.name
        ),
        None => format!("{} is on the way.", technician.name),
    };
    if let Some(url) = &tracking_url {
        message.push_str(&format!(" Track your technician: {url}"));
    }

    let notification = Notification {
        kind: NotificationKind::EtaUpdate,
        recipient: Recipient::Customer(job.customer_id),
        technician_id: technician.id,
        job_id: Some(job_id),
        message: message.clone(),
    };

    match tokio::time::timeout(state.actions.timeout(), state.actions.notifier().notify(&notification)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!(job_id = %job_id, error = %err, "eta notification failed");
            return Err(match err {
                AppError::ActionFailed(msg) => AppError::ActionFailed(msg),
                other => AppError::ActionFailed(other.to_string()),
            });
        }
        Err(_) => {
            warn!(job_id = %job_id, "eta notification timed out");
            return Err(AppError::ActionFailed(
                "notification channel timed out".to_string(),
            ));
        }
    }

    Ok(EtaNotificationResponse {
        job_id,
        customer_id: job.customer_id,
        eta_minutes,
        tracking_url,
        message,
    })
}
