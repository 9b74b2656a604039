use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Live ETA row for a job, recomputed in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EtaCalculation {
    pub job_id: Uuid,
    pub technician_id: Uuid,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    /// False when the destination is the ungeocoded fallback; distance and
    /// duration are then not a real estimate.
    pub destination_known: bool,
    pub distance_miles: f64,
    pub base_duration_minutes: i64,
    pub traffic_multiplier: f64,
    pub adjusted_duration_minutes: i64,
    pub estimated_arrival: DateTime<Utc>,
    pub confidence: f64,
    pub calculation_source: String,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EtaQuery {
    #[serde(default)]
    pub recalculate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EtaResponse {
    #[serde(flatten)]
    pub calculation: EtaCalculation,
    pub technician_name: String,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EtaNotificationResponse {
    pub job_id: Uuid,
    pub customer_id: Uuid,
    /// Absent when the destination is not geocoded.
    pub eta_minutes: Option<i64>,
    pub tracking_url: Option<String>,
    pub message: String,
}
