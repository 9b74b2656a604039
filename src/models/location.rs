use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::geo::GeoPoint;
use crate::models::geofence::GeofenceEvent;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TechnicianStatus {
    #[default]
    Available,
    EnRoute,
    OnSite,
    Break,
}

fn default_online() -> bool {
    true
}

/// Position report pushed by a technician's device.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LocationUpdate {
    #[validate(range(min = -90.0, max = 90.0, message = "latitude must be between -90 and 90"))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "longitude must be between -180 and 180"))]
    pub longitude: f64,

    #[validate(range(min = 0.0, message = "accuracy must be non-negative"))]
    pub accuracy: Option<f64>,

    #[validate(range(min = 0.0, message = "speed must be non-negative"))]
    pub speed: Option<f64>,

    #[validate(range(min = 0.0, max = 360.0, message = "heading must be between 0 and 360"))]
    pub heading: Option<f64>,

    #[validate(range(max = 100, message = "battery level must be between 0 and 100"))]
    pub battery_level: Option<u8>,

    pub captured_at: DateTime<Utc>,

    #[serde(default)]
    pub status: Option<TechnicianStatus>,

    pub job_id: Option<Uuid>,

    #[serde(default = "default_online")]
    pub is_online: bool,
}

impl LocationUpdate {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicianLocation {
    pub technician_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub is_online: bool,
    pub battery_level: Option<u8>,
    pub captured_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub current_job_id: Option<Uuid>,
    pub current_status: TechnicianStatus,
}

impl TechnicianLocation {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationHistoryPoint {
    pub technician_id: Uuid,
    pub job_id: Option<Uuid>,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub status: TechnicianStatus,
    pub distance_from_previous_miles: f64,
    pub cumulative_distance_miles: f64,
    pub captured_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationView {
    #[serde(flatten)]
    pub location: TechnicianLocation,
    pub technician_name: String,
    pub is_stale: bool,
    pub minutes_since_update: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllLocationsResponse {
    pub technicians: Vec<LocationView>,
    pub total_online: usize,
    pub total_offline: usize,
    pub total_stale: usize,
    pub last_refresh: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchLocationRequest {
    /// Parsed one by one so a malformed entry fails alone.
    pub locations: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    /// Position of the entry in the submitted list.
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchLocationResponse {
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
    pub results: Vec<BatchItemResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub date: Option<NaiveDate>,
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationHistoryResponse {
    pub technician_id: Uuid,
    pub date: NaiveDate,
    pub points: Vec<LocationHistoryPoint>,
    pub total_distance_miles: f64,
    pub total_duration_minutes: i64,
    pub average_speed_mph: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationUpdateResponse {
    #[serde(flatten)]
    pub location: TechnicianLocation,
    pub geofence_events: Vec<GeofenceEvent>,
}
