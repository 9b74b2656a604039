use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::directory::JobPriority;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    OnJob,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    Gps,
    Home,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workload {
    pub scheduled_today: u32,
    pub active_jobs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringFactor {
    pub factor: String,
    pub points: f64,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchScore {
    pub technician_id: Uuid,
    pub technician_name: String,
    pub distance_miles: Option<f64>,
    pub estimated_travel_minutes: Option<f64>,
    pub location_source: Option<LocationSource>,
    pub skills_matched: Vec<String>,
    pub skills_missing: Vec<String>,
    pub availability: Availability,
    pub workload: Workload,
    pub score: f64,
    pub factors: Vec<ScoringFactor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchRecommendation {
    pub job_id: Uuid,
    pub job_type: String,
    pub priority: JobPriority,
    pub job_location: Option<GeoPoint>,
    pub recommended_technicians: Vec<DispatchScore>,
    pub total_active_technicians: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendQuery {
    pub max_results: Option<usize>,
}
