use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackingLinkStatus {
    Active,
    Viewed,
    Completed,
    Expired,
}

impl TrackingLinkStatus {
    /// Active and viewed links still resolve.
    pub fn is_live(&self) -> bool {
        matches!(self, TrackingLinkStatus::Active | TrackingLinkStatus::Viewed)
    }
}

fn default_true() -> bool {
    true
}

/// What a link holder may see. Each flag is independent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Visibility {
    #[serde(default = "default_true")]
    pub show_technician_name: bool,
    #[serde(default = "default_true")]
    pub show_technician_photo: bool,
    #[serde(default = "default_true")]
    pub show_live_map: bool,
    #[serde(default = "default_true")]
    pub show_eta: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            show_technician_name: true,
            show_technician_photo: true,
            show_live_map: true,
            show_eta: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerTrackingLink {
    pub id: Uuid,
    pub token: String,
    pub job_id: Uuid,
    pub customer_id: Uuid,
    pub technician_id: Uuid,
    pub status: TrackingLinkStatus,
    pub visibility: Visibility,
    pub expires_at: DateTime<Utc>,
    pub view_count: u64,
    pub first_viewed_at: Option<DateTime<Utc>>,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueTrackingLinkRequest {
    #[serde(flatten)]
    pub visibility: Visibility,
    pub expires_hours: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingLinkResponse {
    #[serde(flatten)]
    pub link: CustomerTrackingLink,
    pub tracking_url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublicStatus {
    Scheduled,
    EnRoute,
    ArrivingSoon,
    InProgress,
    Completed,
}

/// Customer-facing projection. Absent fields are omitted from the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicTrackingView {
    pub job_id: Uuid,
    pub service_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_arrival: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_miles: Option<f64>,
    pub status: PublicStatus,
    pub status_message: String,
    pub last_updated: DateTime<Utc>,
}
