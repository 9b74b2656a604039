use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::geo::GeoPoint;
use crate::models::tracking::TrackingLinkResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technician {
    pub id: Uuid,
    pub name: String,
    pub photo_url: Option<String>,
    pub skills: Vec<String>,
    pub home: Option<GeoPoint>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    /// Geocoded service address, if known.
    pub location: Option<GeoPoint>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
    Emergency,
}

impl JobPriority {
    pub fn is_urgent(&self) -> bool {
        matches!(self, JobPriority::Urgent | JobPriority::Emergency)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Scheduled,
    EnRoute,
    OnSite,
    InProgress,
    Completed,
    Canceled,
}

impl JobStatus {
    pub fn is_open(&self) -> bool {
        !matches!(self, JobStatus::Completed | JobStatus::Canceled)
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobStatus::EnRoute | JobStatus::OnSite | JobStatus::InProgress
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub technician_id: Option<Uuid>,
    pub job_type: String,
    pub priority: JobPriority,
    pub status: JobStatus,
    pub scheduled_date: Option<NaiveDate>,
    pub service_location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTechnicianRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub home: Option<GeoPoint>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,
    pub location: Option<GeoPoint>,
    pub phone: Option<String>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateJobRequest {
    pub customer_id: Uuid,
    pub technician_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100, message = "job type must be 1-100 characters"))]
    pub job_type: String,
    #[serde(default)]
    pub priority: JobPriority,
    pub scheduled_date: Option<NaiveDate>,
    pub service_location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateJobStatusRequest {
    pub status: JobStatus,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatusChange {
    pub job: Job,
    pub previous_status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_tracking_link: Option<TrackingLinkResponse>,
    pub retired_tracking_links: usize,
}
