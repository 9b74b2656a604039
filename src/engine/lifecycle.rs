use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::tracking_link::tracking_url;
use crate::error::AppError;
use crate::models::directory::{JobStatus, JobStatusChange};
use crate::models::tracking::{IssueTrackingLinkRequest, TrackingLinkResponse};
use crate::state::AppState;

/// Applies a job status change reported by the work-order service and
/// keeps tracking links in step with it.
pub fn apply_status_change(
    state: &AppState,
    job_id: Uuid,
    status: JobStatus,
    now: DateTime<Utc>,
) -> Result<JobStatusChange, AppError> {
    let (job, previous_status) = state.directory.set_job_status(job_id, status)?;

    info!(
        job_id = %job_id,
        from = ?previous_status,
        to = ?status,
        "job status changed"
    );

    let mut issued_tracking_link = None;
    let mut retired_tracking_links = 0;

    match status {
        JobStatus::EnRoute if state.config.auto_issue_tracking_links => {
            if job.technician_id.is_none() {
                warn!(job_id = %job_id, "job en route without technician; no tracking link issued");
            } else if state.links.live_link_for_job(job_id, now).is_none() {
                let link = state
                    .links
                    .issue(&job, IssueTrackingLinkRequest::default(), now)?;
                issued_tracking_link = Some(TrackingLinkResponse {
                    tracking_url: tracking_url(&state.config.public_base_url, &link.token),
                    link,
                });
            }
        }
        JobStatus::Completed | JobStatus::Canceled => {
            retired_tracking_links = state.links.retire_for_job(job_id);
        }
        _ => {}
    }

    Ok(JobStatusChange {
        job,
        previous_status,
        issued_tracking_link,
        retired_tracking_links,
    })
}
