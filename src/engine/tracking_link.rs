use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;
use uuid::Uuid;

use crate::engine::eta::estimate_for_job;
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::directory::{Job, JobStatus, Technician};
use crate::models::eta::EtaCalculation;
use crate::models::location::{TechnicianLocation, TechnicianStatus};
use crate::models::tracking::{
    CustomerTrackingLink, IssueTrackingLinkRequest, PublicStatus, PublicTrackingView,
    TrackingLinkStatus, Visibility,
};
use crate::state::AppState;

const TOKEN_BYTES: usize = 32;
const MIN_EXPIRY_HOURS: i64 = 1;
const MAX_EXPIRY_HOURS: i64 = 72;
const ARRIVING_SOON_MINUTES: i64 = 5;

/// 256 random bits, URL-safe.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn tracking_url(base: &str, token: &str) -> String {
    format!("{}/track/{}", base.trim_end_matches('/'), token)
}

pub struct TrackingLinkService {
    links: DashMap<String, CustomerTrackingLink>,
    /// Token of the one live link per job.
    active_by_job: DashMap<Uuid, String>,
    default_hours: i64,
}

impl TrackingLinkService {
    pub fn new(default_hours: i64) -> Self {
        Self {
            links: DashMap::new(),
            active_by_job: DashMap::new(),
            default_hours,
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Issues a new link for the job and expires the one it supersedes.
    pub fn issue(
        &self,
        job: &Job,
        request: IssueTrackingLinkRequest,
        now: DateTime<Utc>,
    ) -> Result<CustomerTrackingLink, AppError> {
        let technician_id = job.technician_id.ok_or_else(|| {
            AppError::InvalidInput(format!("job {} has no assigned technician", job.id))
        })?;

        let hours = request.expires_hours.unwrap_or(self.default_hours);
        if !(MIN_EXPIRY_HOURS..=MAX_EXPIRY_HOURS).contains(&hours) {
            return Err(AppError::InvalidInput(format!(
                "expires_hours must be between {MIN_EXPIRY_HOURS} and {MAX_EXPIRY_HOURS}"
            )));
        }

        let link = CustomerTrackingLink {
            id: Uuid::new_v4(),
            token: generate_token(),
            job_id: job.id,
            customer_id: job.customer_id,
            technician_id,
            status: TrackingLinkStatus::Active,
            visibility: request.visibility,
            expires_at: now + Duration::hours(hours),
            view_count: 0,
            first_viewed_at: None,
            last_viewed_at: None,
            created_at: now,
        };

        // The job slot stays locked until the new token is in place.
        let slot = self.active_by_job.entry(job.id);
        if let Entry::Occupied(previous) = &slot {
            if let Some(mut prior) = self.links.get_mut(previous.get()) {
                if prior.status.is_live() {
                    prior.status = TrackingLinkStatus::Expired;
                    info!(job_id = %job.id, link_id = %prior.id, "tracking link superseded");
                }
            }
        }
        self.links.insert(link.token.clone(), link.clone());
        slot.insert(link.token.clone());

        info!(
            job_id = %job.id,
            link_id = %link.id,
            expires_at = %link.expires_at,
            "tracking link issued"
        );
        Ok(link)
    }

    /// Records a view of a live link. A link found past its expiry is marked
    /// expired and stays that way.
    pub fn admit(&self, token: &str, now: DateTime<Utc>) -> Result<CustomerTrackingLink, AppError> {
        let expired_job = {
            let mut link = self
                .links
                .get_mut(token)
                .ok_or_else(|| AppError::NotFound("tracking link not found".to_string()))?;

            if !link.status.is_live() {
                return Err(AppError::Expired("tracking link is no longer active".to_string()));
            }

            if now >= link.expires_at {
                link.status = TrackingLinkStatus::Expired;
                link.job_id
            } else {
                link.view_count += 1;
                if link.first_viewed_at.is_none() {
                    link.first_viewed_at = Some(now);
                    link.status = TrackingLinkStatus::Viewed;
                }
                link.last_viewed_at = Some(now);
                return Ok(link.clone());
            }
        };

        self.active_by_job
            .remove_if(&expired_job, |_, live_token| live_token == token);
        info!(job_id = %expired_job, "tracking link expired");
        Err(AppError::Expired("tracking link expired".to_string()))
    }

    pub fn get(&self, token: &str) -> Option<CustomerTrackingLink> {
        self.links.get(token).map(|link| link.value().clone())
    }

    /// The job's live, unexpired link, if any.
    pub fn live_link_for_job(&self, job_id: Uuid, now: DateTime<Utc>) -> Option<CustomerTrackingLink> {
        let token = self.active_by_job.get(&job_id)?.value().clone();
        self.get(&token)
            .filter(|link| link.status.is_live() && now < link.expires_at)
    }

    pub fn links_for_job(&self, job_id: Uuid) -> Vec<CustomerTrackingLink> {
        let mut links: Vec<CustomerTrackingLink> = self
            .links
            .iter()
            .filter(|entry| entry.value().job_id == job_id)
            .map(|entry| entry.value().clone())
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        links
    }

    /// Marks every live link for the job completed. Returns how many changed.
    pub fn retire_for_job(&self, job_id: Uuid) -> usize {
        self.active_by_job.remove(&job_id);

        let mut retired = 0;
        for mut entry in self.links.iter_mut() {
            let link = entry.value_mut();
            if link.job_id == job_id && link.status.is_live() {
                link.status = TrackingLinkStatus::Completed;
                retired += 1;
            }
        }

        if retired > 0 {
            info!(job_id = %job_id, retired, "tracking links completed");
        }
        retired
    }
}

/// Internal state a public view is cut from.
pub struct TrackingSnapshot<'a> {
    pub job: &'a Job,
    pub technician: Option<&'a Technician>,
    pub location: Option<&'a TechnicianLocation>,
    pub eta: Option<&'a EtaCalculation>,
    /// Geocoded job site. `None` when only the fallback is known.
    pub destination: Option<GeoPoint>,
    pub now: DateTime<Utc>,
}

/// Builds the customer view from only the fields the flags allow.
pub fn project(visibility: &Visibility, snapshot: &TrackingSnapshot<'_>) -> PublicTrackingView {
    let technician_name = snapshot
        .technician
        .filter(|_| visibility.show_technician_name)
        .map(|technician| technician.name.clone());
    let technician_photo_url = snapshot
        .technician
        .filter(|_| visibility.show_technician_photo)
        .and_then(|technician| technician.photo_url.clone());

    let (technician_location, destination) = if visibility.show_live_map {
        (
            snapshot.location.map(TechnicianLocation::position),
            snapshot.destination,
        )
    } else {
        (None, None)
    };

    let eta = snapshot
        .eta
        .filter(|calc| visibility.show_eta && calc.destination_known);
    let eta_minutes = eta.map(|calc| calc.adjusted_duration_minutes);

    let (status, status_message) = status_for(
        snapshot.job.status,
        snapshot.location.map(|location| location.current_status),
        eta_minutes,
    );

    PublicTrackingView {
        job_id: snapshot.job.id,
        service_type: snapshot.job.job_type.clone(),
        scheduled_date: snapshot.job.scheduled_date,
        technician_name,
        technician_photo_url,
        technician_location,
        destination,
        eta_minutes,
        eta_arrival: eta.map(|calc| calc.estimated_arrival),
        distance_miles: eta.map(|calc| calc.distance_miles),
        status,
        status_message,
        last_updated: snapshot.now,
    }
}

pub fn status_for(
    job_status: JobStatus,
    technician_status: Option<TechnicianStatus>,
    eta_minutes: Option<i64>,
) -> (PublicStatus, String) {
    match job_status {
        JobStatus::Completed => (
            PublicStatus::Completed,
            "Service completed. Thank you!".to_string(),
        ),
        JobStatus::InProgress | JobStatus::OnSite => (
            PublicStatus::InProgress,
            "Your technician is currently working on your service.".to_string(),
        ),
        status if status == JobStatus::EnRoute
            || technician_status == Some(TechnicianStatus::EnRoute) =>
        {
            match eta_minutes {
                Some(minutes) if minutes <= ARRIVING_SOON_MINUTES => (
                    PublicStatus::ArrivingSoon,
                    format!("Your technician is almost there! Arriving in about {minutes} minutes."),
                ),
                Some(minutes) => (
                    PublicStatus::EnRoute,
                    format!("Your technician is on the way. Estimated arrival in {minutes} minutes."),
                ),
                None => (
                    PublicStatus::EnRoute,
                    "Your technician is on the way.".to_string(),
                ),
            }
        }
        _ => (
            PublicStatus::Scheduled,
            "Your service is scheduled. We'll notify you when your technician is on the way."
                .to_string(),
        ),
    }
}

/// Resolves a public token into its redacted view, counting the view.
pub fn resolve(state: &AppState, token: &str, now: DateTime<Utc>) -> Result<PublicTrackingView, AppError> {
    let outcome = resolve_inner(state, token, now);

    let label = match &outcome {
        Ok(_) => "ok",
        Err(AppError::NotFound(_)) => "not_found",
        Err(AppError::Expired(_)) => "expired",
        Err(_) => "error",
    };
    state
        .metrics
        .tracking_link_resolutions_total
        .with_label_values(&[label])
        .inc();

    outcome
}

fn resolve_inner(state: &AppState, token: &str, now: DateTime<Utc>) -> Result<PublicTrackingView, AppError> {
    let link = state.links.admit(token, now)?;
    let visibility = link.visibility;

    let job = state.directory.job(link.job_id)?;
    let technician = state.directory.technician(link.technician_id).ok();
    let customer = state.directory.customer(job.customer_id).ok();

    let location = if visibility.show_live_map || visibility.show_eta {
        state.locations.current(link.technician_id)
    } else {
        None
    };
    let eta = if visibility.show_eta && location.is_some() && job.status.is_open() {
        estimate_for_job(state, job.id, false, now).ok().map(|(calc, _)| calc)
    } else {
        None
    };

    let destination = job
        .service_location
        .or_else(|| customer.as_ref().and_then(|customer| customer.location));

    Ok(project(
        &visibility,
        &TrackingSnapshot {
            job: &job,
            technician: technician.as_ref(),
            location: location.as_ref(),
            eta: eta.as_ref(),
            destination,
            now,
        },
    ))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::models::directory::JobPriority;

    fn job() -> Job {
        Job {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            technician_id: Some(Uuid::new_v4()),
            job_type: "septic pumping".to_string(),
            priority: JobPriority::Normal,
            status: JobStatus::EnRoute,
            scheduled_date: None,
            service_location: Some(GeoPoint::new(30.0, -97.0)),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn technician() -> Technician {
        Technician {
            id: Uuid::new_v4(),
            name: "Rosa Diaz".to_string(),
            photo_url: Some("https://cdn.example/rosa.jpg".to_string()),
            skills: vec![],
            home: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn location(technician_id: Uuid) -> TechnicianLocation {
        let now = Utc::now();
        TechnicianLocation {
            technician_id,
            latitude: 30.05,
            longitude: -97.0,
            accuracy: None,
            speed: Some(35.0),
            heading: None,
            is_online: true,
            battery_level: None,
            captured_at: now,
            received_at: now,
            current_job_id: None,
            current_status: TechnicianStatus::EnRoute,
        }
    }

    fn eta(job: &Job, minutes: i64, destination_known: bool) -> EtaCalculation {
        let now = Utc::now();
        EtaCalculation {
            job_id: job.id,
            technician_id: job.technician_id.unwrap(),
            origin: GeoPoint::new(30.05, -97.0),
            destination: GeoPoint::new(30.0, -97.0),
            destination_known,
            distance_miles: 3.45,
            base_duration_minutes: minutes,
            traffic_multiplier: 1.0,
            adjusted_duration_minutes: minutes,
            estimated_arrival: now + Duration::minutes(minutes),
            confidence: 0.85,
            calculation_source: "internal".to_string(),
            calculated_at: now,
        }
    }

    #[test]
    fn tokens_carry_256_bits_and_do_not_repeat() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn second_issue_expires_the_first() {
        let service = TrackingLinkService::new(24);
        let job = job();
        let now = Utc::now();

        let first = service.issue(&job, IssueTrackingLinkRequest::default(), now).unwrap();
        let second = service.issue(&job, IssueTrackingLinkRequest::default(), now).unwrap();

        let links = service.links_for_job(job.id);
        let live: Vec<_> = links.iter().filter(|l| l.status.is_live()).collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].token, second.token);
        assert_eq!(
            service.get(&first.token).unwrap().status,
            TrackingLinkStatus::Expired
        );
        assert!(matches!(service.admit(&first.token, now), Err(AppError::Expired(_))));
    }

    #[test]
    fn expiry_hours_are_bounded() {
        let service = TrackingLinkService::new(24);
        let job = job();
        let request = IssueTrackingLinkRequest {
            expires_hours: Some(73),
            ..Default::default()
        };

        assert!(matches!(
            service.issue(&job, request, Utc::now()),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn unassigned_job_cannot_get_a_link() {
        let service = TrackingLinkService::new(24);
        let mut job = job();
        job.technician_id = None;

        assert!(service
            .issue(&job, IssueTrackingLinkRequest::default(), Utc::now())
            .is_err());
    }

    #[test]
    fn views_are_counted_and_first_view_marks_viewed() {
        let service = TrackingLinkService::new(24);
        let job = job();
        let issued_at = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        let link = service
            .issue(&job, IssueTrackingLinkRequest::default(), issued_at)
            .unwrap();

        let first_view = issued_at + Duration::minutes(1);
        let second_view = issued_at + Duration::minutes(2);
        service.admit(&link.token, first_view).unwrap();
        let seen = service.admit(&link.token, second_view).unwrap();

        assert_eq!(seen.view_count, 2);
        assert_eq!(seen.status, TrackingLinkStatus::Viewed);
        assert_eq!(seen.first_viewed_at, Some(first_view));
        assert_eq!(seen.last_viewed_at, Some(second_view));
    }

    #[test]
    fn link_past_expiry_is_expired_and_stays_expired() {
        let service = TrackingLinkService::new(1);
        let job = job();
        let issued_at = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        let link = service
            .issue(&job, IssueTrackingLinkRequest::default(), issued_at)
            .unwrap();
        let late = issued_at + Duration::hours(2);

        assert!(matches!(service.admit(&link.token, late), Err(AppError::Expired(_))));
        assert_eq!(service.get(&link.token).unwrap().status, TrackingLinkStatus::Expired);
        assert!(matches!(service.admit(&link.token, issued_at), Err(AppError::Expired(_))));
        assert_eq!(service.get(&link.token).unwrap().view_count, 0);
        assert!(service.live_link_for_job(job.id, issued_at).is_none());
    }

    #[test]
    fn unknown_token_is_not_found() {
        let service = TrackingLinkService::new(24);
        assert!(matches!(
            service.admit("nope", Utc::now()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn retiring_completes_live_links() {
        let service = TrackingLinkService::new(24);
        let job = job();
        let now = Utc::now();
        let link = service.issue(&job, IssueTrackingLinkRequest::default(), now).unwrap();

        assert_eq!(service.retire_for_job(job.id), 1);
        assert_eq!(
            service.get(&link.token).unwrap().status,
            TrackingLinkStatus::Completed
        );
        assert!(service.admit(&link.token, now).is_err());
    }

    #[test]
    fn hidden_map_omits_coordinates_entirely() {
        let job = job();
        let technician = technician();
        let location = location(technician.id);
        let eta = eta(&job, 12, true);
        let visibility = Visibility {
            show_live_map: false,
            ..Visibility::default()
        };

        let view = project(
            &visibility,
            &TrackingSnapshot {
                job: &job,
                technician: Some(&technician),
                location: Some(&location),
                eta: Some(&eta),
                destination: job.service_location,
                now: Utc::now(),
            },
        );

        assert!(view.technician_location.is_none());
        assert!(view.destination.is_none());
        assert_eq!(view.eta_minutes, Some(12));

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("technician_location").is_none());
        assert!(json.get("destination").is_none());
    }

    #[test]
    fn hidden_identity_and_eta_are_omitted() {
        let job = job();
        let technician = technician();
        let eta = eta(&job, 12, true);
        let visibility = Visibility {
            show_technician_name: false,
            show_technician_photo: false,
            show_live_map: true,
            show_eta: false,
        };

        let view = project(
            &visibility,
            &TrackingSnapshot {
                job: &job,
                technician: Some(&technician),
                location: None,
                eta: Some(&eta),
                destination: job.service_location,
                now: Utc::now(),
            },
        );

        assert!(view.technician_name.is_none());
        assert!(view.technician_photo_url.is_none());
        assert!(view.eta_minutes.is_none());
        assert!(view.distance_miles.is_none());
        assert_eq!(view.status_message, "Your technician is on the way.");
    }

    #[test]
    fn fallback_destination_never_reaches_the_customer() {
        let job = job();
        let eta = eta(&job, 30, false);

        let view = project(
            &Visibility::default(),
            &TrackingSnapshot {
                job: &job,
                technician: None,
                location: None,
                eta: Some(&eta),
                destination: None,
                now: Utc::now(),
            },
        );

        assert!(view.eta_minutes.is_none());
        assert!(view.destination.is_none());
    }

    #[test]
    fn status_text_tracks_job_and_eta() {
        let (status, _) = status_for(JobStatus::Completed, None, None);
        assert_eq!(status, PublicStatus::Completed);

        let (status, _) = status_for(JobStatus::InProgress, None, Some(3));
        assert_eq!(status, PublicStatus::InProgress);

        let (status, message) = status_for(JobStatus::EnRoute, None, Some(4));
        assert_eq!(status, PublicStatus::ArrivingSoon);
        assert!(message.contains("about 4 minutes"));

        let (status, message) = status_for(
            JobStatus::Scheduled,
            Some(TechnicianStatus::EnRoute),
            Some(18),
        );
        assert_eq!(status, PublicStatus::EnRoute);
        assert!(message.contains("18 minutes"));

        let (status, _) = status_for(JobStatus::Scheduled, Some(TechnicianStatus::Available), None);
        assert_eq!(status, PublicStatus::Scheduled);
    }
}
