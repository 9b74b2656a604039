use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::engine::actions::{ActionContext, ActionExecutor};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::directory::Customer;
use crate::models::geofence::{
    ActiveWindow, CreateGeofenceRequest, Geofence, GeofenceAction, GeofenceEvent,
    GeofenceEventType, GeofenceEventsQuery, GeofenceShape, GeofenceType, ListGeofencesQuery,
    UpdateGeofenceRequest,
};

pub const DEFAULT_EVENT_LIMIT: usize = 100;
pub const MAX_EVENT_LIMIT: usize = 1000;
pub const DEFAULT_CUSTOMER_SITE_RADIUS_METERS: f64 = 100.0;

/// A position to test against every zone.
#[derive(Debug, Clone, Copy)]
pub struct Evaluation {
    pub technician_id: Uuid,
    pub job_id: Option<Uuid>,
    pub job_customer_id: Option<Uuid>,
    pub position: GeoPoint,
    pub now: DateTime<Utc>,
}

pub struct GeofenceEngine {
    zones: DashMap<Uuid, Geofence>,
    events: DashMap<Uuid, GeofenceEvent>,
    /// Most recent event per (technician, zone). Containment is read from
    /// the referenced event, never stored as a flag.
    last_event: DashMap<(Uuid, Uuid), Uuid>,
    technician_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    local_offset: FixedOffset,
}

impl GeofenceEngine {
    pub fn new(local_offset: FixedOffset) -> Self {
        Self {
            zones: DashMap::new(),
            events: DashMap::new(),
            last_event: DashMap::new(),
            technician_locks: DashMap::new(),
            local_offset,
        }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn create(&self, request: CreateGeofenceRequest, now: DateTime<Utc>) -> Result<Geofence, AppError> {
        request.validate()?;

        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidInput("name cannot be empty".to_string()));
        }

        let shape = shape_from_parts(
            request.polygon,
            request.center_latitude,
            request.center_longitude,
            request.radius_meters,
        )?;
        let active_window = window_from_parts(
            request.active_start_time.as_deref(),
            request.active_end_time.as_deref(),
        )?;
        let active_days = normalize_days(request.active_days)?;

        let geofence = Geofence {
            id: Uuid::new_v4(),
            name,
            description: request.description,
            geofence_type: request.geofence_type,
            shape,
            customer_id: request.customer_id,
            job_id: request.job_id,
            entry_action: request.entry_action,
            exit_action: request.exit_action,
            active_window,
            active_days,
            is_active: request.is_active,
            created_at: now,
            updated_at: now,
        };

        self.zones.insert(geofence.id, geofence.clone());
        info!(geofence_id = %geofence.id, name = %geofence.name, "geofence created");
        Ok(geofence)
    }

    /// Circle around a customer's geocoded address that notifies the
    /// customer on arrival.
    pub fn create_customer_site(
        &self,
        customer: &Customer,
        radius_meters: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<Geofence, AppError> {
        let location = customer.location.ok_or_else(|| {
            AppError::InvalidInput(format!("customer {} has no geocoded location", customer.id))
        })?;

        self.create(
            CreateGeofenceRequest {
                name: format!("{} - Service Location", customer.name),
                description: None,
                geofence_type: GeofenceType::CustomerSite,
                center_latitude: Some(location.lat),
                center_longitude: Some(location.lng),
                radius_meters: Some(radius_meters.unwrap_or(DEFAULT_CUSTOMER_SITE_RADIUS_METERS)),
                polygon: None,
                customer_id: Some(customer.id),
                job_id: None,
                entry_action: GeofenceAction::NotifyCustomer,
                exit_action: GeofenceAction::LogOnly,
                active_start_time: None,
                active_end_time: None,
                active_days: None,
                is_active: true,
            },
            now,
        )
    }

    pub fn get(&self, id: Uuid) -> Result<Geofence, AppError> {
        self.zones
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("geofence {id} not found")))
    }

    pub fn list(&self, query: &ListGeofencesQuery) -> Vec<Geofence> {
        let mut zones: Vec<Geofence> = self
            .zones
            .iter()
            .filter(|entry| {
                let zone = entry.value();
                query.geofence_type.is_none_or(|kind| zone.geofence_type == kind)
                    && query.is_active.is_none_or(|active| zone.is_active == active)
            })
            .map(|entry| entry.value().clone())
            .collect();
        zones.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        zones
    }

    pub fn update(
        &self,
        id: Uuid,
        request: UpdateGeofenceRequest,
        now: DateTime<Utc>,
    ) -> Result<Geofence, AppError> {
        request.validate()?;

        let mut updated = self.get(id)?;

        if let Some(name) = request.name.as_deref() {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::InvalidInput("name cannot be empty".to_string()));
            }
            updated.name = name;
        }
        if let Some(description) = &request.description {
            updated.description = Some(description.clone());
        }
        if let Some(kind) = request.geofence_type {
            updated.geofence_type = kind;
        }

        if request.polygon.is_some()
            || request.center_latitude.is_some()
            || request.center_longitude.is_some()
            || request.radius_meters.is_some()
        {
            updated.shape = merge_shape(&updated.shape, &request)?;
        }

        if let Some(customer_id) = request.customer_id {
            updated.customer_id = Some(customer_id);
        }
        if let Some(job_id) = request.job_id {
            updated.job_id = Some(job_id);
        }
        if let Some(action) = request.entry_action {
            updated.entry_action = action;
        }
        if let Some(action) = request.exit_action {
            updated.exit_action = action;
        }

        if request.active_start_time.is_some() || request.active_end_time.is_some() {
            let start = request
                .active_start_time
                .as_deref()
                .map(parse_clock)
                .transpose()?
                .or(updated.active_window.map(|window| window.start));
            let end = request
                .active_end_time
                .as_deref()
                .map(parse_clock)
                .transpose()?
                .or(updated.active_window.map(|window| window.end));

            updated.active_window = match (start, end) {
                (Some(start), Some(end)) => Some(ActiveWindow { start, end }),
                _ => {
                    return Err(AppError::InvalidInput(
                        "active_start_time and active_end_time must be set together".to_string(),
                    ));
                }
            };
        }

        if request.active_days.is_some() {
            updated.active_days = normalize_days(request.active_days)?;
        }
        if let Some(active) = request.is_active {
            updated.is_active = active;
        }

        updated.updated_at = now;

        let mut entry = self
            .zones
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("geofence {id} not found")))?;
        *entry = updated.clone();

        info!(geofence_id = %id, "geofence updated");
        Ok(updated)
    }

    /// Removes the zone definition. Its event history stays in the log.
    pub fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.zones
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("geofence {id} not found")))?;
        self.last_event.retain(|(_, zone_id), _| *zone_id != id);

        info!(geofence_id = %id, "geofence deleted");
        Ok(())
    }

    /// Whether the latest recorded event for the pair is an entry.
    pub fn is_inside(&self, technician_id: Uuid, geofence_id: Uuid) -> bool {
        self.last_event
            .get(&(technician_id, geofence_id))
            .and_then(|event_id| {
                self.events
                    .get(event_id.value())
                    .map(|event| event.event_type == GeofenceEventType::Entry)
            })
            .unwrap_or(false)
    }

    /// Tests the position against every active, in-schedule zone and records
    /// an event for each containment change. Evaluations for one technician
    /// run one at a time so the prior-state read and the event write cannot
    /// interleave. Actions for the transitions of one position run
    /// concurrently, so a slow collaborator delays the caller by at most one
    /// action timeout.
    pub async fn evaluate(&self, actions: &ActionExecutor, input: Evaluation) -> Vec<GeofenceEvent> {
        let lock = self
            .technician_locks
            .entry(input.technician_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let mut candidates: Vec<Geofence> = self
            .zones
            .iter()
            .filter(|entry| entry.value().is_active)
            .map(|entry| entry.value().clone())
            .collect();
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let transitions: Vec<(Geofence, GeofenceEventType)> = candidates
            .into_iter()
            .filter(|zone| zone.is_scheduled_at(input.now, self.local_offset))
            .filter_map(|zone| {
                let inside = zone.contains(&input.position);
                if inside == self.is_inside(input.technician_id, zone.id) {
                    return None;
                }
                let event_type = if inside {
                    GeofenceEventType::Entry
                } else {
                    GeofenceEventType::Exit
                };
                Some((zone, event_type))
            })
            .collect();

        let contexts: Vec<ActionContext<'_>> = transitions
            .iter()
            .map(|(zone, event_type)| ActionContext {
                geofence: zone,
                event_type: *event_type,
                technician_id: input.technician_id,
                job_id: input.job_id,
                job_customer_id: input.job_customer_id,
                position: input.position,
                occurred_at: input.now,
            })
            .collect();
        let outcomes = join_all(
            contexts
                .iter()
                .map(|ctx| actions.execute(ctx.geofence.action_for(ctx.event_type), ctx)),
        )
        .await;

        let mut recorded = Vec::with_capacity(outcomes.len());

        for ((zone, event_type), outcome) in transitions.iter().zip(outcomes) {
            let action = zone.action_for(*event_type);
            let event = GeofenceEvent {
                id: Uuid::new_v4(),
                geofence_id: zone.id,
                geofence_name: zone.name.clone(),
                technician_id: input.technician_id,
                job_id: input.job_id.or(zone.job_id),
                event_type: *event_type,
                latitude: input.position.lat,
                longitude: input.position.lng,
                action_triggered: action,
                action_result: outcome.result,
                action_detail: outcome.detail,
                occurred_at: input.now,
            };

            self.events.insert(event.id, event.clone());
            self.last_event
                .insert((input.technician_id, zone.id), event.id);

            info!(
                geofence_id = %zone.id,
                technician_id = %input.technician_id,
                event_type = event_type.as_str(),
                action = %action,
                result = event.action_result.as_str(),
                "geofence event recorded"
            );

            recorded.push(event);
        }

        recorded
    }

    /// Events newest first. Date bounds are local calendar days, both
    /// inclusive.
    pub fn events(&self, query: &GeofenceEventsQuery) -> Vec<GeofenceEvent> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_EVENT_LIMIT)
            .clamp(1, MAX_EVENT_LIMIT);

        let mut events: Vec<GeofenceEvent> = self
            .events
            .iter()
            .filter(|entry| {
                let event = entry.value();
                let day = event.occurred_at.with_timezone(&self.local_offset).date_naive();
                query.technician_id.is_none_or(|id| event.technician_id == id)
                    && query.geofence_id.is_none_or(|id| event.geofence_id == id)
                    && query.start_date.is_none_or(|start| day >= start)
                    && query.end_date.is_none_or(|end| day <= end)
            })
            .map(|entry| entry.value().clone())
            .collect();

        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
        events.truncate(limit);
        events
    }
}

/// Builds the stored shape from request fields. A supplied polygon wins
/// over circle fields.
fn shape_from_parts(
    polygon: Option<Vec<GeoPoint>>,
    center_latitude: Option<f64>,
    center_longitude: Option<f64>,
    radius_meters: Option<f64>,
) -> Result<GeofenceShape, AppError> {
    let has_circle_fields =
        center_latitude.is_some() || center_longitude.is_some() || radius_meters.is_some();

    if let Some(vertices) = polygon {
        if has_circle_fields {
            warn!("geofence has both polygon and circle fields; using polygon");
        }
        return polygon_shape(vertices);
    }

    match (center_latitude, center_longitude, radius_meters) {
        (Some(lat), Some(lng), Some(radius_meters)) => Ok(GeofenceShape::Circle {
            center: GeoPoint::new(lat, lng),
            radius_meters,
        }),
        (None, None, None) => Err(AppError::InvalidInput(
            "geofence needs either a polygon or center_latitude, center_longitude and radius_meters"
                .to_string(),
        )),
        _ => Err(AppError::InvalidInput(
            "circle geofence needs center_latitude, center_longitude and radius_meters".to_string(),
        )),
    }
}

fn merge_shape(current: &GeofenceShape, request: &UpdateGeofenceRequest) -> Result<GeofenceShape, AppError> {
    if request.polygon.is_some() {
        return shape_from_parts(
            request.polygon.clone(),
            request.center_latitude,
            request.center_longitude,
            request.radius_meters,
        );
    }

    let (lat, lng, radius) = match current {
        GeofenceShape::Circle {
            center,
            radius_meters,
        } => (
            request.center_latitude.unwrap_or(center.lat),
            request.center_longitude.unwrap_or(center.lng),
            request.radius_meters.unwrap_or(*radius_meters),
        ),
        GeofenceShape::Polygon { .. } => {
            return shape_from_parts(
                None,
                request.center_latitude,
                request.center_longitude,
                request.radius_meters,
            );
        }
    };

    shape_from_parts(None, Some(lat), Some(lng), Some(radius))
}

fn polygon_shape(vertices: Vec<GeoPoint>) -> Result<GeofenceShape, AppError> {
    if vertices.len() < 3 {
        return Err(AppError::InvalidInput(
            "polygon needs at least 3 vertices".to_string(),
        ));
    }
    if let Some(bad) = vertices.iter().find(|vertex| !vertex.is_valid()) {
        return Err(AppError::InvalidInput(format!(
            "polygon vertex ({}, {}) is out of range",
            bad.lat, bad.lng
        )));
    }
    Ok(GeofenceShape::Polygon { vertices })
}

fn parse_clock(raw: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| AppError::InvalidInput(format!("time {raw:?} is not HH:MM")))
}

fn window_from_parts(start: Option<&str>, end: Option<&str>) -> Result<Option<ActiveWindow>, AppError> {
    match (start, end) {
        (Some(start), Some(end)) => Ok(Some(ActiveWindow {
            start: parse_clock(start)?,
            end: parse_clock(end)?,
        })),
        (None, None) => Ok(None),
        _ => Err(AppError::InvalidInput(
            "active_start_time and active_end_time must be set together".to_string(),
        )),
    }
}

/// An empty list clears the weekday restriction.
fn normalize_days(days: Option<Vec<u8>>) -> Result<Option<Vec<u8>>, AppError> {
    let Some(mut days) = days else {
        return Ok(None);
    };
    if let Some(bad) = days.iter().find(|day| **day > 6) {
        return Err(AppError::InvalidInput(format!(
            "active day {bad} is outside 0-6 (0 = Sunday)"
        )));
    }
    days.sort_unstable();
    days.dedup();
    Ok(if days.is_empty() { None } else { Some(days) })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration as StdDuration, Instant};

    use async_trait::async_trait;
    use chrono::{FixedOffset, TimeZone, Utc};
    use uuid::Uuid;

    use super::{Evaluation, GeofenceEngine};
    use crate::engine::actions::{
        ActionExecutor, Notification, Notifier, TracingGateway, TracingNotifier,
    };
    use crate::error::AppError;
    use crate::geo::GeoPoint;
    use crate::models::geofence::{
        ActionResult, CreateGeofenceRequest, GeofenceAction, GeofenceEventType,
        GeofenceEventsQuery, GeofenceShape, GeofenceType, UpdateGeofenceRequest,
    };

    fn engine() -> GeofenceEngine {
        GeofenceEngine::new(FixedOffset::west_opt(6 * 3600).unwrap())
    }

    fn executor() -> ActionExecutor {
        ActionExecutor::new(
            Arc::new(TracingNotifier),
            Arc::new(TracingGateway),
            StdDuration::from_secs(1),
        )
    }

    fn circle_request() -> CreateGeofenceRequest {
        CreateGeofenceRequest {
            name: "Warehouse".to_string(),
            description: None,
            geofence_type: GeofenceType::Warehouse,
            center_latitude: Some(30.0),
            center_longitude: Some(-97.0),
            radius_meters: Some(200.0),
            polygon: None,
            customer_id: None,
            job_id: None,
            entry_action: GeofenceAction::ClockIn,
            exit_action: GeofenceAction::ClockOut,
            active_start_time: None,
            active_end_time: None,
            active_days: None,
            is_active: true,
        }
    }

    fn at(technician_id: Uuid, lat: f64, lng: f64, now: chrono::DateTime<Utc>) -> Evaluation {
        Evaluation {
            technician_id,
            job_id: None,
            job_customer_id: None,
            position: GeoPoint::new(lat, lng),
            now,
        }
    }

    #[tokio::test]
    async fn repeated_inside_position_records_one_entry() {
        let engine = engine();
        let actions = executor();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        let zone = engine.create(circle_request(), now).unwrap();
        let tech = Uuid::new_v4();

        let first = engine.evaluate(&actions, at(tech, 30.0, -97.0, now)).await;
        let second = engine.evaluate(&actions, at(tech, 30.0, -97.0, now)).await;

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].event_type, GeofenceEventType::Entry);
        assert_eq!(first[0].action_result, ActionResult::Success);
        assert!(second.is_empty());
        assert!(engine.is_inside(tech, zone.id));
    }

    #[tokio::test]
    async fn leaving_records_exit_with_exit_action() {
        let engine = engine();
        let actions = executor();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        let zone = engine.create(circle_request(), now).unwrap();
        let tech = Uuid::new_v4();

        engine.evaluate(&actions, at(tech, 30.0, -97.0, now)).await;
        let exit = engine.evaluate(&actions, at(tech, 30.1, -97.0, now)).await;

        assert_eq!(exit.len(), 1);
        assert_eq!(exit[0].event_type, GeofenceEventType::Exit);
        assert_eq!(exit[0].action_triggered, GeofenceAction::ClockOut);
        assert!(!engine.is_inside(tech, zone.id));
    }

    #[tokio::test]
    async fn zone_outside_its_window_is_skipped() {
        let engine = engine();
        let actions = executor();
        let mut request = circle_request();
        request.active_start_time = Some("07:00".to_string());
        request.active_end_time = Some("18:00".to_string());
        let created = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        engine.create(request, created).unwrap();
        let tech = Uuid::new_v4();

        // 03:00 UTC is 21:00 local the evening before.
        let night = Utc.with_ymd_and_hms(2026, 3, 10, 3, 0, 0).unwrap();
        let events = engine.evaluate(&actions, at(tech, 30.0, -97.0, night)).await;

        assert!(events.is_empty());
        assert_eq!(engine.event_count(), 0);
    }

    #[tokio::test]
    async fn inactive_zone_is_never_evaluated() {
        let engine = engine();
        let actions = executor();
        let mut request = circle_request();
        request.is_active = false;
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        engine.create(request, now).unwrap();

        let events = engine
            .evaluate(&actions, at(Uuid::new_v4(), 30.0, -97.0, now))
            .await;
        assert!(events.is_empty());
    }

    struct StalledNotifier;

    #[async_trait]
    impl Notifier for StalledNotifier {
        async fn notify(&self, _notification: &Notification) -> Result<(), AppError> {
            tokio::time::sleep(StdDuration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn stalled_actions_cost_one_timeout_not_one_per_zone() {
        let engine = engine();
        let actions = ActionExecutor::new(
            Arc::new(StalledNotifier),
            Arc::new(TracingGateway),
            StdDuration::from_millis(300),
        );
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        for _ in 0..3 {
            let mut request = circle_request();
            request.entry_action = GeofenceAction::NotifyDispatch;
            engine.create(request, now).unwrap();
        }

        let started = Instant::now();
        let events = engine
            .evaluate(&actions, at(Uuid::new_v4(), 30.0, -97.0, now))
            .await;

        assert!(started.elapsed() < StdDuration::from_millis(800));
        assert_eq!(events.len(), 3);
        assert!(events
            .iter()
            .all(|event| event.action_result == ActionResult::Failed));
    }

    #[test]
    fn polygon_wins_when_both_shapes_supplied() {
        let engine = engine();
        let mut request = circle_request();
        request.polygon = Some(vec![
            GeoPoint::new(30.0, -97.0),
            GeoPoint::new(30.0, -96.9),
            GeoPoint::new(30.1, -96.9),
        ]);

        let zone = engine.create(request, Utc::now()).unwrap();
        assert!(matches!(zone.shape, GeofenceShape::Polygon { .. }));
    }

    #[test]
    fn shape_is_required() {
        let engine = engine();
        let mut request = circle_request();
        request.center_latitude = None;
        request.center_longitude = None;
        request.radius_meters = None;

        let result = engine.create(request, Utc::now());
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn two_vertex_polygon_is_rejected() {
        let engine = engine();
        let mut request = circle_request();
        request.polygon = Some(vec![GeoPoint::new(30.0, -97.0), GeoPoint::new(30.1, -97.0)]);

        let result = engine.create(request, Utc::now());
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn half_a_window_is_rejected() {
        let engine = engine();
        let mut request = circle_request();
        request.active_start_time = Some("07:00".to_string());

        assert!(engine.create(request, Utc::now()).is_err());
    }

    #[test]
    fn weekday_seven_is_rejected() {
        let engine = engine();
        let mut request = circle_request();
        request.active_days = Some(vec![1, 7]);

        assert!(engine.create(request, Utc::now()).is_err());
    }

    #[test]
    fn partial_update_changes_only_supplied_fields() {
        let engine = engine();
        let zone = engine.create(circle_request(), Utc::now()).unwrap();

        let updated = engine
            .update(
                zone.id,
                UpdateGeofenceRequest {
                    radius_meters: Some(500.0),
                    exit_action: Some(GeofenceAction::NotifyDispatch),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(updated.name, "Warehouse");
        assert_eq!(updated.entry_action, GeofenceAction::ClockIn);
        assert_eq!(updated.exit_action, GeofenceAction::NotifyDispatch);
        match updated.shape {
            GeofenceShape::Circle {
                center,
                radius_meters,
            } => {
                assert_eq!(center, GeoPoint::new(30.0, -97.0));
                assert_eq!(radius_meters, 500.0);
            }
            GeofenceShape::Polygon { .. } => panic!("shape should stay a circle"),
        }
    }

    #[test]
    fn update_renames_and_reshapes_in_one_request() {
        let engine = engine();
        let zone = engine.create(circle_request(), Utc::now()).unwrap();

        let updated = engine
            .update(
                zone.id,
                UpdateGeofenceRequest {
                    name: Some("  North Yard ".to_string()),
                    description: Some("overflow parking".to_string()),
                    center_latitude: Some(30.5),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(updated.name, "North Yard");
        assert_eq!(updated.description.as_deref(), Some("overflow parking"));
        assert_eq!(
            updated.shape,
            GeofenceShape::Circle {
                center: GeoPoint::new(30.5, -97.0),
                radius_meters: 200.0,
            }
        );
    }

    #[test]
    fn delete_unknown_zone_is_not_found() {
        let engine = engine();
        assert!(matches!(
            engine.delete(Uuid::new_v4()),
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn event_query_filters_and_limits_newest_first() {
        let engine = engine();
        let actions = executor();
        let start = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        engine.create(circle_request(), start).unwrap();
        let tech = Uuid::new_v4();
        let other = Uuid::new_v4();

        for i in 0..4 {
            let now = start + chrono::Duration::minutes(i * 5);
            let lat = if i % 2 == 0 { 30.0 } else { 30.1 };
            engine.evaluate(&actions, at(tech, lat, -97.0, now)).await;
        }
        engine.evaluate(&actions, at(other, 30.0, -97.0, start)).await;

        let events = engine.events(&GeofenceEventsQuery {
            technician_id: Some(tech),
            limit: Some(3),
            ..Default::default()
        });

        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|event| event.technician_id == tech));
        assert!(events[0].occurred_at >= events[1].occurred_at);
        assert_eq!(events[0].event_type, GeofenceEventType::Exit);
    }
}
