use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::geo::{point_in_polygon, within_radius, GeoPoint};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceType {
    CustomerSite,
    Office,
    Warehouse,
    ServiceArea,
    ExclusionZone,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceAction {
    ClockIn,
    ClockOut,
    NotifyDispatch,
    NotifyCustomer,
    StartJob,
    CompleteJob,
    #[default]
    LogOnly,
}

impl GeofenceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeofenceAction::ClockIn => "clock_in",
            GeofenceAction::ClockOut => "clock_out",
            GeofenceAction::NotifyDispatch => "notify_dispatch",
            GeofenceAction::NotifyCustomer => "notify_customer",
            GeofenceAction::StartJob => "start_job",
            GeofenceAction::CompleteJob => "complete_job",
            GeofenceAction::LogOnly => "log_only",
        }
    }
}

impl fmt::Display for GeofenceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A zone is either a circle or a polygon, never both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeofenceShape {
    Circle { center: GeoPoint, radius_meters: f64 },
    Polygon { vertices: Vec<GeoPoint> },
}

impl GeofenceShape {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        match self {
            GeofenceShape::Circle {
                center,
                radius_meters,
            } => within_radius(point, center, *radius_meters),
            GeofenceShape::Polygon { vertices } => point_in_polygon(point, vertices),
        }
    }
}

/// Daily window in local time. `end` before `start` wraps past midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ActiveWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geofence {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub geofence_type: GeofenceType,
    pub shape: GeofenceShape,
    pub customer_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub entry_action: GeofenceAction,
    pub exit_action: GeofenceAction,
    pub active_window: Option<ActiveWindow>,
    /// Weekdays the zone is evaluated, 0 = Sunday.
    pub active_days: Option<Vec<u8>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Geofence {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.shape.contains(point)
    }

    /// Whether the zone's schedule admits evaluation at `now`, read in the
    /// given local offset.
    pub fn is_scheduled_at(&self, now: DateTime<Utc>, offset: FixedOffset) -> bool {
        let local = now.with_timezone(&offset);

        if let Some(days) = &self.active_days {
            let weekday = local.weekday().num_days_from_sunday() as u8;
            if !days.contains(&weekday) {
                return false;
            }
        }

        match &self.active_window {
            Some(window) => window.contains(local.time()),
            None => true,
        }
    }

    pub fn action_for(&self, event_type: GeofenceEventType) -> GeofenceAction {
        match event_type {
            GeofenceEventType::Entry => self.entry_action,
            GeofenceEventType::Exit => self.exit_action,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceEventType {
    Entry,
    Exit,
}

impl GeofenceEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeofenceEventType::Entry => "entry",
            GeofenceEventType::Exit => "exit",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionResult {
    Success,
    Failed,
    Skipped,
}

impl ActionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionResult::Success => "success",
            ActionResult::Failed => "failed",
            ActionResult::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceEvent {
    pub id: Uuid,
    pub geofence_id: Uuid,
    pub geofence_name: String,
    pub technician_id: Uuid,
    pub job_id: Option<Uuid>,
    pub event_type: GeofenceEventType,
    pub latitude: f64,
    pub longitude: f64,
    pub action_triggered: GeofenceAction,
    pub action_result: ActionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGeofenceRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,

    pub description: Option<String>,

    pub geofence_type: GeofenceType,

    #[validate(range(min = -90.0, max = 90.0, message = "latitude must be between -90 and 90"))]
    pub center_latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0, message = "longitude must be between -180 and 180"))]
    pub center_longitude: Option<f64>,

    #[validate(range(min = 10.0, max = 50000.0, message = "radius must be between 10 and 50000 meters"))]
    pub radius_meters: Option<f64>,

    pub polygon: Option<Vec<GeoPoint>>,

    pub customer_id: Option<Uuid>,

    pub job_id: Option<Uuid>,

    #[serde(default)]
    pub entry_action: GeofenceAction,

    #[serde(default)]
    pub exit_action: GeofenceAction,

    pub active_start_time: Option<String>,

    pub active_end_time: Option<String>,

    pub active_days: Option<Vec<u8>>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Partial update; only supplied fields change.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateGeofenceRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,

    pub geofence_type: Option<GeofenceType>,

    #[validate(range(min = -90.0, max = 90.0, message = "latitude must be between -90 and 90"))]
    pub center_latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0, message = "longitude must be between -180 and 180"))]
    pub center_longitude: Option<f64>,

    #[validate(range(min = 10.0, max = 50000.0, message = "radius must be between 10 and 50000 meters"))]
    pub radius_meters: Option<f64>,

    pub polygon: Option<Vec<GeoPoint>>,

    pub customer_id: Option<Uuid>,

    pub job_id: Option<Uuid>,

    pub entry_action: Option<GeofenceAction>,

    pub exit_action: Option<GeofenceAction>,

    pub active_start_time: Option<String>,

    pub active_end_time: Option<String>,

    pub active_days: Option<Vec<u8>>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListGeofencesQuery {
    pub geofence_type: Option<GeofenceType>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeofenceEventsQuery {
    pub technician_id: Option<Uuid>,
    pub geofence_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, TimeZone, Utc};

    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn zone(window: Option<ActiveWindow>, days: Option<Vec<u8>>) -> Geofence {
        Geofence {
            id: Uuid::new_v4(),
            name: "yard".to_string(),
            description: None,
            geofence_type: GeofenceType::Warehouse,
            shape: GeofenceShape::Circle {
                center: GeoPoint::new(30.0, -97.0),
                radius_meters: 100.0,
            },
            customer_id: None,
            job_id: None,
            entry_action: GeofenceAction::ClockIn,
            exit_action: GeofenceAction::ClockOut,
            active_window: window,
            active_days: days,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn window_within_a_day() {
        let window = ActiveWindow {
            start: time(7, 0),
            end: time(18, 0),
        };
        assert!(window.contains(time(7, 0)));
        assert!(window.contains(time(12, 30)));
        assert!(!window.contains(time(18, 0)));
        assert!(!window.contains(time(6, 59)));
    }

    #[test]
    fn window_wrapping_midnight() {
        let window = ActiveWindow {
            start: time(22, 0),
            end: time(6, 0),
        };
        assert!(window.contains(time(23, 15)));
        assert!(window.contains(time(2, 0)));
        assert!(!window.contains(time(12, 0)));
    }

    #[test]
    fn schedule_is_read_in_local_offset() {
        let central = FixedOffset::west_opt(6 * 3600).unwrap();
        let fence = zone(
            Some(ActiveWindow {
                start: time(7, 0),
                end: time(18, 0),
            }),
            None,
        );

        // 14:00 UTC is 08:00 local.
        let morning = Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap();
        // 02:00 UTC is 20:00 local the previous day.
        let evening = Utc.with_ymd_and_hms(2026, 3, 10, 2, 0, 0).unwrap();

        assert!(fence.is_scheduled_at(morning, central));
        assert!(!fence.is_scheduled_at(evening, central));
    }

    #[test]
    fn weekday_restriction_uses_sunday_as_zero() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let weekdays_only = zone(None, Some(vec![1, 2, 3, 4, 5]));

        // 2026-03-08 is a Sunday, 2026-03-09 a Monday.
        let sunday = Utc.with_ymd_and_hms(2026, 3, 8, 12, 0, 0).unwrap();
        let monday = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();

        assert!(!weekdays_only.is_scheduled_at(sunday, utc));
        assert!(weekdays_only.is_scheduled_at(monday, utc));
    }

    #[test]
    fn action_wire_names_are_snake_case() {
        let json = serde_json::to_string(&GeofenceAction::NotifyCustomer).unwrap();
        assert_eq!(json, "\"notify_customer\"");
        let parsed: GeofenceAction = serde_json::from_str("\"complete_job\"").unwrap();
        assert_eq!(parsed, GeofenceAction::CompleteJob);
        assert!(serde_json::from_str::<GeofenceAction>("\"teleport\"").is_err());
    }
}
