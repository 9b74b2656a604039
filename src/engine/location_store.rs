use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::geo::haversine_miles;
use crate::models::location::{
    LocationHistoryPoint, LocationHistoryResponse, LocationUpdate, TechnicianLocation,
};

/// Latest position per technician plus an append-only history log.
pub struct LocationStore {
    current: DashMap<Uuid, TechnicianLocation>,
    history: DashMap<Uuid, Vec<LocationHistoryPoint>>,
    local_offset: FixedOffset,
    stale_after: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceCounts {
    pub online: usize,
    pub offline: usize,
    pub stale: usize,
}

impl LocationStore {
    pub fn new(local_offset: FixedOffset, stale_after: Duration) -> Self {
        Self {
            current: DashMap::new(),
            history: DashMap::new(),
            local_offset,
            stale_after,
        }
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.local_offset).date_naive()
    }

    /// Appends a history point and overwrites the current row.
    ///
    /// The history entry for the technician is held for the whole call, so
    /// the delta and daily total are computed against a consistent previous
    /// position even when updates for the same technician race.
    pub fn record(
        &self,
        technician_id: Uuid,
        update: &LocationUpdate,
        received_at: DateTime<Utc>,
    ) -> TechnicianLocation {
        let mut history = self.history.entry(technician_id).or_default();

        let position = update.position();
        let distance_from_previous = self
            .current
            .get(&technician_id)
            .map(|previous| haversine_miles(&previous.position(), &position))
            .unwrap_or(0.0);

        let captured_day = self.local_date(update.captured_at);
        let cumulative = match history.last() {
            Some(last) if self.local_date(last.captured_at) == captured_day => {
                last.cumulative_distance_miles + distance_from_previous
            }
            _ => 0.0,
        };

        let status = update.status.unwrap_or_default();

        history.push(LocationHistoryPoint {
            technician_id,
            job_id: update.job_id,
            latitude: update.latitude,
            longitude: update.longitude,
            accuracy: update.accuracy,
            speed: update.speed,
            heading: update.heading,
            status,
            distance_from_previous_miles: distance_from_previous,
            cumulative_distance_miles: cumulative,
            captured_at: update.captured_at,
            received_at,
        });

        let location = TechnicianLocation {
            technician_id,
            latitude: update.latitude,
            longitude: update.longitude,
            accuracy: update.accuracy,
            speed: update.speed,
            heading: update.heading,
            is_online: update.is_online,
            battery_level: update.battery_level,
            captured_at: update.captured_at,
            received_at,
            current_job_id: update.job_id,
            current_status: status,
        };

        self.current.insert(technician_id, location.clone());
        location
    }

    pub fn current(&self, technician_id: Uuid) -> Option<TechnicianLocation> {
        self.current
            .get(&technician_id)
            .map(|entry| entry.value().clone())
    }

    pub fn all_current(&self) -> Vec<TechnicianLocation> {
        self.current
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Staleness is judged on the server receipt time, never the device clock.
    pub fn is_stale(&self, location: &TechnicianLocation, now: DateTime<Utc>) -> bool {
        now - location.received_at > self.stale_after
    }

    pub fn presence_counts(&self, locations: &[TechnicianLocation], now: DateTime<Utc>) -> PresenceCounts {
        let mut counts = PresenceCounts::default();
        for location in locations {
            if !location.is_online {
                counts.offline += 1;
            } else if self.is_stale(location, now) {
                counts.stale += 1;
            } else {
                counts.online += 1;
            }
        }
        counts
    }

    pub fn history_for_day(
        &self,
        technician_id: Uuid,
        date: NaiveDate,
        job_id: Option<Uuid>,
    ) -> LocationHistoryResponse {
        let mut points: Vec<LocationHistoryPoint> = self
            .history
            .get(&technician_id)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|point| self.local_date(point.captured_at) == date)
                    .filter(|point| job_id.is_none() || point.job_id == job_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        points.sort_by_key(|point| point.captured_at);

        // The first point of a day carries the overnight hop; leave it out.
        let total_distance: f64 = points
            .iter()
            .skip(1)
            .map(|point| point.distance_from_previous_miles)
            .sum();

        let total_duration_minutes = match (points.first(), points.last()) {
            (Some(first), Some(last)) => (last.captured_at - first.captured_at).num_minutes(),
            _ => 0,
        };

        let speeds: Vec<f64> = points.iter().filter_map(|point| point.speed).collect();
        let average_speed_mph = if speeds.is_empty() {
            None
        } else {
            Some(round_to(speeds.iter().sum::<f64>() / speeds.len() as f64, 1))
        };

        LocationHistoryResponse {
            technician_id,
            date,
            points,
            total_distance_miles: round_to(total_distance, 2),
            total_duration_minutes,
            average_speed_mph,
        }
    }

    /// Drops history captured before `cutoff`. Returns the number of points
    /// removed.
    pub fn purge_history_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for mut entry in self.history.iter_mut() {
            let before = entry.len();
            entry.retain(|point| point.captured_at >= cutoff);
            removed += before - entry.len();
        }
        self.history.retain(|_, points| !points.is_empty());
        removed
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset, TimeZone, Utc};
    use uuid::Uuid;

    use super::LocationStore;
    use crate::geo::{haversine_miles, GeoPoint};
    use crate::models::location::LocationUpdate;

    fn store() -> LocationStore {
        LocationStore::new(FixedOffset::west_opt(6 * 3600).unwrap(), Duration::minutes(5))
    }

    fn update(lat: f64, lng: f64, captured_at: chrono::DateTime<Utc>) -> LocationUpdate {
        LocationUpdate {
            latitude: lat,
            longitude: lng,
            accuracy: Some(5.0),
            speed: Some(30.0),
            heading: None,
            battery_level: Some(80),
            captured_at,
            status: None,
            job_id: None,
            is_online: true,
        }
    }

    #[test]
    fn first_update_has_zero_distance() {
        let store = store();
        let tech = Uuid::new_v4();
        let t0 = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();

        store.record(tech, &update(30.0, -97.0, t0), t0);

        let day = store.history_for_day(tech, store.local_date(t0), None);
        assert_eq!(day.points.len(), 1);
        assert_eq!(day.points[0].distance_from_previous_miles, 0.0);
        assert_eq!(day.points[0].cumulative_distance_miles, 0.0);
    }

    #[test]
    fn cumulative_distance_is_sum_of_same_day_hops() {
        let store = store();
        let tech = Uuid::new_v4();
        let t0 = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        let path = [
            GeoPoint::new(30.000, -97.000),
            GeoPoint::new(30.010, -97.000),
            GeoPoint::new(30.010, -97.020),
            GeoPoint::new(30.030, -97.020),
        ];

        let mut last = None;
        for (i, point) in path.iter().enumerate() {
            let at = t0 + Duration::minutes(10 * i as i64);
            last = Some(store.record(tech, &update(point.lat, point.lng, at), at));
        }
        assert!(last.is_some());

        let expected: f64 = path.windows(2).map(|w| haversine_miles(&w[0], &w[1])).sum();
        let day = store.history_for_day(tech, store.local_date(t0), None);
        let final_total = day.points.last().unwrap().cumulative_distance_miles;

        assert!((final_total - expected).abs() < 1e-9);
        assert!((day.points[1].distance_from_previous_miles - 0.69).abs() < 0.01);
        assert_eq!(day.total_duration_minutes, 30);
    }

    #[test]
    fn cumulative_resets_at_local_midnight() {
        let store = store();
        let tech = Uuid::new_v4();
        // 23:50 and 00:10 local (UTC-6).
        let late = Utc.with_ymd_and_hms(2026, 3, 11, 5, 50, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2026, 3, 11, 6, 10, 0).unwrap();

        store.record(tech, &update(30.0, -97.0, late), late);
        let next_day = store.record(tech, &update(30.01, -97.0, early), early);
        assert_eq!(next_day.latitude, 30.01);

        let day = store.history_for_day(tech, store.local_date(early), None);
        assert_eq!(day.points.len(), 1);
        assert!(day.points[0].distance_from_previous_miles > 0.6);
        assert_eq!(day.points[0].cumulative_distance_miles, 0.0);
        assert_eq!(day.total_distance_miles, 0.0);
    }

    #[test]
    fn staleness_uses_receipt_time() {
        let store = store();
        let tech = Uuid::new_v4();
        let captured = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        let received = captured + Duration::minutes(30);

        let location = store.record(tech, &update(30.0, -97.0, captured), received);

        assert!(!store.is_stale(&location, received + Duration::minutes(4)));
        assert!(store.is_stale(&location, received + Duration::minutes(6)));
    }

    #[test]
    fn presence_counts_split_online_offline_and_stale() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();

        store.record(Uuid::new_v4(), &update(30.0, -97.0, now), now);
        store.record(Uuid::new_v4(), &update(30.0, -97.0, now), now - Duration::minutes(20));
        let mut offline = update(30.0, -97.0, now);
        offline.is_online = false;
        store.record(Uuid::new_v4(), &offline, now);

        let counts = store.presence_counts(&store.all_current(), now);
        assert_eq!(counts.online, 1);
        assert_eq!(counts.stale, 1);
        assert_eq!(counts.offline, 1);
    }

    #[test]
    fn purge_drops_points_before_cutoff() {
        let store = store();
        let tech = Uuid::new_v4();
        let old = Utc.with_ymd_and_hms(2025, 11, 1, 15, 0, 0).unwrap();
        let recent = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();

        store.record(tech, &update(30.0, -97.0, old), old);
        store.record(tech, &update(30.0, -97.0, recent), recent);

        let removed = store.purge_history_before(recent - Duration::days(90));
        assert_eq!(removed, 1);
        assert!(store.current(tech).is_some());
    }
}
