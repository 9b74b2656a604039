use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_MILES: f64 = 3_959.0;
pub const METERS_PER_MILE: f64 = 1_609.344;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Great-circle distance in miles.
pub fn haversine_miles(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().min(1.0).asin();

    EARTH_RADIUS_MILES * central_angle
}

pub fn haversine_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine_miles(a, b) * METERS_PER_MILE
}

/// Boundary-inclusive circle containment.
pub fn within_radius(point: &GeoPoint, center: &GeoPoint, radius_meters: f64) -> bool {
    haversine_meters(point, center) <= radius_meters
}

/// Even-odd ray casting over the vertices in order, closing the ring
/// from the last vertex back to the first. Longitude is treated as x and
/// latitude as y. Rings with fewer than three vertices contain nothing.
pub fn point_in_polygon(point: &GeoPoint, vertices: &[GeoPoint]) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = vertices.len() - 1;

    for i in 0..vertices.len() {
        let vi = &vertices[i];
        let vj = &vertices[j];

        let crosses = (vi.lat > point.lat) != (vj.lat > point.lat);
        if crosses {
            let intersect_lng = (vj.lng - vi.lng) * (point.lat - vi.lat) / (vj.lat - vi.lat) + vi.lng;
            if point.lng < intersect_lng {
                inside = !inside;
            }
        }

        j = i;
    }

    inside
}

#[cfg(test)]
mod tests {
    use super::{haversine_meters, haversine_miles, point_in_polygon, within_radius, GeoPoint};

    fn square() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(30.0, -97.0),
            GeoPoint::new(30.0, -96.9),
            GeoPoint::new(30.1, -96.9),
            GeoPoint::new(30.1, -97.0),
        ]
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint::new(30.2672, -97.7431);
        assert!(haversine_miles(&p, &p) < 1e-9);
    }

    #[test]
    fn hundredth_of_a_degree_north_is_about_069_miles() {
        let a = GeoPoint::new(30.000, -97.000);
        let b = GeoPoint::new(30.010, -97.000);
        let distance = haversine_miles(&a, &b);
        assert!((distance - 0.69).abs() < 0.01, "got {distance}");
    }

    #[test]
    fn austin_to_dallas_is_around_182_miles() {
        let austin = GeoPoint::new(30.2672, -97.7431);
        let dallas = GeoPoint::new(32.7767, -96.7970);
        let distance = haversine_miles(&austin, &dallas);
        assert!((distance - 182.0).abs() < 5.0, "got {distance}");
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let center = GeoPoint::new(30.0, -97.0);
        let point = GeoPoint::new(30.001, -97.0);
        let exact = haversine_meters(&point, &center);

        assert!(within_radius(&point, &center, exact));
        assert!(!within_radius(&point, &center, exact - 1e-6));
    }

    #[test]
    fn centroid_of_convex_polygon_is_inside() {
        let centroid = GeoPoint::new(30.05, -96.95);
        assert!(point_in_polygon(&centroid, &square()));
    }

    #[test]
    fn point_far_outside_bounding_box_is_outside() {
        let far = GeoPoint::new(45.0, -120.0);
        assert!(!point_in_polygon(&far, &square()));
    }

    #[test]
    fn concave_notch_is_outside() {
        // U shape opening north; the notch between the arms is outside.
        let u_shape = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 3.0),
            GeoPoint::new(3.0, 3.0),
            GeoPoint::new(3.0, 2.0),
            GeoPoint::new(1.0, 2.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(3.0, 1.0),
            GeoPoint::new(3.0, 0.0),
        ];
        assert!(!point_in_polygon(&GeoPoint::new(2.0, 1.5), &u_shape));
        assert!(point_in_polygon(&GeoPoint::new(2.0, 0.5), &u_shape));
        assert!(point_in_polygon(&GeoPoint::new(0.5, 1.5), &u_shape));
    }

    #[test]
    fn degenerate_ring_contains_nothing() {
        let line = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)];
        assert!(!point_in_polygon(&GeoPoint::new(0.5, 0.5), &line));
    }
}
