//! Geographic primitives: accuracy-bounded points and overlap testing.
//!
//! # Responsibility
//! - Represent a location as a point plus a 95%-confidence radius.
//! - Decide pickup eligibility from two imprecise readings.
//!
//! # Invariants
//! - Effective radius never drops below `MIN_RADIUS_M` (GPS noise floor).
//! - `within_range` is symmetric in its arguments.

use serde::{Deserialize, Serialize};

/// Floor applied to reported accuracy, in meters. Consumer GPS readings
/// routinely under-report their own error, so both circles are widened to at
/// least this radius before the overlap test.
pub const MIN_RADIUS_M: f64 = 60.0;

/// Mean earth radius in meters. A spherical earth is accurate to well under
/// 0.5% at the few-hundred-meter scale this game operates on.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geolocation reading: point plus the radius (meters) of the circle the
/// true position lies within at 95% confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// 95%-confidence radius in meters.
    pub accuracy_m: f64,
}

/// Bare render coordinate handed to the map surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m,
        }
    }

    /// Projects this reading down to a bare render coordinate.
    pub fn lat_lng(&self) -> LatLng {
        LatLng {
            lat: self.latitude,
            lng: self.longitude,
        }
    }

    /// Reported accuracy clamped up to the noise floor.
    pub fn effective_radius_m(&self) -> f64 {
        self.accuracy_m.max(MIN_RADIUS_M)
    }
}

/// Great-circle distance in meters between two coordinates (haversine).
pub fn distance_m(a: LatLng, b: LatLng) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Circle-overlap test gating pickup eligibility.
///
/// Each reading is treated as a circle of radius `max(accuracy, MIN_RADIUS_M)`
/// around its point. Returns true iff the circles touch or overlap
/// (inclusive boundary).
pub fn within_range(user: &GeoPoint, knot: &GeoPoint) -> bool {
    let dist = distance_m(user.lat_lng(), knot.lat_lng());
    dist <= user.effective_radius_m() + knot.effective_radius_m()
}

#[cfg(test)]
mod tests {
    use super::{distance_m, within_range, GeoPoint, LatLng};

    #[test]
    fn distance_is_zero_for_identical_points() {
        let p = LatLng { lat: -37.81, lng: 144.96 };
        assert!(distance_m(p, p) < 1e-9);
    }

    #[test]
    fn distance_matches_known_short_baseline() {
        // 0.0005 degrees of longitude at the equator is roughly 55.7 m.
        let a = LatLng { lat: 0.0, lng: 0.0 };
        let b = LatLng { lat: 0.0, lng: 0.0005 };
        let dist = distance_m(a, b);
        assert!((dist - 55.66).abs() < 0.5, "got {dist}");
    }

    #[test]
    fn within_range_is_true_for_same_point_any_accuracy() {
        let p = GeoPoint::new(-37.81, 144.96, 0.0);
        assert!(within_range(&p, &p));
    }

    #[test]
    fn within_range_is_symmetric() {
        let a = GeoPoint::new(0.0, 0.0, 10.0);
        let b = GeoPoint::new(0.0, 0.0005, 200.0);
        assert_eq!(within_range(&a, &b), within_range(&b, &a));
    }

    #[test]
    fn floored_radii_cover_a_55m_gap() {
        // Both accuracies are under the floor, so each circle widens to 60 m
        // and the 120 m combined reach covers the ~55 m separation.
        let user = GeoPoint::new(0.0, 0.0, 10.0);
        let knot = GeoPoint::new(0.0, 0.0005, 10.0);
        assert!(within_range(&user, &knot));
    }

    #[test]
    fn far_apart_points_are_out_of_range() {
        // ~1.1 km apart, 60 m floors on both sides.
        let user = GeoPoint::new(0.0, 0.0, 5.0);
        let knot = GeoPoint::new(0.0, 0.01, 5.0);
        assert!(!within_range(&user, &knot));
    }

    #[test]
    fn large_reported_accuracy_extends_reach() {
        // Same ~1.1 km gap, but one reading honestly reports 1100 m of slop.
        let user = GeoPoint::new(0.0, 0.0, 1100.0);
        let knot = GeoPoint::new(0.0, 0.01, 5.0);
        assert!(within_range(&user, &knot));
    }
}
