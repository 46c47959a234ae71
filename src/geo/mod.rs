//! Great-circle geometry helpers
//!
//! Distances are computed with the haversine formula on a spherical Earth.
//! Travel time assumes a constant average speed, which is what the balancer
//! compares against the per-point time ceiling.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Travel time reported when the speed is not positive.
///
/// Any comparison against a finite time ceiling fails, so a candidate with
/// this time is always excluded.
pub const UNREACHABLE_MIN: f64 = f64::INFINITY;

/// A (latitude, longitude) pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Create a new coordinate
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Both components are finite and inside the valid degree ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Distance to another coordinate in kilometers
    #[must_use]
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine_km(*self, *other)
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// Great-circle distance between two coordinates in kilometers
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // clamp guards asin against h drifting past 1.0 for antipodal points
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Minutes needed to cover `distance_km` at `speed_kmh`
///
/// Returns [`UNREACHABLE_MIN`] when `speed_kmh <= 0`.
pub fn travel_time_min(distance_km: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 || speed_kmh.is_nan() {
        return UNREACHABLE_MIN;
    }
    distance_km / speed_kmh * 60.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = Coordinate::new(-23.55, -46.63);
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn test_one_degree_diagonal_at_equator() {
        let d = haversine_km(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0));
        assert!((d - 157.25).abs() < 0.1, "got {d}");
    }

    #[test]
    fn test_symmetry() {
        let a = Coordinate::new(-23.55, -46.63);
        let b = Coordinate::new(-22.90, -43.17);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_sao_paulo_to_rio() {
        let sp = Coordinate::new(-23.5505, -46.6333);
        let rj = Coordinate::new(-22.9068, -43.1729);
        let d = haversine_km(sp, rj);
        assert!((d - 361.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn test_triangle_inequality() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.5, 0.3);
        let c = Coordinate::new(1.0, 1.0);
        assert!(haversine_km(a, c) <= haversine_km(a, b) + haversine_km(b, c) + 1e-9);
    }

    #[test]
    fn test_antipodal_does_not_nan() {
        let d = haversine_km(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 180.0));
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_travel_time() {
        assert!((travel_time_min(35.0, 35.0) - 60.0).abs() < 1e-12);
        assert!((travel_time_min(10.0, 60.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_travel_time_non_positive_speed() {
        assert_eq!(travel_time_min(1.0, 0.0), UNREACHABLE_MIN);
        assert_eq!(travel_time_min(1.0, -5.0), UNREACHABLE_MIN);
        assert!(travel_time_min(0.0, 0.0) > 1_000_000.0);
    }

    #[test]
    fn test_coordinate_validity() {
        assert!(Coordinate::new(-23.5, -46.6).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }
}
